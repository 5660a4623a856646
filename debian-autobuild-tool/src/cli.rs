// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::{anyhow, Context, Result},
    clap::{Arg, ArgMatches, Command},
    debian_autobuild::{
        config::PipelineConfig,
        control::parse_paragraphs,
        index::{write_index, IndexSettings},
        pipeline::BuildPipeline,
        publish::Publisher,
        repo_init::{initialize_repository, DistributionConfig},
        reprepro::Reprepro,
    },
    std::path::{Path, PathBuf},
};

const ABOUT: &str = "\
# About

`dab` automates building Debian packages from a list of upstream Git
repositories and publishing them into a reprepro-managed APT repository.

A typical deployment runs `dab init-repo` once, then `dab build`
periodically (e.g. from a timer), and finally `dab generate-index` and
`dab publish` to refresh the public mirror.

All build settings can be provided through DAB_* environment variables;
command line flags take precedence.
";

const BUILD_ABOUT: &str = "\
Build and register packages for the listed projects.

Reads the project list file (one Git URL per line; `#` comments, blank
lines, and a leading `<digits>.` ordinal are tolerated), then processes
each project in order: clone or update the working tree, decide whether
to build in place or from an exported snapshot, skip versions the
repository already has, ensure an orig tarball, run the build tool, and
register the resulting changes files.

Positional PROJECT arguments restrict the run to matching project names;
with none given, every listed project is processed.

The run is strictly sequential and fail-fast: the first failing project
aborts the run with the project, URL, and step in the diagnostic.
";

const INIT_REPO_ABOUT: &str = "\
Initialize a reprepro repository.

Writes conf/distributions describing the distribution (codename, suite,
components, architectures, origin/label/description, accepted suite
aliases, signing key) and exports the initial empty indices.

Pass --sign-with KEY to sign repository indices with a GPG key, or
--unsigned to create an explicitly unsigned repository.
";

const GENERATE_INDEX_ABOUT: &str = "\
Render a static HTML index of available packages.

Reads every codename from the repository configuration, lists registered
packages, drops source-only entries, de-duplicates, and writes an HTML
page with installation instructions. The displayed base URL and key
filename come from --base-url/--key-filename or the DAB_BASE_URL and
DAB_KEY_FILENAME environment variables.
";

const PUBLISH_ABOUT: &str = "\
Mirror the repository to a web host.

Performs a one-way rsync of the repository's dists/ and pool/ trees and
the generated index page to DEST (host:path). --delete removes remote
files that no longer exist locally; --dry-run shows what would change.
";

pub fn run_cli() -> Result<()> {
    let app = Command::new("Debian Autobuild")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build Debian packages from Git and publish them with reprepro")
        .long_about(ABOUT)
        .arg_required_else_help(true);

    let app = app.subcommand(
        Command::new("build")
            .about("Build and register packages for the listed projects")
            .long_about(BUILD_ABOUT)
            .arg(
                Arg::new("list-file")
                    .long("list-file")
                    .takes_value(true)
                    .help("Path to the project list file [env: DAB_LIST_FILE]"),
            )
            .arg(
                Arg::new("repo")
                    .long("repo")
                    .takes_value(true)
                    .help("Repository base directory [env: DAB_REPO_DIR]"),
            )
            .arg(
                Arg::new("codename")
                    .long("codename")
                    .takes_value(true)
                    .help("Codename to register packages into [env: DAB_CODENAME]"),
            )
            .arg(
                Arg::new("workspace")
                    .long("workspace")
                    .takes_value(true)
                    .help("Directory for working trees and build artifacts [env: DAB_WORKSPACE]"),
            )
            .arg(
                Arg::new("architecture")
                    .long("architecture")
                    .takes_value(true)
                    .help("Host architecture override [env: DAB_ARCHITECTURE]"),
            )
            .arg(
                Arg::new("build-option")
                    .long("build-option")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .help("Option passed to the build tool (repeatable) [env: DAB_BUILD_OPTIONS]"),
            )
            .arg(
                Arg::new("passphrase-file")
                    .long("passphrase-file")
                    .takes_value(true)
                    .help("Signing passphrase file for cache priming [env: DAB_PASSPHRASE_FILE]"),
            )
            .arg(
                Arg::new("source-only")
                    .long("source-only")
                    .help("Build source packages only and gate on source entries"),
            )
            .arg(
                Arg::new("force-orig")
                    .long("force-orig")
                    .help("Regenerate orig tarballs even when the pool has one"),
            )
            .arg(
                Arg::new("force-rebuild")
                    .long("force-rebuild")
                    .help("Rebuild and re-include versions the repository already has"),
            )
            .arg(
                Arg::new("project")
                    .multiple_values(true)
                    .help("Project names to build (default: all listed)"),
            ),
    );

    let app = app.subcommand(
        Command::new("init-repo")
            .about("Initialize a reprepro repository")
            .long_about(INIT_REPO_ABOUT)
            .arg(
                Arg::new("repo")
                    .long("repo")
                    .takes_value(true)
                    .required(true)
                    .help("Repository base directory"),
            )
            .arg(
                Arg::new("codename")
                    .long("codename")
                    .takes_value(true)
                    .required(true)
                    .help("Distribution codename"),
            )
            .arg(
                Arg::new("suite")
                    .long("suite")
                    .takes_value(true)
                    .help("Suite name (defaults to the codename)"),
            )
            .arg(
                Arg::new("component")
                    .long("component")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .help("Component to define (repeatable; default: main)"),
            )
            .arg(
                Arg::new("architecture")
                    .long("architecture")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .help("Architecture to define (repeatable; default: amd64)"),
            )
            .arg(
                Arg::new("origin")
                    .long("origin")
                    .takes_value(true)
                    .help("Origin string advertised in the Release file"),
            )
            .arg(
                Arg::new("label")
                    .long("label")
                    .takes_value(true)
                    .help("Label string advertised in the Release file"),
            )
            .arg(
                Arg::new("description")
                    .long("description")
                    .takes_value(true)
                    .help("Description string advertised in the Release file"),
            )
            .arg(
                Arg::new("also-accept")
                    .long("also-accept")
                    .takes_value(true)
                    .multiple_occurrences(true)
                    .help("Suite alias accepted in uploads (repeatable; default: unstable)"),
            )
            .arg(
                Arg::new("sign-with")
                    .long("sign-with")
                    .takes_value(true)
                    .conflicts_with("unsigned")
                    .help("GPG key id used to sign repository indices"),
            )
            .arg(
                Arg::new("unsigned")
                    .long("unsigned")
                    .help("Create an explicitly unsigned repository"),
            ),
    );

    let app = app.subcommand(
        Command::new("generate-index")
            .about("Render a static HTML index of available packages")
            .long_about(GENERATE_INDEX_ABOUT)
            .arg(
                Arg::new("repo")
                    .long("repo")
                    .takes_value(true)
                    .required(true)
                    .help("Repository base directory"),
            )
            .arg(
                Arg::new("output")
                    .long("output")
                    .takes_value(true)
                    .required(true)
                    .help("Path of the HTML file to write"),
            )
            .arg(
                Arg::new("base-url")
                    .long("base-url")
                    .takes_value(true)
                    .help("Repository base URL shown in instructions [env: DAB_BASE_URL]"),
            )
            .arg(
                Arg::new("key-filename")
                    .long("key-filename")
                    .takes_value(true)
                    .help("Published signing key filename [env: DAB_KEY_FILENAME]"),
            ),
    );

    let mut app = app.subcommand(
        Command::new("publish")
            .about("Mirror the repository to a web host")
            .long_about(PUBLISH_ABOUT)
            .arg(
                Arg::new("repo")
                    .long("repo")
                    .takes_value(true)
                    .required(true)
                    .help("Repository base directory"),
            )
            .arg(
                Arg::new("index-file")
                    .long("index-file")
                    .takes_value(true)
                    .help("Index page to publish alongside the repository"),
            )
            .arg(
                Arg::new("remote-subdir")
                    .long("remote-subdir")
                    .takes_value(true)
                    .help("Directory under the destination path"),
            )
            .arg(
                Arg::new("dry-run")
                    .long("dry-run")
                    .help("Show what would be transferred without writing"),
            )
            .arg(
                Arg::new("delete")
                    .long("delete")
                    .help("Delete remote files that no longer exist locally"),
            )
            .arg(
                Arg::new("dest")
                    .required(true)
                    .value_name("DEST")
                    .help("rsync destination (host:path)"),
            ),
    );

    let matches = app.clone().get_matches();

    match matches.subcommand() {
        Some(("build", args)) => command_build(args),
        Some(("init-repo", args)) => command_init_repo(args),
        Some(("generate-index", args)) => command_generate_index(args),
        Some(("publish", args)) => command_publish(args),
        Some((command, _)) => Err(anyhow!("invalid sub-command: {}", command)),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn command_build(args: &ArgMatches) -> Result<()> {
    let mut config = PipelineConfig::from_env();

    if let Some(value) = args.value_of("list-file") {
        config.list_file = PathBuf::from(value);
    }
    if let Some(value) = args.value_of("repo") {
        config.repo_dir = PathBuf::from(value);
    }
    if let Some(value) = args.value_of("codename") {
        config.codename = value.to_string();
    }
    if let Some(value) = args.value_of("workspace") {
        config.workspace_dir = PathBuf::from(value);
    }
    if let Some(value) = args.value_of("architecture") {
        config.architecture = Some(value.to_string());
    }
    if let Some(values) = args.values_of("build-option") {
        config.build_options = values.map(|x| x.to_string()).collect();
    }
    if let Some(value) = args.value_of("passphrase-file") {
        config.passphrase_file = Some(PathBuf::from(value));
    }

    config.source_only |= args.is_present("source-only");
    config.force_orig |= args.is_present("force-orig");
    config.force_rebuild |= args.is_present("force-rebuild");
    config.normalize();

    let filters = args
        .values_of("project")
        .map(|values| values.map(|x| x.to_string()).collect::<Vec<_>>())
        .unwrap_or_default();

    let pipeline = BuildPipeline::new(config)?;
    let summary = pipeline.run(&filters)?;

    println!(
        "done: {} built, {} already current",
        summary.built, summary.skipped
    );

    Ok(())
}

fn command_init_repo(args: &ArgMatches) -> Result<()> {
    let repo_dir = PathBuf::from(args.value_of("repo").expect("repo argument is required"));
    let codename = args
        .value_of("codename")
        .expect("codename argument is required")
        .to_string();

    let signing_key = if args.is_present("unsigned") {
        None
    } else {
        Some(
            args.value_of("sign-with")
                .ok_or_else(|| anyhow!("either --sign-with KEY or --unsigned is required"))?
                .to_string(),
        )
    };

    let multi = |name: &str, default: &str| -> Vec<String> {
        args.values_of(name)
            .map(|values| values.map(|x| x.to_string()).collect())
            .unwrap_or_else(|| vec![default.to_string()])
    };

    let config = DistributionConfig {
        suite: args
            .value_of("suite")
            .unwrap_or(&codename)
            .to_string(),
        components: multi("component", "main"),
        architectures: multi("architecture", "amd64"),
        origin: args.value_of("origin").unwrap_or("debian-autobuild").to_string(),
        label: args.value_of("label").unwrap_or("debian-autobuild").to_string(),
        description: args
            .value_of("description")
            .unwrap_or("Automatically built packages")
            .to_string(),
        also_accept: multi("also-accept", "unstable"),
        signing_key,
        codename,
    };

    initialize_repository(&repo_dir, &config)?;

    println!("initialized repository at {}", repo_dir.display());

    Ok(())
}

fn repository_origin(repo_dir: &Path) -> Option<String> {
    let text = std::fs::read_to_string(repo_dir.join("conf/distributions")).ok()?;

    parse_paragraphs(&text)
        .ok()?
        .iter()
        .find_map(|p| p.field_str("Origin").map(|s| s.to_string()))
}

fn command_generate_index(args: &ArgMatches) -> Result<()> {
    let repo_dir = PathBuf::from(args.value_of("repo").expect("repo argument is required"));
    let output = PathBuf::from(args.value_of("output").expect("output argument is required"));

    let base_url = args
        .value_of("base-url")
        .map(|x| x.to_string())
        .or_else(|| std::env::var("DAB_BASE_URL").ok())
        .context("--base-url or DAB_BASE_URL is required")?;

    let key_filename = args
        .value_of("key-filename")
        .map(|x| x.to_string())
        .or_else(|| std::env::var("DAB_KEY_FILENAME").ok())
        .unwrap_or_else(|| "archive-key.asc".to_string());

    let settings = IndexSettings {
        base_url,
        key_filename,
        origin: repository_origin(&repo_dir).unwrap_or_else(|| "debian-autobuild".to_string()),
    };

    write_index(&Reprepro::new(&repo_dir), &settings, &output)?;

    println!("wrote {}", output.display());

    Ok(())
}

fn command_publish(args: &ArgMatches) -> Result<()> {
    let repo_dir = PathBuf::from(args.value_of("repo").expect("repo argument is required"));
    let dest = args.value_of("dest").expect("dest argument is required");

    let publisher = Publisher::new(dest)
        .remote_subdir(args.value_of("remote-subdir").map(|x| x.to_string()))
        .dry_run(args.is_present("dry-run"))
        .delete_extraneous(args.is_present("delete"));

    let index_file = args.value_of("index-file").map(PathBuf::from);

    publisher.publish(&repo_dir, index_file.as_deref())?;

    Ok(())
}
