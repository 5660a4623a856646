// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The per-project build/publish pipeline.

Each project moves through
`FETCH → PREPARE → (SKIP | (ORIG → BUILD → INCLUDE))`. Any step failure
aborts the entire run with the project name, URL, and step attached to
the error; there is no partial-continue mode. Projects are processed
strictly sequentially because the repository tool's database is not safe
for concurrent writers.
*/

use {
    crate::{
        build_tree::prepare_build_tree,
        builder::{build_package, write_build_marker, BUILD_TOOL},
        changelog::SourceIdentity,
        changes::discover_changes,
        command::{ensure_tools, run_captured},
        config::PipelineConfig,
        error::{AutobuildError, Result},
        orig::{ensure_orig_tarball, pool_orig_tarball},
        project_list::{filter_projects, read_project_list, ProjectEntry},
        reprepro::{IncludeOutcome, PackageListEntry, Reprepro},
        signing::prime_passphrase_cache,
        vcs::WorkingTree,
    },
    log::{info, warn},
    std::fmt::{Display, Formatter},
};

/// External tools the pipeline requires before any project is touched.
pub const REQUIRED_TOOLS: &[&str] = &["git", "dpkg", BUILD_TOOL, "reprepro"];

/// Pipeline stages, used for error context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step {
    Fetch,
    Prepare,
    Orig,
    Build,
    Include,
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Prepare => write!(f, "prepare"),
            Self::Orig => write!(f, "orig-tarball"),
            Self::Build => write!(f, "build"),
            Self::Include => write!(f, "include"),
        }
    }
}

/// What happened to one project.
#[derive(Debug)]
pub enum ProjectOutcome {
    /// The repository already has this version; nothing was built.
    Skipped(SourceIdentity),
    /// Built and registered the given number of changes files.
    Built(SourceIdentity, usize),
}

/// Totals for a full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub built: usize,
    pub skipped: usize,
}

/// Decide whether a project can be skipped, from repository listing rows
/// already filtered to the exact (source, version).
///
/// Source-only runs key on the source entry; binary runs key on a
/// binary entry for the host architecture.
pub fn skip_decision(entries: &[PackageListEntry], source_only: bool, architecture: &str) -> bool {
    if source_only {
        entries.iter().any(|entry| entry.is_source())
    } else {
        entries
            .iter()
            .any(|entry| entry.architecture == architecture)
    }
}

/// A configured, environment-checked pipeline.
pub struct BuildPipeline {
    config: PipelineConfig,
    reprepro: Reprepro,
    architecture: String,
}

impl BuildPipeline {
    /// Validate the environment and construct a pipeline.
    ///
    /// Fails before any project is processed when a required tool, the
    /// list file, or the repository is missing.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        ensure_tools(REQUIRED_TOOLS)?;

        if !config.list_file.is_file() {
            return Err(AutobuildError::ProjectListMissing(
                config.list_file.display().to_string(),
            ));
        }

        let reprepro = Reprepro::new(&config.repo_dir);

        if !reprepro.is_initialized() {
            return Err(AutobuildError::RepositoryNotInitialized(
                config.repo_dir.join("conf/distributions").display().to_string(),
            ));
        }

        let architecture = match &config.architecture {
            Some(arch) => arch.clone(),
            None => host_architecture()?,
        };

        Ok(Self {
            config,
            reprepro,
            architecture,
        })
    }

    /// Run the pipeline over all projects matching the filters.
    pub fn run(&self, filters: &[String]) -> Result<RunSummary> {
        if let Some(passphrase_file) = &self.config.passphrase_file {
            prime_passphrase_cache(passphrase_file);
        }

        let entries = filter_projects(read_project_list(&self.config.list_file)?, filters);

        if entries.is_empty() {
            warn!("no projects matched; nothing to do");
            return Ok(RunSummary::default());
        }

        std::fs::create_dir_all(&self.config.workspace_dir)?;

        let mut summary = RunSummary::default();

        for entry in &entries {
            match self.run_project(entry)? {
                ProjectOutcome::Skipped(identity) => {
                    info!(
                        "{} {} already present; skipping",
                        identity.source(),
                        identity.version()
                    );
                    summary.skipped += 1;
                }
                ProjectOutcome::Built(identity, changes) => {
                    info!(
                        "{} {} built and registered ({} changes files)",
                        identity.source(),
                        identity.version(),
                        changes
                    );
                    summary.built += 1;
                }
            }
        }

        // One export at the end regenerates and signs the indices once,
        // no matter how many includes happened.
        self.reprepro.export(Some(&self.config.codename))?;

        Ok(summary)
    }

    fn run_project(&self, entry: &ProjectEntry) -> Result<ProjectOutcome> {
        let working_tree = step_context(
            entry,
            Step::Fetch,
            WorkingTree::obtain(&self.config.workspace_dir, entry),
        )?;

        let build_tree = step_context(
            entry,
            Step::Prepare,
            prepare_build_tree(&working_tree, &self.config.workspace_dir, entry.name()),
        )?;

        let identity = step_context(
            entry,
            Step::Prepare,
            SourceIdentity::from_build_tree(build_tree.path()),
        )?;

        if !self.config.force_rebuild {
            let rows = step_context(
                entry,
                Step::Prepare,
                self.reprepro.list_source_version(
                    &self.config.codename,
                    identity.source(),
                    &identity.version().to_string(),
                ),
            )?;

            if skip_decision(&rows, self.config.source_only, &self.architecture) {
                return Ok(ProjectOutcome::Skipped(identity));
            }
        }

        // Pool state is sampled before the orig tarball step can add a
        // local copy; this drives both tarball reuse and the build
        // tool's source-inclusion flag.
        let orig_in_pool = pool_orig_tarball(
            &self.config.repo_dir,
            &self.config.component,
            &identity,
        )
        .is_some();

        step_context(
            entry,
            Step::Orig,
            ensure_orig_tarball(
                &working_tree,
                &identity,
                &self.config.repo_dir,
                &self.config.component,
                &self.config.workspace_dir,
                self.config.force_orig,
            )
            .map(|_| ()),
        )?;

        let marker = step_context(
            entry,
            Step::Build,
            write_build_marker(&self.config.workspace_dir, identity.source()),
        )?;

        step_context(
            entry,
            Step::Build,
            build_package(
                build_tree.path(),
                &identity,
                &self.config.build_options,
                orig_in_pool,
            ),
        )?;

        let artifacts = step_context(
            entry,
            Step::Include,
            discover_changes(
                &self.config.workspace_dir,
                &identity.changes_pattern(),
                Some(&marker),
            ),
        )?;

        let count = artifacts.len();

        for changes in &artifacts {
            step_context(
                entry,
                Step::Include,
                self.include_with_retry(&identity, changes),
            )?;
        }

        Ok(ProjectOutcome::Built(identity, count))
    }

    /// Include one changes file, compensating for a checksum conflict
    /// exactly once when a forced rebuild was requested.
    fn include_with_retry(&self, identity: &SourceIdentity, changes: &std::path::Path) -> Result<()> {
        match self.reprepro.include(&self.config.codename, changes)? {
            IncludeOutcome::Included => Ok(()),
            IncludeOutcome::Failed(output) => Err(AutobuildError::IncludeFailed(output)),
            IncludeOutcome::ChecksumConflict(output) => {
                if !self.config.force_rebuild {
                    return Err(AutobuildError::IncludeConflict(output));
                }

                warn!(
                    "{} {} collides with registered checksums; removing and retrying once",
                    identity.source(),
                    identity.version()
                );

                self.reprepro.remove_source_version(
                    &self.config.codename,
                    identity.source(),
                    &identity.version().to_string(),
                )?;
                self.reprepro.delete_unreferenced()?;

                match self.reprepro.include(&self.config.codename, changes)? {
                    IncludeOutcome::Included => Ok(()),
                    IncludeOutcome::ChecksumConflict(output)
                    | IncludeOutcome::Failed(output) => {
                        Err(AutobuildError::IncludeFailed(output))
                    }
                }
            }
        }
    }
}

fn step_context<T>(entry: &ProjectEntry, step: Step, result: Result<T>) -> Result<T> {
    result.map_err(|err| err.with_step_context(entry.name(), entry.url(), step))
}

fn host_architecture() -> Result<String> {
    Ok(run_captured("dpkg", ["--print-architecture"], None)?
        .trim()
        .to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    fn entry(architecture: &str) -> PackageListEntry {
        PackageListEntry {
            codename: "stable".to_string(),
            component: "main".to_string(),
            architecture: architecture.to_string(),
            package: "widget".to_string(),
            version: "1.0-1".to_string(),
        }
    }

    #[test]
    fn binary_gate_matches_host_architecture() {
        let rows = vec![entry("source"), entry("amd64")];

        assert!(skip_decision(&rows, false, "amd64"));
        assert!(!skip_decision(&rows, false, "arm64"));
    }

    #[test]
    fn source_only_gate_ignores_binaries() {
        let rows = vec![entry("amd64")];
        assert!(!skip_decision(&rows, true, "amd64"));

        let rows = vec![entry("source")];
        assert!(skip_decision(&rows, true, "amd64"));
    }

    #[test]
    fn empty_listing_never_skips() {
        assert!(!skip_decision(&[], false, "amd64"));
        assert!(!skip_decision(&[], true, "amd64"));
    }
}
