// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Deciding where a package gets built.

Most trees can be built in place. A tree is exported to a clean copy of
its tracked content when the declared source format makes in-place
builds unsafe, when untracked files could leak into the source package,
or when `debian/rules` references a debhelper addon the host does not
provide (the exported copy is then patched, never the working tree).
*/

use {
    crate::{error::Result, vcs::WorkingTree},
    log::{info, warn},
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        fmt::{Display, Formatter},
        io::Cursor,
        path::{Path, PathBuf},
    },
};

/// Source formats that are safe to build from the working tree itself.
pub const IN_PLACE_SOURCE_FORMATS: &[&str] = &["3.0 (native)", "3.0 (quilt)"];

/// Directories searched for debhelper sequence addons.
const DH_SEQUENCE_DIRS: &[&str] = &[
    "/usr/share/perl5/Debian/Debhelper/Sequence",
    "/usr/local/share/perl5/Debian/Debhelper/Sequence",
];

static RULES_WITH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"--with[= ]([A-Za-z0-9_.,+-]+)").expect("rules addon regex is valid")
});

/// Why a tree cannot be built in place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExportReason {
    SourceFormatMissing,
    SourceFormatUnsafe(String),
    AddonUnavailable(String),
    UntrackedFiles(usize),
}

impl Display for ExportReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceFormatMissing => write!(f, "debian/source/format is absent"),
            Self::SourceFormatUnsafe(format) => {
                write!(f, "source format {:?} is not safe to build in place", format)
            }
            Self::AddonUnavailable(addon) => {
                write!(f, "debhelper addon {} is not available on this host", addon)
            }
            Self::UntrackedFiles(count) => {
                write!(f, "{} untracked file(s) outside debian/", count)
            }
        }
    }
}

/// Evaluate the export decision from its inputs.
///
/// Pure function so the decision matrix is testable without a Git tree.
pub fn export_reasons(
    source_format: Option<&str>,
    untracked: &[PathBuf],
    missing_addons: &[String],
) -> Vec<ExportReason> {
    let mut reasons = vec![];

    match source_format {
        None => reasons.push(ExportReason::SourceFormatMissing),
        Some(format) if !IN_PLACE_SOURCE_FORMATS.contains(&format) => {
            reasons.push(ExportReason::SourceFormatUnsafe(format.to_string()));
        }
        Some(_) => {}
    }

    for addon in missing_addons {
        reasons.push(ExportReason::AddonUnavailable(addon.clone()));
    }

    let stray = untracked
        .iter()
        .filter(|path| !path.starts_with("debian"))
        .count();

    if stray > 0 {
        reasons.push(ExportReason::UntrackedFiles(stray));
    }

    reasons
}

/// Addon names referenced by `--with` in rules content.
pub fn rules_addons(rules: &str) -> Vec<String> {
    let mut addons = vec![];

    for caps in RULES_WITH_RE.captures_iter(rules) {
        for addon in caps[1].split(',') {
            if !addon.is_empty() && !addons.iter().any(|existing| existing == addon) {
                addons.push(addon.to_string());
            }
        }
    }

    addons
}

fn addon_available_in(dirs: &[&str], addon: &str) -> bool {
    // Sequence files use underscores where addon names use hyphens.
    let module = addon.replace('-', "_");

    dirs.iter()
        .any(|dir| Path::new(dir).join(format!("{}.pm", module)).is_file())
}

/// Whether a debhelper addon is installed on this host.
pub fn addon_available(addon: &str) -> bool {
    addon_available_in(DH_SEQUENCE_DIRS, addon)
}

/// Remove an addon from every `--with` list in rules content.
///
/// Returns `None` when the content is unchanged.
pub fn strip_rules_addon(rules: &str, addon: &str) -> Option<String> {
    let rewritten = RULES_WITH_RE.replace_all(rules, |caps: &regex::Captures| {
        let separator = &caps[0][6..7];

        let remaining = caps[1]
            .split(',')
            .filter(|name| *name != addon)
            .collect::<Vec<_>>();

        if remaining.is_empty() {
            String::new()
        } else {
            format!("--with{}{}", separator, remaining.join(","))
        }
    });

    if rewritten == rules {
        None
    } else {
        Some(rewritten.into_owned())
    }
}

/// Where a package will actually be built.
pub enum BuildTree {
    /// Build runs directly inside the working tree.
    InPlace(PathBuf),
    /// Build runs in an exported snapshot of tracked content.
    Exported(PathBuf),
}

impl BuildTree {
    pub fn path(&self) -> &Path {
        match self {
            Self::InPlace(path) => path,
            Self::Exported(path) => path,
        }
    }
}

fn read_source_format(tree: &Path) -> Result<Option<String>> {
    let path = tree.join("debian").join("source").join("format");

    if path.is_file() {
        Ok(Some(std::fs::read_to_string(path)?.trim().to_string()))
    } else {
        Ok(None)
    }
}

fn missing_rules_addons(tree: &Path) -> Result<Vec<String>> {
    let rules = tree.join("debian").join("rules");

    if !rules.is_file() {
        return Ok(vec![]);
    }

    Ok(rules_addons(&std::fs::read_to_string(rules)?)
        .into_iter()
        .filter(|addon| !addon_available(addon))
        .collect())
}

/// Prepare the directory a project will be built in.
pub fn prepare_build_tree(
    working_tree: &WorkingTree,
    workspace: &Path,
    name: &str,
) -> Result<BuildTree> {
    let source_format = read_source_format(working_tree.path())?;
    let untracked = working_tree.untracked_files()?;
    let missing_addons = missing_rules_addons(working_tree.path())?;

    let reasons = export_reasons(source_format.as_deref(), &untracked, &missing_addons);

    if reasons.is_empty() {
        return Ok(BuildTree::InPlace(working_tree.path().to_path_buf()));
    }

    for reason in &reasons {
        info!("{}: exporting for build: {}", name, reason);
    }

    let target = export_tracked_content(working_tree, workspace, name)?;

    for addon in &missing_addons {
        patch_rules(&target, addon)?;
    }

    Ok(BuildTree::Exported(target))
}

fn export_tracked_content(
    working_tree: &WorkingTree,
    workspace: &Path,
    name: &str,
) -> Result<PathBuf> {
    let mut target = workspace.join(format!("{}-export", name));

    if target.exists() {
        if let Err(err) = std::fs::remove_dir_all(&target) {
            // Permission problems on leftovers from an earlier run must
            // not fail the whole pipeline. Fall back to a fresh sibling.
            warn!(
                "unable to remove {} ({}); using a fresh export directory",
                target.display(),
                err
            );

            target = tempfile::Builder::new()
                .prefix(&format!("{}-export-", name))
                .tempdir_in(workspace)?
                .into_path();
        }
    }

    std::fs::create_dir_all(&target)?;

    let archive = working_tree.archive_head()?;
    tar::Archive::new(Cursor::new(archive)).unpack(&target)?;

    info!("exported {} to {}", name, target.display());

    Ok(target)
}

fn patch_rules(tree: &Path, addon: &str) -> Result<()> {
    let rules = tree.join("debian").join("rules");

    if !rules.is_file() {
        return Ok(());
    }

    let content = std::fs::read_to_string(&rules)?;

    if let Some(rewritten) = strip_rules_addon(&content, addon) {
        warn!(
            "stripping unavailable debhelper addon {} from {}",
            addon,
            rules.display()
        );
        std::fs::write(&rules, rewritten)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn no_untracked() -> Vec<PathBuf> {
        vec![]
    }

    #[test]
    fn in_place_safe_formats_build_in_place() {
        for format in IN_PLACE_SOURCE_FORMATS {
            assert!(export_reasons(Some(format), &no_untracked(), &[]).is_empty());
        }
    }

    #[test]
    fn missing_or_unsafe_format_forces_export() {
        assert_eq!(
            export_reasons(None, &no_untracked(), &[]),
            vec![ExportReason::SourceFormatMissing]
        );
        assert_eq!(
            export_reasons(Some("1.0"), &no_untracked(), &[]),
            vec![ExportReason::SourceFormatUnsafe("1.0".to_string())]
        );
    }

    #[test]
    fn untracked_files_outside_debian_force_export() {
        let untracked = vec![PathBuf::from("src/scratch.c")];
        assert_eq!(
            export_reasons(Some("3.0 (quilt)"), &untracked, &[]),
            vec![ExportReason::UntrackedFiles(1)]
        );

        // Untracked files inside debian/ are harmless.
        let untracked = vec![PathBuf::from("debian/files")];
        assert!(export_reasons(Some("3.0 (quilt)"), &untracked, &[]).is_empty());
    }

    #[test]
    fn missing_addon_forces_export() {
        let missing = vec!["quilt".to_string()];
        assert_eq!(
            export_reasons(Some("3.0 (native)"), &no_untracked(), &missing),
            vec![ExportReason::AddonUnavailable("quilt".to_string())]
        );
    }

    #[test]
    fn addons_parsed_from_rules() {
        let rules = "%:\n\tdh $@ --with quilt,systemd --parallel\n";
        assert_eq!(rules_addons(rules), vec!["quilt", "systemd"]);

        let rules = "%:\n\tdh $@ --with=python3\n";
        assert_eq!(rules_addons(rules), vec!["python3"]);

        assert!(rules_addons("%:\n\tdh $@\n").is_empty());
    }

    #[test]
    fn strip_addon_rewrites_rules() {
        let rules = "%:\n\tdh $@ --with quilt,systemd\n";
        assert_eq!(
            strip_rules_addon(rules, "quilt").as_deref(),
            Some("%:\n\tdh $@ --with systemd\n")
        );

        let rules = "%:\n\tdh $@ --with=quilt\n";
        assert_eq!(
            strip_rules_addon(rules, "quilt").as_deref(),
            Some("%:\n\tdh $@ \n")
        );

        assert!(strip_rules_addon("%:\n\tdh $@\n", "quilt").is_none());
    }
}
