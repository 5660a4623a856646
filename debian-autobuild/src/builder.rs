// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Driving the external package build tool. */

use {
    crate::{
        changelog::SourceIdentity,
        command::run_logged,
        error::Result,
        version::PackageVersion,
    },
    log::info,
    std::path::{Path, PathBuf},
};

/// Build command invoked inside the build tree.
pub const BUILD_TOOL: &str = "dpkg-buildpackage";

/// Options that restrict a build to binary packages.
const BINARY_ONLY_OPTIONS: &[&str] = &["-b", "-B", "-A", "--build=binary", "--build=any", "--build=all"];

/// Options that explicitly pick a source inclusion mode.
const SOURCE_INCLUSION_OPTIONS: &[&str] = &["-sa", "-sd", "-si"];

fn binary_only(options: &[String]) -> bool {
    options
        .iter()
        .any(|opt| BINARY_ONLY_OPTIONS.contains(&opt.as_str()))
}

fn has_source_inclusion_mode(options: &[String]) -> bool {
    options
        .iter()
        .any(|opt| SOURCE_INCLUSION_OPTIONS.contains(&opt.as_str()))
}

/// Compute the final build tool argument vector.
///
/// `-sa` (ship the orig tarball in the upload) is added exactly when the
/// build produces a source package, the caller did not pick an inclusion
/// mode explicitly, and the repository pool does not already hold the
/// orig tarball — i.e. when this build must be the one to supply it.
pub fn compute_build_args(
    base_options: &[String],
    version: &PackageVersion,
    orig_in_pool: bool,
) -> Vec<String> {
    let mut args = base_options.to_vec();

    if !version.is_native()
        && !binary_only(base_options)
        && !has_source_inclusion_mode(base_options)
        && !orig_in_pool
    {
        args.push("-sa".to_string());
    }

    args
}

/// Marker file created immediately before a build starts.
///
/// Artifact discovery later uses its mtime to tell this build's output
/// apart from stale leftovers of earlier failed runs.
pub fn write_build_marker(dir: &Path, source: &str) -> Result<PathBuf> {
    let marker = dir.join(format!(".{}.build-started", source));

    std::fs::write(&marker, b"")?;

    Ok(marker)
}

/// Run the build tool in the build tree.
///
/// Artifacts land in the build tree's parent directory. A non-zero exit
/// is fatal for the project and, by extension, the run.
pub fn build_package(
    build_tree: &Path,
    identity: &SourceIdentity,
    base_options: &[String],
    orig_in_pool: bool,
) -> Result<()> {
    let args = compute_build_args(base_options, identity.version(), orig_in_pool);

    info!(
        "building {} {} in {}",
        identity.source(),
        identity.version(),
        build_tree.display()
    );

    run_logged(BUILD_TOOL, &args, Some(build_tree))
}

#[cfg(test)]
mod test {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|x| x.to_string()).collect()
    }

    fn version(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    #[test]
    fn adds_sa_when_pool_lacks_orig() {
        let args = compute_build_args(&opts(&["-us", "-uc"]), &version("1.0-1"), false);
        assert_eq!(args, opts(&["-us", "-uc", "-sa"]));
    }

    #[test]
    fn no_sa_when_orig_already_published() {
        let args = compute_build_args(&opts(&["-us", "-uc"]), &version("1.0-2"), true);
        assert_eq!(args, opts(&["-us", "-uc"]));
    }

    #[test]
    fn no_sa_for_native_packages() {
        let args = compute_build_args(&opts(&["-us", "-uc"]), &version("1.0"), false);
        assert_eq!(args, opts(&["-us", "-uc"]));
    }

    #[test]
    fn no_sa_for_binary_only_builds() {
        for flag in ["-b", "-B", "--build=binary"] {
            let args = compute_build_args(&opts(&["-us", "-uc", flag]), &version("1.0-1"), false);
            assert!(!args.contains(&"-sa".to_string()), "flag {}", flag);
        }
    }

    #[test]
    fn explicit_inclusion_mode_wins() {
        for flag in ["-sa", "-sd"] {
            let args = compute_build_args(&opts(&["-S", flag]), &version("1.0-1"), false);
            assert_eq!(args.iter().filter(|a| *a == flag).count(), 1);
            assert_eq!(args.len(), 2);
        }
    }

    #[test]
    fn marker_is_created() -> Result<()> {
        let temp = tempfile::tempdir()?;

        let marker = write_build_marker(temp.path(), "widget")?;

        assert!(marker.is_file());
        assert!(marker
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("widget"));

        Ok(())
    }
}
