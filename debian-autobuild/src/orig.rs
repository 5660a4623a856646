// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Upstream source tarball management.

Non-native packages need a `<source>_<upstream>.orig.tar.gz` next to the
build tree. The repository tool refuses to re-register a filename with
different checksums, so once an orig tarball for an upstream version has
been published, later Debian revisions must reuse the exact bytes from
the pool. Only when the pool has no copy is a tarball generated, and
generation is deterministic: stable entry order, normalized ownership
and modes, zero mtimes, and a gzip header without a timestamp.
*/

use {
    crate::{
        changelog::SourceIdentity,
        error::Result,
        vcs::WorkingTree,
    },
    log::info,
    std::{
        io::Write,
        path::{Path, PathBuf},
    },
};

/// How the orig tarball requirement was satisfied.
#[derive(Debug, Eq, PartialEq)]
pub enum OrigDisposition {
    /// Native package; no tarball required.
    Native,
    /// Byte-identical copy taken from the repository pool.
    ReusedFromPool(PathBuf),
    /// Freshly generated from tracked content.
    Generated(PathBuf),
}

/// Compute a file's path inside the repository pool.
///
/// The layout is `pool/<component>/<prefix>/<source>/<filename>` where
/// the prefix is the first character of the source name, or the first
/// four characters for `lib*` packages.
pub fn pool_path(component: &str, source: &str, filename: &str) -> String {
    let prefix = if source.starts_with("lib") && source.len() >= 4 {
        &source[0..4]
    } else {
        &source[0..1]
    };

    format!("pool/{}/{}/{}/{}", component, prefix, source, filename)
}

/// Locate an already published orig tarball in the repository pool.
pub fn pool_orig_tarball(
    repo_dir: &Path,
    component: &str,
    identity: &SourceIdentity,
) -> Option<PathBuf> {
    let path = repo_dir.join(pool_path(
        component,
        identity.source(),
        &identity.orig_tarball_name(),
    ));

    if path.is_file() {
        Some(path)
    } else {
        None
    }
}

/// Ensure an orig tarball exists in `dest_dir` for a build.
///
/// Reuse from the pool wins unless `force_regenerate` is set. Native
/// packages are a no-op.
pub fn ensure_orig_tarball(
    working_tree: &WorkingTree,
    identity: &SourceIdentity,
    repo_dir: &Path,
    component: &str,
    dest_dir: &Path,
    force_regenerate: bool,
) -> Result<OrigDisposition> {
    if identity.version().is_native() {
        return Ok(OrigDisposition::Native);
    }

    let dest = dest_dir.join(identity.orig_tarball_name());

    if !force_regenerate {
        if let Some(pooled) = pool_orig_tarball(repo_dir, component, identity) {
            info!(
                "reusing published orig tarball {} for {}",
                pooled.display(),
                identity.source()
            );
            std::fs::copy(&pooled, &dest)?;

            return Ok(OrigDisposition::ReusedFromPool(dest));
        }
    }

    let prefix = format!(
        "{}-{}",
        identity.source(),
        identity.version().upstream_version()
    );

    let mut files = working_tree
        .tracked_files()?
        .into_iter()
        .filter(|path| include_in_orig(path))
        .map(|relative| {
            let absolute = working_tree.path().join(&relative);
            (relative, absolute)
        })
        .collect::<Vec<_>>();

    files.sort_by(|a, b| a.0.as_os_str().cmp(b.0.as_os_str()));

    let file = std::fs::File::create(&dest)?;
    write_orig_tarball(file, &prefix, &files)?;

    info!(
        "generated orig tarball {} ({} files)",
        dest.display(),
        files.len()
    );

    Ok(OrigDisposition::Generated(dest))
}

/// Whether a tracked path belongs in the upstream tarball.
///
/// Packaging metadata under `debian/` and VCS metadata files are
/// excluded.
fn include_in_orig(path: &Path) -> bool {
    if path.starts_with("debian") {
        return false;
    }

    !path.components().any(|component| {
        component
            .as_os_str()
            .to_string_lossy()
            .starts_with(".git")
    })
}

/// Write a deterministic gzip-compressed tar of the given files.
///
/// `files` are `(archive-relative path, source path)` pairs; entries are
/// emitted in the given order under `<prefix>/`. Modes are normalized to
/// 0o644 / 0o755, ownership to root, and all timestamps to zero, so the
/// same inputs always produce the same bytes.
pub fn write_orig_tarball<W: Write>(
    writer: W,
    prefix: &str,
    files: &[(PathBuf, PathBuf)],
) -> Result<()> {
    let header = libflate::gzip::HeaderBuilder::new()
        .modification_time(0)
        .finish();

    let encoder = libflate::gzip::Encoder::with_options(
        writer,
        libflate::gzip::EncodeOptions::new().header(header),
    )?;

    let mut builder = tar::Builder::new(encoder);

    for (relative, source) in files {
        let metadata = std::fs::metadata(source)?;

        let mut header = tar::Header::new_gnu();
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("root")?;
        header.set_groupname("root")?;
        header.set_mtime(0);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(normalized_mode(&metadata));
        header.set_size(metadata.len());

        let mut reader = std::fs::File::open(source)?;
        builder.append_data(
            &mut header,
            Path::new(prefix).join(relative),
            &mut reader,
        )?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish().into_result()?;

    Ok(())
}

#[cfg(unix)]
fn normalized_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}

#[cfg(not(unix))]
fn normalized_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture_files(root: &Path) -> Vec<(PathBuf, PathBuf)> {
        let mut files = vec![];

        for (relative, content) in [("src/main.c", "int main(void) {}\n"), ("COPYING", "license\n")]
        {
            let absolute = root.join(relative);
            std::fs::create_dir_all(absolute.parent().unwrap()).unwrap();
            std::fs::write(&absolute, content).unwrap();
            files.push((PathBuf::from(relative), absolute));
        }

        files.sort_by(|a, b| a.0.as_os_str().cmp(b.0.as_os_str()));

        files
    }

    #[test]
    fn pool_paths() {
        assert_eq!(
            pool_path("main", "widget", "widget_1.0.orig.tar.gz"),
            "pool/main/w/widget/widget_1.0.orig.tar.gz"
        );
        assert_eq!(
            pool_path("main", "libwidget", "libwidget_1.0.orig.tar.gz"),
            "pool/main/libw/libwidget/libwidget_1.0.orig.tar.gz"
        );
    }

    #[test]
    fn pool_lookup_finds_published_tarball() -> Result<()> {
        let identity =
            crate::changelog::SourceIdentity::from_changelog("widget (1.0-2) stable; urgency=low\n")?;

        let repo = tempfile::tempdir()?;
        assert!(pool_orig_tarball(repo.path(), "main", &identity).is_none());

        let pooled = repo
            .path()
            .join("pool/main/w/widget/widget_1.0.orig.tar.gz");
        std::fs::create_dir_all(pooled.parent().unwrap())?;
        std::fs::write(&pooled, "tarball")?;

        assert_eq!(
            pool_orig_tarball(repo.path(), "main", &identity),
            Some(pooled)
        );

        Ok(())
    }

    #[test]
    fn orig_excludes_packaging_and_vcs_metadata() {
        assert!(include_in_orig(Path::new("src/lib.c")));
        assert!(!include_in_orig(Path::new("debian/control")));
        assert!(!include_in_orig(Path::new("debian/source/format")));
        assert!(!include_in_orig(Path::new(".gitignore")));
        assert!(!include_in_orig(Path::new("docs/.gitattributes")));
    }

    #[test]
    fn generation_is_deterministic() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let files = fixture_files(temp.path());

        let mut first = vec![];
        write_orig_tarball(&mut first, "widget-1.0", &files)?;

        let mut second = vec![];
        write_orig_tarball(&mut second, "widget-1.0", &files)?;

        assert!(!first.is_empty());
        assert_eq!(first, second);

        Ok(())
    }

    #[test]
    fn entries_are_prefixed() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let files = fixture_files(temp.path());

        let mut bytes = vec![];
        write_orig_tarball(&mut bytes, "widget-1.0", &files)?;

        let decoder = libflate::gzip::Decoder::new(std::io::Cursor::new(bytes))?;
        let mut archive = tar::Archive::new(decoder);

        let paths = archive
            .entries()?
            .map(|entry| {
                entry
                    .and_then(|e| e.path().map(|p| p.display().to_string()))
                    .unwrap()
            })
            .collect::<Vec<_>>();

        assert_eq!(paths, vec!["widget-1.0/COPYING", "widget-1.0/src/main.c"]);

        Ok(())
    }
}
