// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Locating the `.changes` artifacts a build produced.

Artifacts are matched by the `<source>_<version>_*.changes` filename
pattern in the build tree's parent directory. When a build-start marker
exists, only files at least as new as the marker are accepted; this
keeps stale output of earlier failed runs from being registered. A build
that produced no artifacts is an error, never a silent no-op.
*/

use {
    crate::error::{AutobuildError, Result},
    log::info,
    std::{
        path::{Path, PathBuf},
        time::SystemTime,
    },
};

fn marker_time(marker: Option<&Path>) -> Option<SystemTime> {
    let metadata = std::fs::metadata(marker?).ok()?;

    metadata.modified().ok()
}

fn is_fresh(path: &Path, threshold: Option<SystemTime>) -> bool {
    if let Some(threshold) = threshold {
        match std::fs::metadata(path).and_then(|m| m.modified()) {
            // >= rather than > tolerates coarse filesystem timestamps.
            Ok(modified) => modified >= threshold,
            Err(_) => false,
        }
    } else {
        true
    }
}

/// Discover the `.changes` files produced by a build.
pub fn discover_changes(
    dir: &Path,
    pattern: &str,
    marker: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let search = format!("{}/{}", glob::Pattern::escape(&dir.display().to_string()), pattern);

    let threshold = marker_time(marker);

    let mut artifacts = vec![];

    for entry in glob::glob(&search)? {
        let path = entry?;

        if is_fresh(&path, threshold) {
            artifacts.push(path);
        } else {
            info!("ignoring stale changes file {}", path.display());
        }
    }

    artifacts.sort();

    if artifacts.is_empty() {
        Err(AutobuildError::NoChangesArtifacts(search))
    } else {
        Ok(artifacts)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn finds_matching_artifacts() -> Result<()> {
        let temp = tempfile::tempdir()?;

        std::fs::write(temp.path().join("widget_1.0-1_amd64.changes"), "x")?;
        std::fs::write(temp.path().join("widget_1.0-1_source.changes"), "x")?;
        std::fs::write(temp.path().join("other_2.0-1_amd64.changes"), "x")?;

        let found = discover_changes(temp.path(), "widget_1.0-1_*.changes", None)?;

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("widget_")));

        Ok(())
    }

    #[test]
    fn stale_artifacts_are_ignored() -> Result<()> {
        let temp = tempfile::tempdir()?;

        let stale = temp.path().join("widget_1.0-1_amd64.changes");
        std::fs::write(&stale, "x")?;
        // Backdate well before the marker.
        let past = SystemTime::now() - std::time::Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&stale)?
            .set_modified(past)?;

        let marker = temp.path().join(".widget.build-started");
        std::fs::write(&marker, "")?;

        let err = discover_changes(temp.path(), "widget_1.0-1_*.changes", Some(&marker));
        assert!(matches!(err, Err(AutobuildError::NoChangesArtifacts(_))));

        let fresh = temp.path().join("widget_1.0-1_source.changes");
        std::fs::write(&fresh, "x")?;

        let found = discover_changes(temp.path(), "widget_1.0-1_*.changes", Some(&marker))?;
        assert_eq!(found, vec![fresh]);

        Ok(())
    }

    #[test]
    fn empty_result_is_an_error() -> Result<()> {
        let temp = tempfile::tempdir()?;

        assert!(matches!(
            discover_changes(temp.path(), "widget_1.0-1_*.changes", None),
            Err(AutobuildError::NoChangesArtifacts(_))
        ));

        Ok(())
    }
}
