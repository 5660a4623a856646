// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Git working tree management.

The fetcher's contract: after [WorkingTree::obtain] succeeds, the local
tree is at the exact remote default-branch head. Force pushed or
otherwise diverged history is handled by hard resetting to the remote
tip. A dirty tree is a hard stop, never auto-stashed, so local edits are
not silently discarded.
*/

use {
    crate::{
        command::{run_captured, run_captured_bytes, run_logged, run_unchecked},
        error::{AutobuildError, Result},
        project_list::ProjectEntry,
    },
    log::{info, warn},
    std::path::{Path, PathBuf},
};

/// Branch name assumed when the remote HEAD cannot be resolved.
pub const FALLBACK_BRANCH: &str = "main";

/// A local clone of a project's Git remote.
pub struct WorkingTree {
    path: PathBuf,
}

impl WorkingTree {
    /// Clone or update the working tree for a project.
    pub fn obtain(workspace: &Path, entry: &ProjectEntry) -> Result<Self> {
        let path = workspace.join(entry.name());

        let tree = Self { path };

        if tree.path.join(".git").exists() {
            tree.update(entry)?;
        } else {
            info!("cloning {} into {}", entry.url(), tree.path.display());
            let destination = tree.path.display().to_string();
            run_logged("git", ["clone", entry.url(), destination.as_str()], None)?;
        }

        // Clones can also be on a stale or wrong branch (e.g. after the
        // remote changed its default). Normalize unconditionally.
        let branch = tree.default_branch()?;
        tree.checkout_remote_branch(&branch)?;

        info!(
            "{} is at {} ({})",
            entry.name(),
            branch,
            tree.head_commit()?
        );

        Ok(tree)
    }

    /// Filesystem location of the tree.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, entry: &ProjectEntry) -> Result<()> {
        self.ensure_clean()?;

        info!("fetching {} in {}", entry.url(), self.path.display());
        run_logged("git", ["fetch", "--prune", "origin"], Some(&self.path))?;

        Ok(())
    }

    /// Error unless the tree has no staged or unstaged changes.
    ///
    /// Untracked files are allowed here; they influence the build tree
    /// decision instead.
    pub fn ensure_clean(&self) -> Result<()> {
        let status = run_captured("git", ["status", "--porcelain"], Some(&self.path))?;

        let dirty = status
            .lines()
            .any(|line| !line.starts_with("??") && !line.trim().is_empty());

        if dirty {
            Err(AutobuildError::DirtyTree(self.path.display().to_string()))
        } else {
            Ok(())
        }
    }

    /// Paths of untracked files in the tree.
    pub fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        let status = run_captured("git", ["status", "--porcelain"], Some(&self.path))?;

        Ok(status
            .lines()
            .filter_map(|line| line.strip_prefix("?? "))
            .map(PathBuf::from)
            .collect())
    }

    /// Resolve the remote's default branch via its symbolic HEAD.
    pub fn default_branch(&self) -> Result<String> {
        let output = run_unchecked(
            "git",
            ["ls-remote", "--symref", "origin", "HEAD"],
            Some(&self.path),
        )?;

        if output.success() {
            for line in output.output.lines() {
                if let Some(rest) = line.strip_prefix("ref:") {
                    if let Some(name) = rest
                        .split_whitespace()
                        .next()
                        .and_then(|r| r.strip_prefix("refs/heads/"))
                    {
                        return Ok(name.to_string());
                    }
                }
            }
        }

        warn!(
            "could not resolve remote HEAD for {}; assuming branch {}",
            self.path.display(),
            FALLBACK_BRANCH
        );

        Ok(FALLBACK_BRANCH.to_string())
    }

    fn checkout_remote_branch(&self, branch: &str) -> Result<()> {
        let remote_ref = format!("refs/remotes/origin/{}", branch);

        let probe = run_unchecked(
            "git",
            ["rev-parse", "--verify", "--quiet", remote_ref.as_str()],
            Some(&self.path),
        )?;

        if !probe.success() {
            return Err(AutobuildError::RemoteRefNotFound(format!(
                "origin/{}",
                branch
            )));
        }

        let remote_branch = format!("origin/{}", branch);

        run_logged(
            "git",
            ["checkout", "-B", branch, remote_branch.as_str()],
            Some(&self.path),
        )?;
        run_logged(
            "git",
            ["reset", "--hard", remote_branch.as_str()],
            Some(&self.path),
        )?;

        Ok(())
    }

    /// Commit hash of the current HEAD.
    pub fn head_commit(&self) -> Result<String> {
        Ok(run_captured("git", ["rev-parse", "HEAD"], Some(&self.path))?
            .trim()
            .to_string())
    }

    /// Relative paths of all tracked files.
    pub fn tracked_files(&self) -> Result<Vec<PathBuf>> {
        let listing = run_captured_bytes("git", ["ls-files", "-z"], Some(&self.path))?;

        Ok(listing
            .split(|b| *b == 0)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| PathBuf::from(String::from_utf8_lossy(chunk).into_owned()))
            .collect())
    }

    /// Tracked content at HEAD as an uncompressed tar stream.
    pub fn archive_head(&self) -> Result<Vec<u8>> {
        run_captured_bytes("git", ["archive", "--format=tar", "HEAD"], Some(&self.path))
    }
}
