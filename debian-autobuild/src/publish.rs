// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Publishing the repository to a web host.

A one-way rsync mirror of the repository's public parts (`dists/`,
`pool/`) and the generated index page. There is no conflict resolution;
the destination is expected to be written only by this publisher, after
a successful build pass.
*/

use {
    crate::{
        command::{ensure_tools, run_logged},
        error::Result,
    },
    log::info,
    std::path::Path,
};

/// One-way sync of the repository tree to a remote destination.
pub struct Publisher {
    /// rsync destination, `host:path`.
    destination: String,
    /// Optional directory under the destination path.
    remote_subdir: Option<String>,
    dry_run: bool,
    delete_extraneous: bool,
}

impl Publisher {
    pub fn new(destination: impl ToString) -> Self {
        Self {
            destination: destination.to_string(),
            remote_subdir: None,
            dry_run: false,
            delete_extraneous: false,
        }
    }

    pub fn remote_subdir(mut self, subdir: Option<String>) -> Self {
        self.remote_subdir = subdir;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Delete destination files that no longer exist locally.
    pub fn delete_extraneous(mut self, delete: bool) -> Self {
        self.delete_extraneous = delete;
        self
    }

    fn remote_target(&self) -> String {
        let mut target = self.destination.trim_end_matches('/').to_string();

        if let Some(subdir) = &self.remote_subdir {
            target.push('/');
            target.push_str(subdir.trim_matches('/'));
        }

        target.push('/');

        target
    }

    /// Mirror the repository and index page to the destination.
    pub fn publish(&self, repo_dir: &Path, index_file: Option<&Path>) -> Result<()> {
        ensure_tools(&["rsync"])?;

        let target = self.remote_target();

        info!(
            "publishing {} to {}{}",
            repo_dir.display(),
            target,
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut args = vec!["-az".to_string(), "--verbose".to_string()];

        if self.dry_run {
            args.push("--dry-run".to_string());
        }

        if self.delete_extraneous {
            args.push("--delete".to_string());
        }

        for part in ["dists", "pool"] {
            let path = repo_dir.join(part);

            if path.is_dir() {
                args.push(path.display().to_string());
            }
        }

        if let Some(index) = index_file {
            args.push(index.display().to_string());
        }

        args.push(target);

        run_logged("rsync", &args, None)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn remote_target_composition() {
        assert_eq!(
            Publisher::new("web:/srv/apt").remote_target(),
            "web:/srv/apt/"
        );
        assert_eq!(
            Publisher::new("web:/srv/apt/")
                .remote_subdir(Some("debian".to_string()))
                .remote_target(),
            "web:/srv/apt/debian/"
        );
    }
}
