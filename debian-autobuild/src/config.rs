// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Pipeline configuration.

Every setting can come from a `DAB_*` environment variable; command line
flags override the environment, which overrides built-in defaults.
*/

use std::path::PathBuf;

/// Settings for one build pipeline run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Path of the project list file.
    pub list_file: PathBuf,
    /// Repository base directory (reprepro's `--basedir`).
    pub repo_dir: PathBuf,
    /// Codename changes files are registered into.
    pub codename: String,
    /// Primary component used for pool queries.
    pub component: String,
    /// Directory holding working trees, build trees, and artifacts.
    pub workspace_dir: PathBuf,
    /// Regenerate orig tarballs even when the pool has one.
    pub force_orig: bool,
    /// Build and re-include even when the repository already has the
    /// version.
    pub force_rebuild: bool,
    /// Host architecture override for the idempotency gate.
    pub architecture: Option<String>,
    /// Base options handed to the build tool.
    pub build_options: Vec<String>,
    /// Gate on source entries instead of binary entries.
    pub source_only: bool,
    /// Passphrase file for signing-cache priming.
    pub passphrase_file: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            list_file: PathBuf::from("projects.list"),
            repo_dir: PathBuf::from("repo"),
            codename: "stable".to_string(),
            component: "main".to_string(),
            workspace_dir: PathBuf::from("build"),
            force_orig: false,
            force_rebuild: false,
            architecture: None,
            build_options: vec!["-us".to_string(), "-uc".to_string()],
            source_only: false,
            passphrase_file: None,
        }
    }
}

impl PipelineConfig {
    /// Resolve a configuration from `DAB_*` environment variables on
    /// top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_string("DAB_LIST_FILE") {
            config.list_file = PathBuf::from(value);
        }
        if let Some(value) = env_string("DAB_REPO_DIR") {
            config.repo_dir = PathBuf::from(value);
        }
        if let Some(value) = env_string("DAB_CODENAME") {
            config.codename = value;
        }
        if let Some(value) = env_string("DAB_COMPONENT") {
            config.component = value;
        }
        if let Some(value) = env_string("DAB_WORKSPACE") {
            config.workspace_dir = PathBuf::from(value);
        }
        if let Some(value) = env_string("DAB_ARCHITECTURE") {
            config.architecture = Some(value);
        }
        if let Some(value) = env_string("DAB_BUILD_OPTIONS") {
            config.build_options = value.split_whitespace().map(|x| x.to_string()).collect();
        }
        if let Some(value) = env_string("DAB_PASSPHRASE_FILE") {
            config.passphrase_file = Some(PathBuf::from(value));
        }

        config.force_orig = env_bool("DAB_FORCE_ORIG");
        config.force_rebuild = env_bool("DAB_FORCE_REBUILD");
        config.source_only = env_bool("DAB_SOURCE_ONLY");

        config.normalize();

        config
    }

    /// Enforce internal consistency.
    ///
    /// A source-only gate only makes sense when the build itself is
    /// source-only.
    pub fn normalize(&mut self) {
        if self.source_only && !self.build_options.iter().any(|opt| opt == "-S") {
            self.build_options.push("-S".to_string());
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn env_bool(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok(value) if !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false") && !value.eq_ignore_ascii_case("no")
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn source_only_implies_source_build() {
        let mut config = PipelineConfig {
            source_only: true,
            ..Default::default()
        };
        config.normalize();

        assert!(config.build_options.iter().any(|opt| opt == "-S"));

        // Idempotent.
        config.normalize();
        assert_eq!(
            config.build_options.iter().filter(|opt| *opt == "-S").count(),
            1
        );
    }
}
