// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {crate::pipeline::Step, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum AutobuildError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("required external tool not found on PATH: {0}")]
    ToolMissing(String),

    #[error("project list file not found: {0}")]
    ProjectListMissing(String),

    #[error("invalid project list entry on line {0}: {1}")]
    ProjectListEntry(usize, String),

    #[error("repository not initialized: {0} does not exist")]
    RepositoryNotInitialized(String),

    #[error("working tree has uncommitted changes: {0}")]
    DirtyTree(String),

    #[error("remote branch does not exist: {0}")]
    RemoteRefNotFound(String),

    #[error("command exited with status {status}: {command}")]
    CommandFailed { command: String, status: i32 },

    #[error("malformed debian/changelog entry: {0}")]
    ChangelogParse(String),

    #[error("control file parse error: {0}")]
    ControlParse(String),

    #[error("version string error: {0}")]
    Version(#[from] crate::version::VersionError),

    #[error("unexpected package list line from repository tool: {0}")]
    PackageListParse(String),

    #[error("no .changes artifacts matched {0}")]
    NoChangesArtifacts(String),

    #[error("repository rejected changes file: {0}")]
    IncludeFailed(String),

    #[error(
        "changes file collides with already registered checksums \
         (re-run with forced rebuild to replace): {0}"
    )]
    IncludeConflict(String),

    #[error("glob pattern error: {0:?}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("glob iteration error: {0:?}")]
    Glob(#[from] glob::GlobError),

    #[error("template render error: {0:?}")]
    TemplateRender(#[from] handlebars::RenderError),

    #[error("{step} failed for {package} ({url}): {source}")]
    StepFailed {
        package: String,
        url: String,
        step: Step,
        source: Box<AutobuildError>,
    },
}

impl AutobuildError {
    /// Attach per-project pipeline context to this error.
    pub fn with_step_context(self, package: &str, url: &str, step: Step) -> Self {
        match self {
            // Context is assigned where an error first crosses a step
            // boundary. Don't re-wrap.
            Self::StepFailed { .. } => self,
            other => Self::StepFailed {
                package: package.to_string(),
                url: url.to_string(),
                step,
                source: Box::new(other),
            },
        }
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, AutobuildError>;
