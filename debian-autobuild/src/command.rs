// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! External tool invocation.

Every non-trivial operation in this crate is delegated to an external
tool. This module provides the thin, blocking subprocess layer used by
all tool adapters: lookup on `PATH`, streamed invocations whose output is
fed through the logger, and captured invocations for queries.
*/

use {
    crate::error::{AutobuildError, Result},
    duct::cmd,
    log::{info, warn},
    std::{
        ffi::{OsStr, OsString},
        io::{BufRead, BufReader},
        path::{Path, PathBuf},
    },
};

/// The outcome of a command run in unchecked mode.
pub struct CommandOutput {
    /// Rendered command line, for diagnostics.
    pub command: String,
    /// Exit code. `-1` when terminated by a signal.
    pub status: i32,
    /// Combined stdout + stderr, lossily decoded.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Convert a failed invocation into the error it represents.
    pub fn into_error(self) -> AutobuildError {
        AutobuildError::CommandFailed {
            command: self.command,
            status: self.status,
        }
    }
}

/// Locate an executable on `PATH`.
pub fn find_tool(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;

    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);

        if candidate.is_file() {
            return Some(candidate);
        }
    }

    None
}

/// Verify that every named tool resolves on `PATH`.
///
/// The first missing tool aborts the run before any project is touched.
pub fn ensure_tools(names: &[&str]) -> Result<()> {
    for name in names {
        if find_tool(name).is_none() {
            return Err(AutobuildError::ToolMissing(name.to_string()));
        }
    }

    Ok(())
}

fn render_command(program: &str, args: &[OsString]) -> String {
    let mut rendered = program.to_string();

    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }

    rendered
}

fn collect_args<S>(args: impl IntoIterator<Item = S>) -> Vec<OsString>
where
    S: AsRef<OsStr>,
{
    args.into_iter().map(|x| x.as_ref().to_os_string()).collect()
}

/// Run a command, streaming its combined output through the logger.
///
/// A non-zero exit is an error carrying the rendered command line.
pub fn run_logged<S>(
    program: &str,
    args: impl IntoIterator<Item = S>,
    cwd: Option<&Path>,
) -> Result<()>
where
    S: AsRef<OsStr>,
{
    let args = collect_args(args);
    let rendered = render_command(program, &args);

    info!("running `{}`", rendered);

    let mut expression = cmd(program, &args).stderr_to_stdout().unchecked();

    if let Some(dir) = cwd {
        expression = expression.dir(dir);
    }

    let reader = expression.reader()?;

    {
        let buffered = BufReader::new(&reader);
        for line in buffered.lines() {
            warn!("{}", line?);
        }
    }

    let output = reader
        .try_wait()?
        .ok_or_else(|| AutobuildError::CommandFailed {
            command: rendered.clone(),
            status: -1,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(AutobuildError::CommandFailed {
            command: rendered,
            status: output.status.code().unwrap_or(-1),
        })
    }
}

/// Run a command and capture its stdout as a string.
///
/// stderr is left attached to the parent process. A non-zero exit is an
/// error.
pub fn run_captured<S>(
    program: &str,
    args: impl IntoIterator<Item = S>,
    cwd: Option<&Path>,
) -> Result<String>
where
    S: AsRef<OsStr>,
{
    let bytes = run_captured_bytes(program, args, cwd)?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Like [run_captured], but returns raw stdout bytes.
///
/// Used where stdout is a binary stream (e.g. `git archive`).
pub fn run_captured_bytes<S>(
    program: &str,
    args: impl IntoIterator<Item = S>,
    cwd: Option<&Path>,
) -> Result<Vec<u8>>
where
    S: AsRef<OsStr>,
{
    let args = collect_args(args);
    let rendered = render_command(program, &args);

    let mut expression = cmd(program, &args).stdout_capture().unchecked();

    if let Some(dir) = cwd {
        expression = expression.dir(dir);
    }

    let output = expression.run()?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(AutobuildError::CommandFailed {
            command: rendered,
            status: output.status.code().unwrap_or(-1),
        })
    }
}

/// Run a command without treating a non-zero exit as an error.
///
/// Stdout and stderr are captured together so callers can classify the
/// tool's diagnostics.
pub fn run_unchecked<S>(
    program: &str,
    args: impl IntoIterator<Item = S>,
    cwd: Option<&Path>,
) -> Result<CommandOutput>
where
    S: AsRef<OsStr>,
{
    let args = collect_args(args);
    let rendered = render_command(program, &args);

    let mut expression = cmd(program, &args)
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked();

    if let Some(dir) = cwd {
        expression = expression.dir(dir);
    }

    let output = expression.run()?;

    Ok(CommandOutput {
        command: rendered,
        status: output.status.code().unwrap_or(-1),
        output: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = ensure_tools(&["this-tool-does-not-exist-anywhere"]).unwrap_err();

        assert!(matches!(err, AutobuildError::ToolMissing(name) if name.contains("this-tool")));
    }

    #[test]
    fn render_includes_arguments() {
        let args = collect_args(["status", "--porcelain"]);

        assert_eq!(render_command("git", &args), "git status --porcelain");
    }
}
