// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Signing-agent passphrase priming.

Index signing itself is performed by the repository tool through gpg.
Before a run we try to warm the agent's passphrase cache by producing a
throwaway detached signature with the configured passphrase file, so the
later export does not stall on a pinentry prompt. This is strictly best
effort: on failure the run continues and the repository tool falls back
to interactive or agent-cached signing.
*/

use {
    crate::command::run_unchecked,
    log::{info, warn},
    std::path::Path,
};

/// Attempt to cache the signing passphrase in the gpg agent.
///
/// Never fails the run.
pub fn prime_passphrase_cache(passphrase_file: &Path) {
    let scratch = match tempfile::NamedTempFile::new() {
        Ok(file) => file,
        Err(err) => {
            warn!("unable to create scratch file for passphrase priming: {}", err);
            return;
        }
    };

    let passphrase = passphrase_file.display().to_string();
    let scratch_path = scratch.path().display().to_string();

    let result = run_unchecked(
        "gpg",
        [
            "--batch",
            "--yes",
            "--pinentry-mode",
            "loopback",
            "--passphrase-file",
            passphrase.as_str(),
            "--output",
            "/dev/null",
            "--detach-sign",
            scratch_path.as_str(),
        ],
        None,
    );

    match result {
        Ok(output) if output.success() => {
            info!("primed signing passphrase cache");
        }
        Ok(output) => {
            warn!(
                "unable to prime signing passphrase cache (status {}); continuing",
                output.status
            );
        }
        Err(err) => {
            warn!("unable to prime signing passphrase cache: {}", err);
        }
    }
}
