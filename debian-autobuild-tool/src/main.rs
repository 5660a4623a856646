// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use debian_autobuild::error::AutobuildError;

mod cli;

/// A missing external tool exits with the conventional shell code.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AutobuildError>() {
        Some(AutobuildError::ToolMissing(_)) => 127,
        _ => 1,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    std::process::exit(match cli::run_cli() {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_code(&err)
        }
    });
}
