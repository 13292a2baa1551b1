// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the `datacom` binary.

pub mod fetch;
pub mod serve;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Logs go to stderr so `fetch` can print
/// its report on stdout.
pub fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "datacom={default_level},datacom_runtime={default_level}"
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
