// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! One-shot reads printed as JSON on stdout.

use crate::config::Config;
use crate::service::{clamp_request_timeout, DataComService};
use anyhow::{Context, Result};

pub async fn run(config: &Config, wallet_url: &str, timeout_secs: i64) -> Result<()> {
    let service = DataComService::from_config(config);
    let timeout_secs = clamp_request_timeout(timeout_secs);
    let report = service
        .enrich(wallet_url, timeout_secs)
        .await
        .with_context(|| format!("enrichment of {wallet_url} failed"))?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn run_entries(config: &Config, entries_url: &str, timeout_secs: i64) -> Result<()> {
    let service = DataComService::from_config(config);
    let tables = service
        .entries(entries_url, timeout_secs)
        .await
        .with_context(|| format!("reading wallet entries from {entries_url} failed"))?;
    println!("{}", serde_json::to_string_pretty(&tables)?);
    Ok(())
}
