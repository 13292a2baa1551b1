// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration: defaults, then `DATACOM_*` environment variables,
//! then command-line flags (applied by the CLI).

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_BASE_URL: &str = "https://investidor10.com.br";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    /// Site the wallet and asset detail pages live on.
    pub base_url: String,
    pub cache_ttl: Duration,
    pub max_concurrent_jobs: usize,
    /// Finished jobs older than this are pruned when new jobs arrive.
    pub job_retention: Duration,
    pub chromium_path: Option<PathBuf>,
    pub browser_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: crate::cache::DEFAULT_TTL,
            max_concurrent_jobs: 4,
            job_retention: Duration::from_secs(3600),
            chromium_path: None,
            browser_enabled: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(bind) = var("DATACOM_BIND") {
            config.bind = bind
                .parse()
                .with_context(|| format!("invalid DATACOM_BIND '{bind}'"))?;
        }
        if let Some(base_url) = var("DATACOM_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = var("DATACOM_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(parse_number(&secs, "DATACOM_CACHE_TTL_SECS")?);
        }
        if let Some(jobs) = var("DATACOM_MAX_JOBS") {
            config.max_concurrent_jobs = parse_number::<usize>(&jobs, "DATACOM_MAX_JOBS")?.max(1);
        }
        if let Some(secs) = var("DATACOM_JOB_RETENTION_SECS") {
            config.job_retention =
                Duration::from_secs(parse_number(&secs, "DATACOM_JOB_RETENTION_SECS")?);
        }
        if let Some(path) = var("DATACOM_CHROMIUM_PATH") {
            config.chromium_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = var("DATACOM_DISABLE_BROWSER") {
            config.browser_enabled = !matches!(flag.as_str(), "1" | "true" | "yes");
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("invalid {key} '{raw}': expected a number"))
}
