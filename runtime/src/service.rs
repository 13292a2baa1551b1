// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Request-level entry points: synchronous enrichment, background jobs,
//! job polling and wallet entries.
//!
//! Shared state (cache, job store, progress channel) lives in explicitly
//! constructed objects owned by the service. Background jobs run on tokio
//! tasks, at most `max_concurrent_jobs` at a time; each one owns its own
//! [`TimeBudget`], started when the job leaves the queue.

use crate::acquisition::dividends::HttpDividendFetcher;
use crate::acquisition::dom::DomDividendFetcher;
use crate::acquisition::http_client::HttpClient;
use crate::acquisition::wallet::HttpWalletExtractor;
use crate::acquisition::entries::HttpWalletEntriesExtractor;
use crate::acquisition::{AssetTableExtractor, WalletEntriesExtractor};
use crate::budget::TimeBudget;
use crate::cache::DividendDateCache;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::errors::EnrichError;
use crate::jobs::{EnrichmentJob, JobStore, ProgressUpdater};
use crate::model::{count_assets, AssetTable, EnrichmentReport, WalletEntryTable};
use crate::pipeline::EnrichmentPipeline;
use crate::progress::{self, ProgressReceiver, ProgressSender, ProgressSink};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::resolver::DividendDateResolver;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub const MIN_TIMEOUT_SECS: i64 = 5;
pub const MAX_TIMEOUT_SECS: i64 = 55;
pub const DEFAULT_TIMEOUT_SECS: i64 = MAX_TIMEOUT_SECS;

/// Upper bound for reading the wallet page.
const WALLET_TIMEOUT: Duration = Duration::from_secs(30);

/// Clamp a caller-supplied timeout to `[5, 55]` seconds.
pub fn clamp_request_timeout(secs: i64) -> i64 {
    secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)
}

/// What [`DataComService::submit`] hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Submission {
    Accepted { job_id: String },
    Completed(EnrichmentReport),
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub max_concurrent_jobs: usize,
    pub job_retention: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            job_retention: Duration::from_secs(3600),
        }
    }
}

#[derive(Clone)]
pub struct DataComService {
    extractor: Arc<dyn AssetTableExtractor>,
    entries: Arc<dyn WalletEntriesExtractor>,
    pipeline: Arc<EnrichmentPipeline>,
    jobs: Arc<JobStore>,
    events: ProgressSender,
    slots: Arc<Semaphore>,
    job_retention: Duration,
}

impl DataComService {
    pub fn new(
        extractor: Arc<dyn AssetTableExtractor>,
        entries: Arc<dyn WalletEntriesExtractor>,
        pipeline: Arc<EnrichmentPipeline>,
        jobs: Arc<JobStore>,
        options: ServiceOptions,
    ) -> Self {
        let (events, _) = progress::channel();
        Self {
            extractor,
            entries,
            pipeline,
            jobs,
            events,
            slots: Arc::new(Semaphore::new(options.max_concurrent_jobs.max(1))),
            job_retention: options.job_retention,
        }
    }

    /// Wire the HTTP collaborators, the cache and the renderer from `config`.
    pub fn from_config(config: &Config) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let http = HttpClient::new(&config.base_url);
        let cache = Arc::new(DividendDateCache::new(config.cache_ttl, Arc::clone(&clock)));
        let resolver = Arc::new(DividendDateResolver::new(
            config.base_url.as_str(),
            cache,
            Arc::new(HttpDividendFetcher::new(http.clone())),
            Arc::new(DomDividendFetcher),
        ));
        let pipeline = Arc::new(EnrichmentPipeline::new(
            resolver,
            select_renderer(config),
            Arc::clone(&clock),
        ));
        Self::new(
            Arc::new(HttpWalletExtractor::new(http.clone())),
            Arc::new(HttpWalletEntriesExtractor::new(http)),
            pipeline,
            Arc::new(JobStore::new(clock)),
            ServiceOptions {
                max_concurrent_jobs: config.max_concurrent_jobs,
                job_retention: config.job_retention,
            },
        )
    }

    /// Enrich a wallet, inline or as a background job.
    pub async fn submit(
        &self,
        wallet_url: &str,
        timeout_secs: i64,
        run_async: bool,
    ) -> Result<Submission, EnrichError> {
        let wallet_url = validate_url("wallet_url", wallet_url)?;
        let timeout_secs = clamp_request_timeout(timeout_secs);
        if run_async {
            let job_id = self.spawn_job(wallet_url, timeout_secs);
            return Ok(Submission::Accepted { job_id });
        }
        self.enrich(wallet_url, timeout_secs)
            .await
            .map(Submission::Completed)
    }

    /// Run a full enrichment on the caller's task.
    pub async fn enrich(&self, wallet_url: &str, timeout_secs: i64) -> Result<EnrichmentReport, EnrichError> {
        let budget = TimeBudget::from_secs(clamp_request_timeout(timeout_secs));
        let tables = self.read_wallet(wallet_url, &budget).await?;
        self.pipeline.run(&tables, &budget, None).await
    }

    /// Only read the wallet tables.
    pub async fn extract(&self, wallet_url: &str, timeout_secs: i64) -> Result<Vec<AssetTable>, EnrichError> {
        let wallet_url = validate_url("wallet_url", wallet_url)?;
        let budget = TimeBudget::from_secs(clamp_request_timeout(timeout_secs));
        self.read_wallet(wallet_url, &budget).await
    }

    /// Read the buy/sell history tables of a wallet entries page.
    pub async fn entries(&self, entries_url: &str, timeout_secs: i64) -> Result<Vec<WalletEntryTable>, EnrichError> {
        let entries_url = validate_url("wallet_entries_url", entries_url)?;
        let budget = TimeBudget::from_secs(clamp_request_timeout(timeout_secs));
        let timeout = budget.clamp_timeout(WALLET_TIMEOUT)?;
        match tokio::time::timeout(timeout, self.entries.extract_entries(entries_url, timeout)).await {
            Ok(Ok(tables)) => Ok(tables),
            Ok(Err(e)) => Err(EnrichError::UpstreamExtraction(format!("{e:#}"))),
            Err(_) => Err(EnrichError::UpstreamExtraction(format!(
                "wallet entries page did not load within {}s",
                timeout.as_secs()
            ))),
        }
    }

    pub fn poll(&self, job_id: &str) -> Result<EnrichmentJob, EnrichError> {
        self.jobs
            .get_job(job_id)
            .ok_or_else(|| EnrichError::JobNotFound(job_id.to_string()))
    }

    /// Follow progress events of every job.
    pub fn subscribe(&self) -> ProgressReceiver {
        self.events.subscribe()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Queue a background job and return its id without waiting.
    fn spawn_job(&self, wallet_url: &str, timeout_secs: i64) -> String {
        let retention = chrono::Duration::from_std(self.job_retention)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let pruned = self.jobs.prune(retention);
        if pruned > 0 {
            info!(pruned, "pruned finished jobs");
        }

        let job_id = self.jobs.create_job();
        let updater = ProgressUpdater::new(
            Arc::clone(&self.jobs),
            job_id.clone(),
            Some(self.events.clone()),
        );
        let service = self.clone();
        let wallet_url = wallet_url.to_string();
        info!(job_id = %job_id, timeout_secs, "job queued");

        tokio::spawn(async move {
            let _permit = match Arc::clone(&service.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    updater.failed("job pool is shut down");
                    return;
                }
            };
            match service.run_job(&wallet_url, timeout_secs, &updater).await {
                Ok(report) => updater.completed(report),
                Err(e) => {
                    warn!(job_id = %updater.job_id(), "job failed: {e}");
                    updater.failed(&e.to_string());
                }
            }
        });

        job_id
    }

    async fn run_job(
        &self,
        wallet_url: &str,
        timeout_secs: i64,
        updater: &ProgressUpdater,
    ) -> Result<EnrichmentReport, EnrichError> {
        let budget = TimeBudget::from_secs(timeout_secs);
        let tables = self.read_wallet(wallet_url, &budget).await?;
        updater.started(count_assets(&tables));
        self.pipeline
            .run(&tables, &budget, Some(updater as &dyn ProgressSink))
            .await
    }

    async fn read_wallet(&self, wallet_url: &str, budget: &TimeBudget) -> Result<Vec<AssetTable>, EnrichError> {
        let timeout = budget.clamp_timeout(WALLET_TIMEOUT)?;
        match tokio::time::timeout(timeout, self.extractor.extract(wallet_url, timeout)).await {
            Ok(Ok(tables)) => Ok(tables),
            Ok(Err(e)) => Err(EnrichError::UpstreamExtraction(format!("{e:#}"))),
            Err(_) => Err(EnrichError::UpstreamExtraction(format!(
                "wallet page did not load within {}s",
                timeout.as_secs()
            ))),
        }
    }
}

fn validate_url<'a>(param: &str, url: &'a str) -> Result<&'a str, EnrichError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(EnrichError::InvalidRequest(format!("{param} is required")));
    }
    Ok(url)
}

fn select_renderer(config: &Config) -> Arc<dyn Renderer> {
    if !config.browser_enabled {
        info!("browser fallback disabled, running HTTP-only");
        return Arc::new(NoopRenderer);
    }
    match ChromiumRenderer::new(config.chromium_path.as_ref()) {
        Ok(renderer) => {
            info!(chrome = %renderer.chrome_path().display(), "browser fallback enabled");
            Arc::new(renderer)
        }
        Err(e) => {
            warn!("Chromium not found, running HTTP-only: {e:#}");
            Arc::new(NoopRenderer)
        }
    }
}
