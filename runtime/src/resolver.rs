// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-asset ex-dividend date resolution.
//!
//! For one asset: check the budget, classify its table to a detail URL,
//! consult the cache, try the lightweight HTTP path, then fall back to the
//! browser with a bounded retry on stale reads. Every step is cut off at the
//! run's deadline. Soft problems come back as [`Resolution::Failed`]; only
//! budget exhaustion is an `Err`, and it aborts the whole run.

use crate::acquisition::{BrowserDividendFetcher, LightweightDividendFetcher};
use crate::budget::{BudgetExceeded, TimeBudget};
use crate::cache::DividendDateCache;
use crate::model::{latest_record, DividendRecord, DividendSnapshot};
use crate::renderer::{BrowserSession, RenderContext, RenderError};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Minimum time left before starting work on an asset.
pub const MIN_ASSET_TIME: Duration = Duration::from_secs(3);
/// Lightweight HTTP fetch timeout.
pub const LIGHTWEIGHT_TIMEOUT: Duration = Duration::from_secs(15);
/// Browser launch timeout.
pub const BROWSER_LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);
/// Page navigation timeout.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
/// Wait for the dividend table to appear after navigation.
pub const TABLE_WAIT_TIMEOUT: Duration = Duration::from_secs(15);
/// Reading the table rows out of the DOM.
pub const SCRIPT_TIMEOUT: Duration = Duration::from_secs(15);
/// Short re-wait for the table before each read attempt.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

pub const REASON_UNRESOLVED_URL: &str = "cannot resolve asset URL";
pub const REASON_NO_DATE: &str = "no dividend date found";
pub const REASON_STALE_EXHAUSTED: &str = "unable to read dividends after retries";

/// Asset class of a wallet table, which decides the detail page path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetCategory {
    Stocks,
    RealEstateFunds,
    Crypto,
    GlobalEtfs,
    Etfs,
    UsStocks,
    Bdrs,
}

impl AssetCategory {
    /// Classify a wallet table by the first line of its name.
    pub fn classify(table_name: &str) -> Option<Self> {
        let primary = table_name
            .split('\n')
            .next()
            .unwrap_or_default()
            .trim()
            .to_uppercase();

        if primary == "ASSETS" || primary == "AÇÕES" {
            Some(Self::Stocks)
        } else if primary == "FIIS" {
            Some(Self::RealEstateFunds)
        } else if primary.starts_with("CRIPTOMOEDAS") {
            Some(Self::Crypto)
        } else if primary.starts_with("ETFS INTERN") {
            Some(Self::GlobalEtfs)
        } else if primary.starts_with("ETFS") {
            Some(Self::Etfs)
        } else if primary.starts_with("STOCKS") {
            Some(Self::UsStocks)
        } else if primary.starts_with("BDRS") {
            Some(Self::Bdrs)
        } else {
            None
        }
    }

    /// URL path segment of the detail pages for this class.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Stocks => "acoes",
            Self::RealEstateFunds => "fiis",
            Self::Crypto => "criptomoedas",
            Self::GlobalEtfs => "etfs-global",
            Self::Etfs => "etfs",
            Self::UsStocks => "stocks",
            Self::Bdrs => "bdrs",
        }
    }

    /// Human-readable class name shown next to results.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Stocks => "Ações",
            Self::RealEstateFunds => "Fundos Imobiliários",
            Self::Crypto => "Criptomoedas",
            Self::GlobalEtfs => "ETFs Internacionais",
            Self::Etfs => "ETFs",
            Self::UsStocks => "Stocks",
            Self::Bdrs => "BDRs",
        }
    }

    /// Detail page URL for `code` under `base_url`.
    pub fn asset_url(self, base_url: &str, code: &str) -> String {
        format!(
            "{}/{}/{}/",
            base_url.trim_end_matches('/'),
            self.path_segment(),
            code.trim().to_lowercase()
        )
    }
}

/// Which path produced a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Lightweight,
    Browser,
}

/// A resolved dividend date with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDividend {
    pub snapshot: DividendSnapshot,
    pub category: AssetCategory,
    pub details_url: String,
    pub source: ResolutionSource,
}

/// Outcome of resolving one asset. Budget exhaustion is not an outcome but
/// the `Err` side of [`DividendDateResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedDividend),
    /// Could not resolve this asset; the run continues.
    Failed(String),
}

enum BrowserOutcome {
    Records(Vec<DividendRecord>),
    NoTable,
    Failed(String),
}

/// Resolves ex-dividend dates, cache first, HTTP second, browser last.
pub struct DividendDateResolver {
    base_url: String,
    cache: Arc<DividendDateCache>,
    lightweight: Arc<dyn LightweightDividendFetcher>,
    browser: Arc<dyn BrowserDividendFetcher>,
    stale_retry: RetryPolicy,
}

impl DividendDateResolver {
    pub fn new(
        base_url: impl Into<String>,
        cache: Arc<DividendDateCache>,
        lightweight: Arc<dyn LightweightDividendFetcher>,
        browser: Arc<dyn BrowserDividendFetcher>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            cache,
            lightweight,
            browser,
            stale_retry: RetryPolicy::new(3, Duration::from_millis(500))
                .with_max_backoff(Duration::from_secs(2)),
        }
    }

    /// Override the stale-read retry policy.
    pub fn with_stale_retry(mut self, policy: RetryPolicy) -> Self {
        self.stale_retry = policy;
        self
    }

    /// Resolve one asset. `Err` only when the budget ran out.
    pub async fn resolve(
        &self,
        asset_code: &str,
        table_name: &str,
        budget: &TimeBudget,
        session: &mut BrowserSession,
    ) -> Result<Resolution, BudgetExceeded> {
        budget.ensure_time_available(MIN_ASSET_TIME, asset_code)?;

        let Some(category) = AssetCategory::classify(table_name) else {
            debug!(asset_code, table_name, "no detail page path for table");
            return Ok(Resolution::Failed(REASON_UNRESOLVED_URL.to_string()));
        };
        let asset_url = category.asset_url(&self.base_url, asset_code);

        if let Some(snapshot) = self.cache.get(&asset_url) {
            debug!(asset_code, "dividend cache hit");
            return Ok(Resolution::Found(ResolvedDividend {
                snapshot,
                category,
                details_url: asset_url,
                source: ResolutionSource::Cache,
            }));
        }

        let timeout = budget.clamp_timeout(LIGHTWEIGHT_TIMEOUT)?;
        let fetch = tokio::time::timeout(timeout, self.lightweight.fetch(&asset_url, timeout));
        match budget.within(asset_code, fetch).await? {
            Ok(Ok(records)) => {
                if let Some(latest) = latest_record(records) {
                    return Ok(self.found(asset_url, category, latest, ResolutionSource::Lightweight));
                }
                debug!(asset_code, "lightweight fetch found no dates");
            }
            Ok(Err(e)) => debug!(asset_code, "lightweight fetch failed: {e:#}"),
            Err(_) => debug!(asset_code, ?timeout, "lightweight fetch timed out"),
        }

        info!(asset_code, url = %asset_url, "falling back to browser");
        match self
            .read_with_browser(asset_code, &asset_url, budget, session)
            .await?
        {
            BrowserOutcome::Records(records) => match latest_record(records) {
                Some(latest) => Ok(self.found(asset_url, category, latest, ResolutionSource::Browser)),
                None => Ok(Resolution::Failed(REASON_NO_DATE.to_string())),
            },
            BrowserOutcome::NoTable => {
                debug!(asset_code, "dividend table never appeared");
                Ok(Resolution::Failed(REASON_NO_DATE.to_string()))
            }
            BrowserOutcome::Failed(reason) => Ok(Resolution::Failed(reason)),
        }
    }

    fn found(
        &self,
        asset_url: String,
        category: AssetCategory,
        latest: DividendRecord,
        source: ResolutionSource,
    ) -> Resolution {
        let snapshot = DividendSnapshot::from(latest);
        self.cache.set(&asset_url, snapshot.clone());
        Resolution::Found(ResolvedDividend {
            snapshot,
            category,
            details_url: asset_url,
            source,
        })
    }

    async fn read_with_browser(
        &self,
        asset_code: &str,
        asset_url: &str,
        budget: &TimeBudget,
        session: &mut BrowserSession,
    ) -> Result<BrowserOutcome, BudgetExceeded> {
        let launch_timeout = budget.clamp_timeout(BROWSER_LAUNCH_TIMEOUT)?;
        let ctx = match budget.within(asset_code, session.context(launch_timeout)).await? {
            Ok(ctx) => ctx,
            Err(e) => {
                return Ok(BrowserOutcome::Failed(format!(
                    "browser fallback unavailable: {e:#}"
                )))
            }
        };

        let nav_timeout = budget.clamp_timeout(NAVIGATION_TIMEOUT)?;
        let opened = self.browser.open(&mut *ctx, asset_url, nav_timeout);
        if let Err(e) = budget.within(asset_code, opened).await? {
            return Ok(BrowserOutcome::Failed(format!("browser fallback failed: {e}")));
        }

        // Whatever navigation left over.
        let wait_timeout = budget.clamp_timeout(TABLE_WAIT_TIMEOUT)?;
        let waited = self.browser.wait_for_table(&*ctx, wait_timeout);
        match budget.within(asset_code, waited).await? {
            Ok(true) => {}
            Ok(false) => return Ok(BrowserOutcome::NoTable),
            Err(e) => return Ok(BrowserOutcome::Failed(format!("browser fallback failed: {e}"))),
        }

        let page: &dyn RenderContext = &*ctx;
        let browser = &self.browser;
        let read = self
            .stale_retry
            .run_within(
                budget,
                asset_code,
                SETTLE_TIMEOUT + SCRIPT_TIMEOUT,
                move |timeout| async move {
                    let settle = SETTLE_TIMEOUT.min(timeout);
                    tokio::time::timeout(timeout, browser.read(page, settle, timeout))
                        .await
                        .unwrap_or_else(|_| {
                            Err(RenderError::Timeout {
                                operation: "dividend table read",
                                timeout,
                            })
                        })
                },
                RenderError::is_stale,
            )
            .await?;

        Ok(match read {
            Ok(records) => BrowserOutcome::Records(records),
            Err(e) if e.is_stale() => BrowserOutcome::Failed(REASON_STALE_EXHAUSTED.to_string()),
            Err(e) => BrowserOutcome::Failed(format!("browser fallback failed: {e}")),
        })
    }
}
