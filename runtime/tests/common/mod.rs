//! Shared in-memory fakes for the collaborator traits and the renderer.

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use datacom_runtime::acquisition::{
    AssetTableExtractor, BrowserDividendFetcher, LightweightDividendFetcher, WalletEntriesExtractor,
};
use datacom_runtime::cache::{DividendDateCache, DEFAULT_TTL};
use datacom_runtime::clock::ManualClock;
use datacom_runtime::jobs::JobStore;
use datacom_runtime::model::{AssetRow, AssetTable, DividendRecord, WalletEntryTable};
use datacom_runtime::pipeline::EnrichmentPipeline;
use datacom_runtime::renderer::{NavigationResult, RenderContext, RenderError, Renderer};
use datacom_runtime::resolver::DividendDateResolver;
use datacom_runtime::service::{DataComService, ServiceOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const BASE: &str = "https://investidor10.com.br";
pub const WALLET: &str = "https://investidor10.com.br/wallet/123";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The fixed "today" of every test.
pub fn today() -> NaiveDate {
    date(2026, 10, 16)
}

pub fn rec(date_com: NaiveDate, value: &str) -> DividendRecord {
    DividendRecord {
        date_com,
        value: Some(value.to_string()),
    }
}

pub fn asset_url(segment: &str, code: &str) -> String {
    format!("{BASE}/{segment}/{}/", code.to_lowercase())
}

/// A wallet table of `(code, name)` rows.
pub fn table(name: &str, rows: &[(&str, &str)]) -> AssetTable {
    AssetTable::new(
        name,
        vec!["Ativo".to_string(), "Nome".to_string()],
        rows.iter().map(|(code, n)| AssetRow::new([*code, *n])).collect(),
    )
}

// ── Wallet extractor ──

pub struct FakeExtractor {
    outcome: Mutex<Result<Vec<AssetTable>, String>>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(tables: Vec<AssetTable>) -> Self {
        Self {
            outcome: Mutex::new(Ok(tables)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_tables(&self, tables: Vec<AssetTable>) {
        *self.outcome.lock() = Ok(tables);
    }

    pub fn fail_with(&self, message: &str) {
        *self.outcome.lock() = Err(message.to_string());
    }
}

#[async_trait]
impl AssetTableExtractor for FakeExtractor {
    async fn extract(&self, _wallet_url: &str, _timeout: Duration) -> anyhow::Result<Vec<AssetTable>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome.lock().clone();
        outcome.map_err(|e| anyhow!(e))
    }
}

// ── Wallet entries extractor ──

pub struct FakeEntries {
    outcome: Mutex<Result<Vec<WalletEntryTable>, String>>,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl FakeEntries {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(Ok(Vec::new())),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_tables(&self, tables: Vec<WalletEntryTable>) {
        *self.outcome.lock() = Ok(tables);
    }

    pub fn fail_with(&self, message: &str) {
        *self.outcome.lock() = Err(message.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }
}

#[async_trait]
impl WalletEntriesExtractor for FakeEntries {
    async fn extract_entries(&self, _entries_url: &str, _timeout: Duration) -> anyhow::Result<Vec<WalletEntryTable>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.outcome.lock().clone();
        outcome.map_err(|e| anyhow!(e))
    }
}

// ── Lightweight fetcher ──

pub struct FakeLightweight {
    pages: Mutex<HashMap<String, Result<Vec<DividendRecord>, String>>>,
    delay: Mutex<Duration>,
    pub calls: AtomicUsize,
}

impl FakeLightweight {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn serve(&self, url: String, records: Vec<DividendRecord>) {
        self.pages.lock().insert(url, Ok(records));
    }

    pub fn fail(&self, url: String, message: &str) {
        self.pages.lock().insert(url, Err(message.to_string()));
    }

    /// Simulated latency of every fetch.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LightweightDividendFetcher for FakeLightweight {
    async fn fetch(&self, asset_url: &str, _timeout: Duration) -> anyhow::Result<Vec<DividendRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let page = self.pages.lock().get(asset_url).cloned();
        match page {
            Some(Ok(records)) => Ok(records),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("404 for {asset_url}")),
        }
    }
}

// ── Browser ──

#[derive(Clone)]
pub enum BrowserPage {
    Rows(Vec<DividendRecord>),
    NoTable,
    /// The first `stale_reads` reads fail with a stale element.
    Flaky {
        stale_reads: u32,
        rows: Vec<DividendRecord>,
    },
}

pub struct FakeBrowser {
    pages: Mutex<HashMap<String, BrowserPage>>,
    current: Mutex<Option<String>>,
    open_delay: Mutex<Duration>,
    read_delay: Mutex<Duration>,
    pub opens: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            open_delay: Mutex::new(Duration::ZERO),
            read_delay: Mutex::new(Duration::ZERO),
            opens: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn serve(&self, url: String, page: BrowserPage) {
        self.pages.lock().insert(url, page);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }

    /// Simulated latency of every table read.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserDividendFetcher for FakeBrowser {
    async fn open(
        &self,
        session: &mut dyn RenderContext,
        asset_url: &str,
        nav_timeout: Duration,
    ) -> Result<(), RenderError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        session.navigate(asset_url, nav_timeout).await?;
        *self.current.lock() = Some(asset_url.to_string());
        Ok(())
    }

    async fn wait_for_table(
        &self,
        _session: &dyn RenderContext,
        _wait_timeout: Duration,
    ) -> Result<bool, RenderError> {
        let current = self.current.lock().clone().unwrap_or_default();
        let page = self.pages.lock().get(&current).cloned();
        Ok(matches!(
            page,
            Some(BrowserPage::Rows(_)) | Some(BrowserPage::Flaky { .. })
        ))
    }

    async fn read(
        &self,
        _session: &dyn RenderContext,
        _settle_timeout: Duration,
        _script_timeout: Duration,
    ) -> Result<Vec<DividendRecord>, RenderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let current = self.current.lock().clone().unwrap_or_default();
        let mut pages = self.pages.lock();
        match pages.get_mut(&current) {
            Some(BrowserPage::Rows(rows)) => Ok(rows.clone()),
            Some(BrowserPage::Flaky { stale_reads, rows }) => {
                if *stale_reads > 0 {
                    *stale_reads -= 1;
                    Err(RenderError::StaleElement("row detached".to_string()))
                } else {
                    Ok(rows.clone())
                }
            }
            Some(BrowserPage::NoTable) | None => Ok(Vec::new()),
        }
    }
}

pub struct FakeRenderer {
    fail_launch: bool,
    pub launches: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            fail_launch: false,
            launches: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_launch: true,
            ..Self::new()
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self, _timeout: Duration) -> anyhow::Result<Box<dyn RenderContext>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            return Err(anyhow!("chromium not installed"));
        }
        Ok(Box::new(FakeContext {
            closes: Arc::clone(&self.closes),
        }))
    }

    fn active_contexts(&self) -> usize {
        self.launches() - self.closes()
    }
}

struct FakeContext {
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for FakeContext {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<NavigationResult, RenderError> {
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 5,
        })
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<bool, RenderError> {
        Ok(true)
    }

    async fn table_rows(&self, _row_selector: &str) -> Result<Vec<Vec<String>>, RenderError> {
        Ok(Vec::new())
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Wiring ──

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub cache: Arc<DividendDateCache>,
    pub extractor: Arc<FakeExtractor>,
    pub entries: Arc<FakeEntries>,
    pub lightweight: Arc<FakeLightweight>,
    pub browser: Arc<FakeBrowser>,
    pub renderer: Arc<FakeRenderer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_renderer(FakeRenderer::new())
    }

    pub fn with_renderer(renderer: FakeRenderer) -> Self {
        let clock = Arc::new(ManualClock::at_date(today()));
        let cache = Arc::new(DividendDateCache::new(DEFAULT_TTL, clock.clone()));
        Self {
            clock,
            cache,
            extractor: Arc::new(FakeExtractor::new(Vec::new())),
            entries: Arc::new(FakeEntries::new()),
            lightweight: Arc::new(FakeLightweight::new()),
            browser: Arc::new(FakeBrowser::new()),
            renderer: Arc::new(renderer),
        }
    }

    pub fn resolver(&self) -> Arc<DividendDateResolver> {
        Arc::new(DividendDateResolver::new(
            BASE,
            self.cache.clone(),
            self.lightweight.clone(),
            self.browser.clone(),
        ))
    }

    pub fn pipeline(&self) -> Arc<EnrichmentPipeline> {
        Arc::new(EnrichmentPipeline::new(
            self.resolver(),
            self.renderer.clone(),
            self.clock.clone(),
        ))
    }

    pub fn service(&self, max_concurrent_jobs: usize) -> DataComService {
        DataComService::new(
            self.extractor.clone(),
            self.entries.clone(),
            self.pipeline(),
            Arc::new(JobStore::new(self.clock.clone())),
            ServiceOptions {
                max_concurrent_jobs,
                job_retention: Duration::from_secs(3600),
            },
        )
    }
}
