// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.
//!
//! Every context owns its own headless browser process, so one enrichment
//! run pays the launch cost once and two runs never share a browser.

use super::{NavigationResult, RenderContext, RenderError, Renderer};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Interval between selector polls in [`RenderContext::wait_for_selector`].
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a browser gets to exit before it is killed.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// CDP messages that mean a node handle no longer points at a live node.
const STALE_NODE_MARKERS: &[&str] = &[
    "No node with given id",
    "Could not find node with given id",
    "Node with given id does not belong to the document",
    "Cannot find context with specified id",
    "stale",
];

/// Find the Chromium binary path.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    // 1. Explicit configuration / DATACOM_CHROMIUM_PATH
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.clone());
        }
    }
    if let Ok(p) = std::env::var("DATACOM_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.datacom/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = [
            home.join(".datacom/chromium/chrome-linux64/chrome"),
            home.join(".datacom/chromium/chrome"),
        ];
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Map a CDP failure to a stale-element error when the message says so.
fn classify(err: CdpError) -> RenderError {
    let message = err.to_string();
    if STALE_NODE_MARKERS.iter().any(|m| message.contains(m)) {
        RenderError::StaleElement(message)
    } else {
        RenderError::Other(anyhow::Error::new(err))
    }
}

/// Chromium-based renderer. Launches one headless browser per context.
pub struct ChromiumRenderer {
    chrome_path: PathBuf,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Locate Chromium without launching it.
    pub fn new(explicit_path: Option<&PathBuf>) -> Result<Self> {
        let chrome_path = find_chromium(explicit_path)
            .context("Chromium not found. Set DATACOM_CHROMIUM_PATH or install google-chrome.")?;
        Ok(Self {
            chrome_path,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn chrome_path(&self) -> &PathBuf {
        &self.chrome_path
    }

    async fn launch(&self) -> Result<ChromiumContext> {
        let config = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--blink-settings=imagesEnabled=false")
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(anyhow::Error::new(e).context("failed to create new page"));
            }
        };

        Ok(ChromiumContext {
            browser,
            page,
            handler_task,
            active_count: Arc::clone(&self.active_count),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self, timeout: Duration) -> Result<Box<dyn RenderContext>> {
        let context = tokio::time::timeout(timeout, self.launch())
            .await
            .map_err(|_| anyhow::anyhow!("Chromium launch timed out after {timeout:?}"))??;

        self.active_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(chrome = %self.chrome_path.display(), "browser session opened");
        Ok(Box::new(context))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A Chromium process with a single page.
pub struct ChromiumContext {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<NavigationResult, RenderError> {
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());
                Ok(NavigationResult {
                    final_url,
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) => Err(RenderError::Other(
                anyhow::Error::new(e).context(format!("navigation to {url} failed")),
            )),
            Err(_) => Err(RenderError::Timeout {
                operation: "navigation",
                timeout,
            }),
        }
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError> {
        let start = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn table_rows(&self, row_selector: &str) -> Result<Vec<Vec<String>>, RenderError> {
        let rows = self
            .page
            .find_elements(row_selector)
            .await
            .map_err(classify)?;

        let mut table = Vec::with_capacity(rows.len());
        for row in rows {
            let cells = row.find_elements("td").await.map_err(classify)?;
            let mut texts = Vec::with_capacity(cells.len());
            for cell in cells {
                let text = cell.inner_text().await.map_err(classify)?;
                texts.push(text.unwrap_or_default().trim().to_string());
            }
            table.push(texts);
        }
        Ok(table)
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let page = self.page.clone();
        let browser = &mut self.browser;
        let shutdown = async {
            let _ = page.close().await;
            let _ = browser.close().await;
            let _ = browser.wait().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await.is_err() {
            tracing::warn!(timeout = ?CLOSE_TIMEOUT, "browser did not exit, killing it");
            let _ = self.browser.kill().await;
        }
        self.handler_task.abort();
        tracing::debug!("browser session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_reads_table_rows() {
        let renderer = ChromiumRenderer::new(None).expect("chromium not found");
        let mut ctx = renderer
            .new_context(Duration::from_secs(30))
            .await
            .expect("failed to launch");

        ctx.navigate(
            "data:text/html,<table id='t'><tbody><tr><td>PETR4</td><td>05/11/2026</td></tr></tbody></table>",
            Duration::from_secs(10),
        )
        .await
        .expect("navigation failed");

        assert!(ctx
            .wait_for_selector("#t", Duration::from_secs(5))
            .await
            .unwrap());
        let rows = ctx.table_rows("#t tbody tr").await.unwrap();
        assert_eq!(rows, vec![vec!["PETR4".to_string(), "05/11/2026".to_string()]]);

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
    }

    #[test]
    fn test_find_chromium_ignores_missing_explicit_path() {
        let bogus = PathBuf::from("/definitely/not/a/chrome");
        if let Some(found) = find_chromium(Some(&bogus)) {
            assert_ne!(found, bogus);
        }
    }
}
