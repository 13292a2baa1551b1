// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-based page reading.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide).

pub mod chromium;
pub mod session;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use session::BrowserSession;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Errors raised while driving a browser context.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// A previously located node vanished, usually because the page re-rendered.
    #[error("stale element: {0}")]
    StaleElement(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleElement(_))
    }
}

/// A browser engine that can open sessions.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new browser context. `timeout` bounds the startup.
    async fn new_context(&self, timeout: Duration) -> anyhow::Result<Box<dyn RenderContext>>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for reading pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<NavigationResult, RenderError>;
    /// Poll until `selector` matches. `Ok(false)` when it never appeared.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration)
        -> Result<bool, RenderError>;
    /// Trimmed text of every `td` for each row matching `row_selector`.
    async fn table_rows(&self, row_selector: &str) -> Result<Vec<Vec<String>>, RenderError>;
    /// Close this context and release the browser behind it.
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// The lightweight HTTP path works without a browser. This stub makes the
/// browser fallback fail per asset, but everything else still functions.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self, _timeout: Duration) -> anyhow::Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available, HTTP-only mode"))
    }
    fn active_contexts(&self) -> usize {
        0
    }
}
