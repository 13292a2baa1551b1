// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser session scoped to one enrichment run.
//!
//! The session is opened on first use, reused for every later asset of the
//! same run, and released by the run on every exit path via
//! [`BrowserSession::release`].

use super::{RenderContext, Renderer};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Upper bound for closing the browser at the end of a run.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(10);

/// A lazily opened browser context owned by exactly one run.
pub struct BrowserSession {
    renderer: Arc<dyn Renderer>,
    context: Option<Box<dyn RenderContext>>,
    /// Set after a failed launch so later assets fail fast instead of
    /// paying the launch timeout again.
    launch_error: Option<String>,
    opened_at: Option<Instant>,
    pages_read: usize,
}

impl BrowserSession {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            context: None,
            launch_error: None,
            opened_at: None,
            pages_read: 0,
        }
    }

    /// The open context, launching one within `timeout` if needed.
    pub async fn context(&mut self, timeout: Duration) -> Result<&mut dyn RenderContext> {
        if let Some(reason) = &self.launch_error {
            return Err(anyhow!("{reason}"));
        }
        if self.context.is_none() {
            match self.renderer.new_context(timeout).await {
                Ok(ctx) => {
                    debug!("browser session started");
                    self.context = Some(ctx);
                    self.opened_at = Some(Instant::now());
                }
                Err(e) => {
                    warn!("browser session could not start: {e:#}");
                    self.launch_error = Some(format!("{e:#}"));
                    return Err(e);
                }
            }
        }
        self.pages_read += 1;
        match self.context.as_deref_mut() {
            Some(ctx) => Ok(ctx),
            None => Err(anyhow!("browser session is not open")),
        }
    }

    /// Close the browser if it was ever opened, giving up after
    /// [`RELEASE_TIMEOUT`].
    pub async fn release(mut self) {
        if let Some(ctx) = self.context.take() {
            let age = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            match tokio::time::timeout(RELEASE_TIMEOUT, ctx.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("failed to close browser session: {e:#}"),
                Err(_) => warn!(timeout = ?RELEASE_TIMEOUT, "browser session did not close in time"),
            }
            debug!(pages = self.pages_read, ?age, "browser session released");
        }
    }
}
