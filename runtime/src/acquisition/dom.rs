// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser-driven dividend history reading.

use super::{records_from_rows, BrowserDividendFetcher, DIVIDEND_TABLE_ID};
use crate::model::DividendRecord;
use crate::renderer::{RenderContext, RenderError};
use async_trait::async_trait;
use std::time::Duration;

/// Reads `#table-dividends-history` out of a rendered page.
#[derive(Debug, Default, Clone, Copy)]
pub struct DomDividendFetcher;

impl DomDividendFetcher {
    fn table_selector() -> String {
        format!("#{DIVIDEND_TABLE_ID}")
    }

    fn row_selector() -> String {
        format!("#{DIVIDEND_TABLE_ID} tbody tr")
    }
}

#[async_trait]
impl BrowserDividendFetcher for DomDividendFetcher {
    async fn open(
        &self,
        session: &mut dyn RenderContext,
        asset_url: &str,
        nav_timeout: Duration,
    ) -> Result<(), RenderError> {
        let nav = session.navigate(asset_url, nav_timeout).await?;
        tracing::debug!(url = %nav.final_url, load_ms = nav.load_time_ms, "asset page loaded");
        Ok(())
    }

    async fn wait_for_table(
        &self,
        session: &dyn RenderContext,
        wait_timeout: Duration,
    ) -> Result<bool, RenderError> {
        session
            .wait_for_selector(&Self::table_selector(), wait_timeout)
            .await
    }

    async fn read(
        &self,
        session: &dyn RenderContext,
        settle_timeout: Duration,
        script_timeout: Duration,
    ) -> Result<Vec<DividendRecord>, RenderError> {
        if !session
            .wait_for_selector(&Self::table_selector(), settle_timeout)
            .await?
        {
            return Err(RenderError::StaleElement(
                "dividend table detached from the page".to_string(),
            ));
        }
        let rows = tokio::time::timeout(script_timeout, session.table_rows(&Self::row_selector()))
            .await
            .map_err(|_| RenderError::Timeout {
                operation: "dividend table read",
                timeout: script_timeout,
            })??;
        Ok(records_from_rows(rows))
    }
}
