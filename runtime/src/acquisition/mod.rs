// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered acquisition of wallet tables, wallet entries and dividend history.
//!
//! Cheap HTTP requests parsed with `scraper` come first; the browser is a
//! last-resort fallback for pages whose dividend table is rendered client
//! side. The traits here are the seams the resolver and service are built
//! against, so either layer can be swapped out in tests.

pub mod dividends;
pub mod dom;
pub mod entries;
mod html;
pub mod http_client;
pub mod wallet;

use crate::model::{AssetTable, DividendRecord, WalletEntryTable};
use crate::renderer::{RenderContext, RenderError};
use async_trait::async_trait;
use std::time::Duration;

/// Element id of the dividend history table on asset detail pages.
pub const DIVIDEND_TABLE_ID: &str = "table-dividends-history";

/// Reads the asset tables of a wallet page.
#[async_trait]
pub trait AssetTableExtractor: Send + Sync {
    async fn extract(&self, wallet_url: &str, timeout: Duration) -> anyhow::Result<Vec<AssetTable>>;
}

/// Reads the buy/sell history tables of a wallet entries page.
#[async_trait]
pub trait WalletEntriesExtractor: Send + Sync {
    async fn extract_entries(&self, entries_url: &str, timeout: Duration) -> anyhow::Result<Vec<WalletEntryTable>>;
}

/// Fetches dividend history without a browser. An empty list is not an error.
#[async_trait]
pub trait LightweightDividendFetcher: Send + Sync {
    async fn fetch(&self, asset_url: &str, timeout: Duration) -> anyhow::Result<Vec<DividendRecord>>;
}

/// Reads dividend history through a live browser session.
///
/// Split in steps so each gets its own slice of the budget, and a stale
/// read can be retried without navigating again.
#[async_trait]
pub trait BrowserDividendFetcher: Send + Sync {
    /// Navigate to `asset_url`.
    async fn open(
        &self,
        session: &mut dyn RenderContext,
        asset_url: &str,
        nav_timeout: Duration,
    ) -> Result<(), RenderError>;

    /// Wait for the dividend table. `Ok(false)` when it never showed up
    /// within `wait_timeout`.
    async fn wait_for_table(
        &self,
        session: &dyn RenderContext,
        wait_timeout: Duration,
    ) -> Result<bool, RenderError>;

    /// Read the rows of the already loaded table. Each call re-waits up to
    /// `settle_timeout` for the table, so it can be retried after a stale read.
    async fn read(
        &self,
        session: &dyn RenderContext,
        settle_timeout: Duration,
        script_timeout: Duration,
    ) -> Result<Vec<DividendRecord>, RenderError>;
}

/// Turn raw dividend table rows into records.
///
/// Rows with fewer than two cells are skipped; cell 1 holds the date and
/// cell 2, when present, the dividend value.
pub fn records_from_rows<I, R, S>(rows: I) -> Vec<DividendRecord>
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    rows.into_iter()
        .filter_map(|row| {
            let cells = row.as_ref();
            if cells.len() < 2 {
                return None;
            }
            let date_com = crate::model::parse_br_date(cells[1].as_ref())?;
            let value = cells
                .get(2)
                .map(|c| c.as_ref().trim().to_string())
                .filter(|v| !v.is_empty());
            Some(DividendRecord { date_com, value })
        })
        .collect()
}
