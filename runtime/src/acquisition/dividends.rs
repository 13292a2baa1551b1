// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lightweight dividend history fetch: one GET, parsed with `scraper`.

use super::html::{element_text, CELL, DIVIDEND_ROW};
use super::http_client::HttpClient;
use super::{records_from_rows, LightweightDividendFetcher};
use crate::model::DividendRecord;
use anyhow::Context;
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;

/// Fetches an asset detail page over plain HTTP.
#[derive(Clone)]
pub struct HttpDividendFetcher {
    client: HttpClient,
}

impl HttpDividendFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LightweightDividendFetcher for HttpDividendFetcher {
    async fn fetch(&self, asset_url: &str, timeout: Duration) -> anyhow::Result<Vec<DividendRecord>> {
        let resp = self
            .client
            .get(asset_url, timeout)
            .await
            .with_context(|| format!("failed to download {asset_url}"))?;
        Ok(parse_dividend_history(&resp.body))
    }
}

/// Extract dividend records from the history table of a detail page.
///
/// A page without the table yields an empty list.
pub fn parse_dividend_history(html: &str) -> Vec<DividendRecord> {
    let document = Html::parse_document(html);
    let rows: Vec<Vec<String>> = document
        .select(&DIVIDEND_ROW)
        .map(|row| row.select(&CELL).map(|cell| element_text(&cell)).collect())
        .collect();
    records_from_rows(rows)
}
