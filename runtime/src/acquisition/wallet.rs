// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wallet page extraction from static HTML.
//!
//! The wallet page shows the stock table up front and every other asset
//! class inside a collapsible group whose toggle carries
//! `onclick="MyWallets.toogleClass('<selector>', ...)"`. The group body is
//! present in the static HTML, so no browser is needed to read it.

use super::html::{element_text, header_texts, selector, BODY_ROW, CELL, TABLE};
use super::http_client::HttpClient;
use super::AssetTableExtractor;
use crate::model::{AssetRow, AssetTable};
use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use std::time::Duration;

/// Name given to the first table on the page.
pub const PRIMARY_TABLE_NAME: &str = "assets";

const UNKNOWN_TABLE_NAME: &str = "Unknown Table";

static TOGGLE_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"toogleClass\(\s*'([^']+)'").expect("valid regex"));
static TOGGLE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[onclick*="MyWallets.toogleClass"]"#));
static GROUP_NAME: LazyLock<Selector> = LazyLock::new(|| selector(".name_value"));

/// Reads wallet tables with a single GET.
#[derive(Clone)]
pub struct HttpWalletExtractor {
    client: HttpClient,
}

impl HttpWalletExtractor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetTableExtractor for HttpWalletExtractor {
    async fn extract(&self, wallet_url: &str, timeout: Duration) -> anyhow::Result<Vec<AssetTable>> {
        let resp = self
            .client
            .get(wallet_url, timeout)
            .await
            .with_context(|| format!("failed to fetch wallet page {wallet_url}"))?;
        let tables = parse_wallet_html(&resp.body);
        tracing::debug!(wallet_url, tables = tables.len(), "wallet tables extracted");
        Ok(tables)
    }
}

/// Build every asset table found on a wallet page.
pub fn parse_wallet_html(html: &str) -> Vec<AssetTable> {
    let document = Html::parse_document(html);
    let mut tables = Vec::new();

    if let Some(primary) = document.select(&TABLE).next() {
        tables.push(build_table(PRIMARY_TABLE_NAME, &primary));
    }

    for toggle in document.select(&TOGGLE) {
        let table_name = toggle
            .select(&GROUP_NAME)
            .next()
            .map(|el| element_text(&el))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_TABLE_NAME.to_string());

        // Stocks are already covered by the primary table.
        if table_name.to_uppercase().contains("AÇÕES") {
            continue;
        }

        let onclick = toggle.value().attr("onclick").unwrap_or_default();
        let Some(target) = TOGGLE_TARGET
            .captures(onclick)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            tables.push(AssetTable::failed(table_name, "Could not identify target selector"));
            continue;
        };

        let container = Selector::parse(&target)
            .ok()
            .and_then(|sel| document.select(&sel).next());
        let Some(container) = container else {
            tables.push(AssetTable::failed(table_name, "Target selector not found in static HTML"));
            continue;
        };

        match container.select(&TABLE).next() {
            Some(table) => tables.push(build_table(&table_name, &table)),
            None => tables.push(AssetTable::failed(table_name, "No table element found for selector")),
        }
    }

    tables
}

fn build_table(name: &str, table: &ElementRef<'_>) -> AssetTable {
    let header = header_texts(table);

    let rows = table
        .select(&BODY_ROW)
        .filter_map(|tr| {
            let cells: Vec<String> = tr
                .select(&CELL)
                .map(|td| element_text(&td))
                .filter(|t| !t.is_empty())
                .collect();
            (!cells.is_empty()).then(|| AssetRow::new(cells))
        })
        .collect();

    AssetTable::new(name, header, rows)
}
