// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wallet entries (buy/sell history) extraction from static HTML.
//!
//! The entries page lays out its history in DataTables tables. DataTables
//! paginates on the client, so every row is already in the served HTML and
//! a single GET reads them all.

use super::html::{element_text, header_texts, BODY_ROW, CELL, TABLE};
use super::http_client::HttpClient;
use super::WalletEntriesExtractor;
use crate::model::{OrderType, WalletEntry, WalletEntryTable};
use anyhow::Context;
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;

/// Number of leading tables that hold entries. Pages with fewer are not
/// entries pages.
pub const ENTRY_TABLES: usize = 4;

/// Reads wallet entries with a single GET.
#[derive(Clone)]
pub struct HttpWalletEntriesExtractor {
    client: HttpClient,
}

impl HttpWalletEntriesExtractor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WalletEntriesExtractor for HttpWalletEntriesExtractor {
    async fn extract_entries(&self, entries_url: &str, timeout: Duration) -> anyhow::Result<Vec<WalletEntryTable>> {
        let resp = self
            .client
            .get(entries_url, timeout)
            .await
            .with_context(|| format!("failed to fetch wallet entries page {entries_url}"))?;
        let tables = parse_entries_html(&resp.body);
        tracing::debug!(entries_url, tables = tables.len(), "wallet entries extracted");
        Ok(tables)
    }
}

/// Parse the first [`ENTRY_TABLES`] tables of an entries page.
pub fn parse_entries_html(html: &str) -> Vec<WalletEntryTable> {
    let doc = Html::parse_document(html);
    let tables: Vec<_> = doc.select(&TABLE).take(ENTRY_TABLES).collect();
    if tables.len() < ENTRY_TABLES {
        tracing::debug!(found = tables.len(), "not enough tables for a wallet entries page");
        return Vec::new();
    }

    tables
        .iter()
        .enumerate()
        .map(|(i, table)| WalletEntryTable {
            table_index: i + 1,
            header: header_texts(table),
            entries: table
                .select(&BODY_ROW)
                .map(|row| WalletEntry {
                    order_type: OrderType::from_row_class(row.value().attr("class").unwrap_or("")),
                    cells: row.select(&CELL).map(|td| element_text(&td)).collect(),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRIES_PAGE: &str = r##"
        <html><body>
          <table id="ticker-entries">
            <thead><tr><th>Ativo</th><th>Data</th><th>Qtd</th><th></th></tr></thead>
            <tbody>
              <tr class="odd Compra"><td> PETR4 </td><td>02/01/2026</td><td>100</td></tr>
              <tr class="even Venda"><td>VALE3</td><td>15/03/2026</td><td>50</td></tr>
              <tr><td>ITSA4</td><td></td><td>10</td></tr>
            </tbody>
          </table>
          <table id="crypto-entries">
            <thead><tr><th>Moeda</th></tr></thead>
            <tbody><tr class="Compra"><td>BTC</td></tr></tbody>
          </table>
          <table><thead><tr><th>Fundo</th></tr></thead><tbody></tbody></table>
          <table><thead><tr><th>Título</th></tr></thead><tbody></tbody></table>
          <table><thead><tr><th>Ignored</th></tr></thead><tbody><tr><td>x</td></tr></tbody></table>
        </body></html>
    "##;

    #[test]
    fn test_parse_entry_tables() {
        let tables = parse_entries_html(ENTRIES_PAGE);
        assert_eq!(tables.len(), ENTRY_TABLES);
        let indexes: Vec<usize> = tables.iter().map(|t| t.table_index).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);

        let stocks = &tables[0];
        assert_eq!(stocks.header, vec!["Ativo", "Data", "Qtd"]);
        let types: Vec<OrderType> = stocks.entries.iter().map(|e| e.order_type).collect();
        assert_eq!(types, vec![OrderType::Buy, OrderType::Sell, OrderType::Unknown]);
        assert_eq!(stocks.entries[0].cells, vec!["PETR4", "02/01/2026", "100"]);
        assert_eq!(stocks.entries[2].cells, vec!["ITSA4", "", "10"]);

        assert_eq!(tables[1].entries[0].order_type, OrderType::Buy);
        assert!(tables[3].entries.is_empty());
    }

    #[test]
    fn test_page_with_too_few_tables() {
        let page = "<table><tbody><tr class=\"Compra\"><td>PETR4</td></tr></tbody></table>";
        assert!(parse_entries_html(page).is_empty());
    }
}
