// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Selectors and text helpers shared by the static HTML parsers.

use super::DIVIDEND_TABLE_ID;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

pub(crate) static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
pub(crate) static HEADER_CELL: LazyLock<Selector> = LazyLock::new(|| selector("thead tr th"));
pub(crate) static BODY_ROW: LazyLock<Selector> = LazyLock::new(|| selector("tbody tr"));
pub(crate) static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td"));
pub(crate) static DIVIDEND_ROW: LazyLock<Selector> =
    LazyLock::new(|| selector(&format!("#{DIVIDEND_TABLE_ID} tbody tr")));

/// Parse a selector literal.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Trimmed text content of an element.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Non-empty header cell texts of a table.
pub(crate) fn header_texts(table: &ElementRef<'_>) -> Vec<String> {
    table
        .select(&HEADER_CELL)
        .map(|th| element_text(&th))
        .filter(|t| !t.is_empty())
        .collect()
}
