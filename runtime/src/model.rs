// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed records for wallet tables, wallet entries, dividend snapshots and
//! enrichment output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire format of every calendar date (`dd/mm/YYYY`, as shown on the site).
pub const BR_DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a `dd/mm/YYYY` date, tolerating surrounding whitespace.
pub fn parse_br_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), BR_DATE_FORMAT).ok()
}

/// Serde adapter for `dd/mm/YYYY` dates.
pub mod br_date {
    use super::BR_DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(BR_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_br_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'")))
    }
}

/// One row of a wallet table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRow {
    pub raw_columns: Vec<String>,
}

impl AssetRow {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            raw_columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn populated(&self) -> impl Iterator<Item = &str> {
        self.raw_columns
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    /// Ticker code: the first populated column.
    pub fn code(&self) -> Option<&str> {
        self.populated().next()
    }

    /// Display name: the second populated column.
    pub fn name(&self) -> Option<&str> {
        self.populated().nth(1)
    }
}

/// One wallet table (the primary "assets" table or a collapsible group).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTable {
    pub table_name: String,
    #[serde(default)]
    pub header: Vec<String>,
    #[serde(default)]
    pub rows: Vec<AssetRow>,
    /// When set, the table could not be read and `rows` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssetTable {
    pub fn new(table_name: impl Into<String>, header: Vec<String>, rows: Vec<AssetRow>) -> Self {
        Self {
            table_name: table_name.into(),
            header,
            rows,
            error: None,
        }
    }

    pub fn failed(table_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            header: Vec::new(),
            rows: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Rows that will be resolved: none for failed tables, and only rows
    /// with a usable ticker code otherwise.
    pub fn resolvable_rows(&self) -> impl Iterator<Item = &AssetRow> {
        let rows: &[AssetRow] = if self.error.is_some() { &[] } else { &self.rows };
        rows.iter().filter(|r| r.code().is_some())
    }
}

/// Number of assets a run over `tables` will attempt.
pub fn count_assets(tables: &[AssetTable]) -> usize {
    tables.iter().map(|t| t.resolvable_rows().count()).sum()
}

/// One dividend history row as read from a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DividendRecord {
    pub date_com: NaiveDate,
    pub value: Option<String>,
}

/// The record with the latest date; the first one wins on ties.
///
/// The value travels with the date: a newer row without a value yields
/// `None` even when an older row on the page has one.
pub fn latest_record(records: Vec<DividendRecord>) -> Option<DividendRecord> {
    records.into_iter().fold(None, |best, record| match best {
        Some(b) if b.date_com >= record.date_com => Some(b),
        _ => Some(record),
    })
}

/// What the cache remembers about an asset page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DividendSnapshot {
    pub date_com: NaiveDate,
    pub last_value: Option<String>,
}

impl From<DividendRecord> for DividendSnapshot {
    fn from(record: DividendRecord) -> Self {
        Self {
            date_com: record.date_com,
            last_value: record.value,
        }
    }
}

/// An asset with a resolved ex-dividend date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub asset: String,
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub asset_type: String,
    #[serde(with = "br_date")]
    pub date_com: NaiveDate,
    #[serde(default)]
    pub last_dividend_value: Option<String>,
    #[serde(default)]
    pub details_url: String,
}

/// An asset that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentFailure {
    pub asset: String,
    pub reason: String,
}

impl EnrichmentFailure {
    pub fn new(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            reason: reason.into(),
        }
    }
}

/// Output of one pipeline run: upcoming dates sorted ascending, plus every
/// per-asset failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub results: Vec<EnrichmentResult>,
    pub failures: Vec<EnrichmentFailure>,
}

/// Side of a wallet entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "COMPRA")]
    Buy,
    #[serde(rename = "VENDA")]
    Sell,
    #[serde(rename = "N/A")]
    Unknown,
}

impl OrderType {
    /// The site marks entry rows with a `Compra` or `Venda` CSS class.
    pub fn from_row_class(class: &str) -> Self {
        if class.contains("Compra") {
            Self::Buy
        } else if class.contains("Venda") {
            Self::Sell
        } else {
            Self::Unknown
        }
    }
}

/// One buy or sell line of a wallet's entry history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub order_type: OrderType,
    /// Every cell of the row, trimmed, blanks included so columns line up
    /// with the header.
    pub cells: Vec<String>,
}

/// One entries table, numbered from 1 in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntryTable {
    pub table_index: usize,
    pub header: Vec<String>,
    pub entries: Vec<WalletEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_br_date() {
        assert_eq!(parse_br_date(" 05/11/2026 "), Some(date(2026, 11, 5)));
        assert_eq!(parse_br_date("2026-11-05"), None);
        assert_eq!(parse_br_date("-"), None);
    }

    #[test]
    fn test_row_code_skips_blank_columns() {
        let row = AssetRow::new(["", "  ", "PETR4", "Petrobras"]);
        assert_eq!(row.code(), Some("PETR4"));
        assert_eq!(row.name(), Some("Petrobras"));
        assert_eq!(AssetRow::new(["", " "]).code(), None);
    }

    #[test]
    fn test_failed_table_has_no_resolvable_rows() {
        let mut table = AssetTable::failed("FIIS", "timeout");
        table.rows.push(AssetRow::new(["HGLG11"]));
        assert_eq!(table.resolvable_rows().count(), 0);

        let ok = AssetTable::new(
            "assets",
            vec![],
            vec![AssetRow::new(["PETR4"]), AssetRow::new([""])],
        );
        assert_eq!(count_assets(&[ok, table]), 1);
    }

    #[test]
    fn test_latest_record_prefers_first_on_tie() {
        let records = vec![
            DividendRecord {
                date_com: date(2026, 3, 1),
                value: Some("a".into()),
            },
            DividendRecord {
                date_com: date(2026, 9, 1),
                value: Some("b".into()),
            },
            DividendRecord {
                date_com: date(2026, 9, 1),
                value: Some("c".into()),
            },
        ];
        let latest = latest_record(records).unwrap();
        assert_eq!(latest.value.as_deref(), Some("b"));
        assert_eq!(latest_record(vec![]), None);
    }

    #[test]
    fn test_latest_value_comes_from_the_latest_row() {
        // Only the older rows carry a value.
        let records = vec![
            DividendRecord {
                date_com: date(2026, 4, 1),
                value: Some("0,80".into()),
            },
            DividendRecord {
                date_com: date(2026, 10, 1),
                value: None,
            },
            DividendRecord {
                date_com: date(2026, 7, 1),
                value: Some("0,95".into()),
            },
        ];
        let latest = latest_record(records).unwrap();
        assert_eq!(latest.date_com, date(2026, 10, 1));
        assert_eq!(latest.value, None);
        assert_eq!(DividendSnapshot::from(latest).last_value, None);
    }

    #[test]
    fn test_order_type_from_row_class() {
        assert_eq!(OrderType::from_row_class("odd Compra"), OrderType::Buy);
        assert_eq!(OrderType::from_row_class("Venda even"), OrderType::Sell);
        assert_eq!(OrderType::from_row_class("odd"), OrderType::Unknown);
        assert_eq!(serde_json::to_value(OrderType::Unknown).unwrap(), "N/A");
    }

    #[test]
    fn test_result_serializes_br_date() {
        let result = EnrichmentResult {
            asset: "PETR4".into(),
            asset_name: "Petrobras".into(),
            asset_type: "Ações".into(),
            date_com: date(2026, 11, 5),
            last_dividend_value: None,
            details_url: "https://investidor10.com.br/acoes/petr4/".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["date_com"], "05/11/2026");
        let back: EnrichmentResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
