// src/ingest/parse.rs
//! Quotation table parsing.
//!
//! The upstream page carries no stable ids, so the table is located by its header
//! text ("find-by-signature") and data rows are read relative to that header.

use chrono::NaiveDateTime;
use metrics::histogram;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ParseError;
use crate::ingest::types::{RateRow, RateTable};

/// Header cells of the quotation table, in column order.
pub const HEADER_SIGNATURE: [&str; 6] = [
    "币种",
    "现汇买入价",
    "现钞买入价",
    "现汇卖出价",
    "现钞卖出价",
    "发布时间",
];

const COL_CURRENCY: usize = 0;
const COL_EXCH_BUY: usize = 1;
const COL_CASH_BUY: usize = 2;
const COL_EXCH_SELL: usize = 3;
const COL_CASH_SELL: usize = 4;
const COL_PUBLISHED: usize = 5;

const MISSING: &str = "--";

/// Canonical timestamp text used inside snapshot files.
pub const SNAPSHOT_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TS_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
static CURRENCY_CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+?)\s*[(（]\s*(?P<code>\w+)\s*[)）]$").expect("currency cell regex")
});

/// Parse raw quotation markup into a rate table.
///
/// Either the whole table is accepted or a `ParseError` is returned; a partially
/// populated table never escapes.
pub fn parse_markup(html: &str) -> Result<RateTable, ParseError> {
    let t0 = std::time::Instant::now();
    let doc = Html::parse_document(html);
    let data_rows = locate_quotation_rows(&doc).ok_or(ParseError::TableNotFound)?;

    let mut rows = Vec::with_capacity(data_rows.len());
    let mut published_at = None;
    for (idx, cells) in data_rows.iter().enumerate() {
        // spacer rows
        if cells.is_empty() {
            continue;
        }
        let row_no = idx + 1;
        if cells.len() != HEADER_SIGNATURE.len() {
            return Err(ParseError::CellCount {
                row: row_no,
                expected: HEADER_SIGNATURE.len(),
                found: cells.len(),
            });
        }

        let (name, code) =
            split_currency(&cells[COL_CURRENCY]).ok_or_else(|| ParseError::CurrencyCell {
                row: row_no,
                cell: cells[COL_CURRENCY].clone(),
            })?;
        let ts = normalize_published_at(&cells[COL_PUBLISHED])?;
        published_at.get_or_insert(ts);

        rows.push(RateRow {
            code,
            name,
            exchange_buy: parse_quote(row_no, &cells[COL_EXCH_BUY])?,
            exchange_sell: parse_quote(row_no, &cells[COL_EXCH_SELL])?,
            cash_buy: parse_quote(row_no, &cells[COL_CASH_BUY])?,
            cash_sell: parse_quote(row_no, &cells[COL_CASH_SELL])?,
        });
    }

    let published_at = published_at.ok_or(ParseError::Empty)?;
    let table = RateTable::new(rows, published_at)?;

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("fx_parse_ms").record(ms);
    tracing::debug!(
        target: "ingest",
        rows = table.len(),
        published_at = %table.published_at(),
        "parsed quotation markup"
    );
    Ok(table)
}

/// Read a persisted snapshot back into a rate table.
pub fn parse_snapshot_file(path: &Path) -> Result<RateTable, ParseError> {
    let snapshot_err = |source: csv::Error| ParseError::Snapshot {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::Reader::from_path(path).map_err(snapshot_err)?;
    let mut rows = Vec::new();
    let mut published_at = None;
    for rec in rdr.deserialize::<SnapshotRecord>() {
        let rec = rec.map_err(snapshot_err)?;
        let ts = normalize_published_at(&rec.published_at)?;
        published_at.get_or_insert(ts);
        rows.push(rec.into_row());
    }

    let published_at = published_at.ok_or(ParseError::Empty)?;
    let table = RateTable::new(rows, published_at)?;
    tracing::debug!(
        target: "ingest",
        path = %path.display(),
        rows = table.len(),
        "parsed snapshot file"
    );
    Ok(table)
}

/// Normalise the publisher's localized calendar text into a date-time.
///
/// `2023年04月01日 04:14:05` and `2023-04-01 04:14:05` both yield the same value.
pub fn normalize_published_at(raw: &str) -> Result<NaiveDateTime, ParseError> {
    let replaced = raw.replace(['年', '月'], "-").replace('日', " ");
    let cleaned = collapse_ws(&replaced);
    TS_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&cleaned, fmt).ok())
        .ok_or_else(|| ParseError::Timestamp(raw.trim().to_string()))
}

/// `英镑(GBP)` → (`英镑`, `GBP`)
pub fn split_currency(cell: &str) -> Option<(String, String)> {
    let caps = CURRENCY_CELL.captures(cell.trim())?;
    let name = caps.name("name")?.as_str().trim().to_string();
    let code = caps.name("code")?.as_str().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }
    Some((name, code))
}

fn parse_quote(row: usize, cell: &str) -> Result<Option<f64>, ParseError> {
    let s = cell.trim();
    if s.is_empty() || s == MISSING {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ParseError::Number {
            row,
            value: s.to_string(),
        }),
    }
}

/// Rows that follow the signature header of the first matching table.
/// Each row is returned as its normalised cell texts.
fn locate_quotation_rows(doc: &Html) -> Option<Vec<Vec<String>>> {
    for table in doc.select(&TABLE) {
        let own_rows: Vec<Vec<String>> = table
            .select(&ROW)
            .filter(|tr| belongs_to(tr, &table))
            .map(|tr| cell_texts(&tr))
            .collect();

        if let Some(pos) = own_rows.iter().position(|cells| is_header(cells)) {
            return Some(own_rows.into_iter().skip(pos + 1).collect());
        }
    }
    None
}

/// True when the nearest enclosing `<table>` of `row` is `table` (nested tables excluded).
fn belongs_to(row: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    row.ancestors()
        .find(|n| n.value().as_element().is_some_and(|e| e.name() == "table"))
        .is_some_and(|n| n.id() == table.id())
}

fn cell_texts(row: &ElementRef<'_>) -> Vec<String> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .map(|c| collapse_ws(&c.text().collect::<String>()))
        .collect()
}

fn is_header(cells: &[String]) -> bool {
    cells.len() == HEADER_SIGNATURE.len()
        && cells.iter().zip(HEADER_SIGNATURE).all(|(c, sig)| c == sig)
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One line of a snapshot CSV file.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SnapshotRecord {
    pub code: String,
    pub name: String,
    pub exch_buy: Option<f64>,
    pub exch_sell: Option<f64>,
    pub cash_buy: Option<f64>,
    pub cash_sell: Option<f64>,
    pub published_at: String,
}

impl SnapshotRecord {
    pub(crate) fn from_row(row: &RateRow, published_at: NaiveDateTime) -> Self {
        Self {
            code: row.code.clone(),
            name: row.name.clone(),
            exch_buy: row.exchange_buy,
            exch_sell: row.exchange_sell,
            cash_buy: row.cash_buy,
            cash_sell: row.cash_sell,
            published_at: published_at.format(SNAPSHOT_TS_FORMAT).to_string(),
        }
    }

    fn into_row(self) -> RateRow {
        RateRow {
            code: self.code.trim().to_ascii_uppercase(),
            name: self.name,
            exchange_buy: self.exch_buy,
            exchange_sell: self.exch_sell,
            cash_buy: self.cash_buy,
            cash_sell: self.cash_sell,
        }
    }
}
