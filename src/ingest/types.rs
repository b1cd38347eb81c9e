// src/ingest/types.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ParseError;

/// One currency's quote. Missing upstream values stay `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub code: String, // e.g. "EUR"
    pub name: String, // display name without the "(CODE)" suffix
    pub exchange_buy: Option<f64>,
    pub exchange_sell: Option<f64>,
    pub cash_buy: Option<f64>,
    pub cash_sell: Option<f64>,
}

/// Ordered, non-empty set of quotes sharing one publish timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    rows: Vec<RateRow>,
    published_at: NaiveDateTime,
}

impl RateTable {
    /// Rejects empty tables and repeated currency codes.
    pub fn new(rows: Vec<RateRow>, published_at: NaiveDateTime) -> Result<Self, ParseError> {
        if rows.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut seen = HashSet::with_capacity(rows.len());
        for r in &rows {
            if !seen.insert(r.code.as_str()) {
                return Err(ParseError::DuplicateCode(r.code.clone()));
            }
        }
        Ok(Self { rows, published_at })
    }

    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    /// Moment the source claims the data was published (not the fetch time).
    pub fn published_at(&self) -> NaiveDateTime {
        self.published_at
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact, case-sensitive lookup by currency code.
    pub fn get(&self, code: &str) -> Option<&RateRow> {
        self.rows.iter().find(|r| r.code == code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.code.as_str())
    }

    /// Narrow the table to a single currency, keeping the publish timestamp.
    pub fn only(&self, code: &str) -> Option<RateTable> {
        self.get(code).map(|row| RateTable {
            rows: vec![row.clone()],
            published_at: self.published_at,
        })
    }

    pub fn into_rows(self) -> Vec<RateRow> {
        self.rows
    }
}
