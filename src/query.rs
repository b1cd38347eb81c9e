// src/query.rs
//! Point lookups: one currency or all of them, live or from the latest snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{QueryError, ValidationError};
use crate::ingest::types::RateTable;
use crate::ingest::{Pipeline, RunOptions};
use crate::store::SnapshotStore;

pub const ALL: &str = "ALL";

/// Currencies the upstream quotation page is known to carry.
pub const KNOWN_CURRENCIES: [&str; 21] = [
    "GBP", "HKD", "USD", "CHF", "SGD", "PKR", "SEK", "DKK", "NOK", "JPY", "CAD", "AUD", "MYR",
    "EUR", "RUB", "MOP", "THB", "NZD", "ZAR", "KZT", "KRW",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurrencyFilter {
    All,
    Code(String),
}

impl CurrencyFilter {
    /// Case-insensitive. Unknown codes are rejected here, before any I/O happens.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_ascii_uppercase();
        if code == ALL {
            return Ok(Self::All);
        }
        if KNOWN_CURRENCIES.contains(&code.as_str()) {
            Ok(Self::Code(code))
        } else {
            Err(ValidationError::UnknownCurrency(raw.trim().to_string()))
        }
    }

    pub fn apply(&self, table: RateTable) -> Result<RateTable, ValidationError> {
        match self {
            Self::All => Ok(table),
            Self::Code(code) => table
                .only(code)
                .ok_or_else(|| ValidationError::NotQuoted(code.clone())),
        }
    }
}

/// Restrict `table` to `currency` (`ALL` keeps every row).
pub fn filter_table(table: RateTable, currency: &str) -> Result<RateTable, ValidationError> {
    CurrencyFilter::parse(currency)?.apply(table)
}

pub struct RateQuery {
    pipeline: Arc<Pipeline>,
    url: String,
    storage: Option<SnapshotStore>,
}

impl RateQuery {
    pub fn new(pipeline: Arc<Pipeline>, url: impl Into<String>, storage: Option<PathBuf>) -> Self {
        Self {
            pipeline,
            url: url.into(),
            storage: storage.map(SnapshotStore::new),
        }
    }

    pub async fn get_rate(&self, currency: &str, live: bool) -> Result<RateTable, QueryError> {
        let filter = CurrencyFilter::parse(currency)?;
        let table = if live {
            self.fetch_live().await
        } else {
            match self.cached() {
                Some(t) => Some(t),
                None => self.fetch_live().await,
            }
        };
        let table = table.ok_or(QueryError::Unavailable)?;
        Ok(filter.apply(table)?)
    }

    async fn fetch_live(&self) -> Option<RateTable> {
        tracing::debug!(target: "query", url = %self.url, "live lookup");
        self.pipeline.run(&self.url, &RunOptions::query_only()).await
    }

    fn cached(&self) -> Option<RateTable> {
        let Some(store) = &self.storage else {
            tracing::info!(target: "query", "no storage configured, fetching live");
            return None;
        };
        let latest = match store.latest() {
            Ok(Some(id)) => id,
            Ok(None) => {
                tracing::info!(target: "query", "no snapshot stored, fetching live");
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "query", error = %e, "snapshot store unavailable, fetching live");
                return None;
            }
        };
        match store.load(&latest) {
            Ok(t) => {
                tracing::debug!(target: "query", snapshot = %latest, "serving cached snapshot");
                Some(t)
            }
            Err(e) => {
                tracing::warn!(target: "query", snapshot = %latest, error = %e, "unreadable snapshot, fetching live");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parse_is_case_insensitive() {
        assert_eq!(CurrencyFilter::parse("all").unwrap(), CurrencyFilter::All);
        assert_eq!(
            CurrencyFilter::parse(" eur ").unwrap(),
            CurrencyFilter::Code("EUR".into())
        );
        assert_eq!(
            CurrencyFilter::parse("XYZ"),
            Err(ValidationError::UnknownCurrency("XYZ".into()))
        );
    }
}
