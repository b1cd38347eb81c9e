// src/error.rs
//! Error taxonomy of the scrape → parse → persist → notify pipeline.
//!
//! Fetch and parse errors abort a pipeline run; storage errors are logged and the
//! in-memory table is still returned; trigger failures never leave the registry;
//! validation errors only exist at the query layer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not build http client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no table with the expected quotation header was found")]
    TableNotFound,

    #[error("quotation table has a header but no data rows")]
    Empty,

    #[error("row {row}: expected {expected} cells, found {found}")]
    CellCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}: currency cell `{cell}` has no `(CODE)` suffix")]
    CurrencyCell { row: usize, cell: String },

    #[error("row {row}: `{value}` is not a number")]
    Number { row: usize, value: String },

    #[error("unrecognised publish timestamp `{0}`")]
    Timestamp(String),

    #[error("currency code {0} appears more than once")]
    DuplicateCode(String),

    #[error("snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage directory does not exist: {0}")]
    MissingDir(PathBuf),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing snapshot {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("snapshot {path} could not be read back: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid currency: {0}")]
    UnknownCurrency(String),

    #[error("currency {0} is not quoted in the current rate table")]
    NotQuoted(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to get the exchange rate")]
    Unavailable,
}
