//! Custom error types for rustroster.
//!
//! This module defines all error types used throughout the crate.
//! Library functions return `Result<T, HarvestError>` instead of using `unwrap()`.
//!
//! Errors fall into four classes:
//!
//! - fetch failures (`Network`, `Api`, `Parse`, `StalledPagination`) abort the run
//! - `GrowthInvariant` aborts before any classification or export
//! - `RecordMatch` is local to one record and is absorbed by the scheduler
//! - `DateParse` aborts summarization

use thiserror::Error;

/// Main error type for rustroster operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Source API returned a non-success status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message
        message: String,
    },

    /// Malformed page body
    #[error("Parse error: {0}")]
    Parse(String),

    /// Server reported an empty page before the declared total was reached
    #[error("Pagination stalled at cursor {cursor} of {total}")]
    StalledPagination { cursor: u64, total: u64 },

    /// New fetch is not larger than the previous snapshot
    #[error("New extract ({current}) is not larger than previous extract ({previous})")]
    GrowthInvariant { previous: usize, current: usize },

    /// Malformed author/affiliation sub-structure in a single record
    #[error("Record {id}: {reason}")]
    RecordMatch { id: String, reason: String },

    /// Record date could not be parsed during summarization
    #[error("Invalid date {value:?}: {source}")]
    DateParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl HarvestError {
    /// True for errors raised while retrieving pages from a source API.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Api { .. } | Self::Parse(_) | Self::StalledPagination { .. }
        )
    }
}

/// Result type alias using `HarvestError`
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| HarvestError::Parse(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_classification() {
        assert!(HarvestError::Parse("bad".into()).is_fetch_error());
        assert!(HarvestError::StalledPagination { cursor: 10, total: 20 }.is_fetch_error());
        assert!(!HarvestError::GrowthInvariant { previous: 1, current: 1 }.is_fetch_error());
    }

    #[test]
    fn test_ok_or_parse() {
        let missing: Option<u8> = None;
        let err = missing.ok_or_parse("no messages").unwrap_err();
        assert_eq!(err.to_string(), "Parse error: no messages");
    }
}
