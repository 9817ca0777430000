use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid date in row {row}: '{value}'")]
    InvalidDate { row: u32, value: String },

    #[error("Invalid number in row {row}: '{value}'")]
    InvalidNumber { row: u32, value: String },

    #[error("Unknown sort key '{given}', expected one of: {allowed}")]
    UnknownSortKey { given: String, allowed: String },

    #[error("Invalid tax '{name}': {reason}")]
    InvalidTax { name: String, reason: String },

    #[error("No {kind} matching '{wanted}'. Available: {available}")]
    NotFound {
        kind: &'static str,
        wanted: String,
        available: String,
    },

    #[error("No unbilled rows found for the selected period and clients")]
    NothingToBill,

    #[error("Configuration '{key}' is required but not set")]
    MissingConfig { key: String },

    #[error("Configuration '{key}' is not valid: {value}")]
    BadConfig { key: String, value: String },

    #[error("Remote call to {endpoint} failed: {detail}")]
    Transport { endpoint: String, detail: String },

    #[error("Order items are malformed: {source}")]
    ItemsFormat {
        #[from]
        source: serde_json::Error,
    },

    #[error("Remote rejected the order: {message}")]
    Rejected {
        message: String,
        errors: Option<serde_json::Value>,
    },

    #[error("Order was submitted, but flagging rows as billed failed: {source}")]
    FlagAfterSubmit { source: Box<SyncError> },

    #[error("IO Error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("Input Error: {source}")]
    Input {
        #[from]
        source: inquire::error::InquireError,
    },
}

impl SyncError {
    pub fn transport(endpoint: &str, detail: impl ToString) -> Self {
        SyncError::Transport {
            endpoint: endpoint.to_string(),
            detail: detail.to_string(),
        }
    }
}
