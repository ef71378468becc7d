//! Error types for dictionary import.

use thiserror::Error;

/// Result type alias for dictionary operations.
pub type Result<T> = std::result::Result<T, DictionaryError>;

/// Errors that can occur while talking to the dictionary wiki.
#[derive(Error, Debug)]
pub enum DictionaryError {
    /// Transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("dictionary API returned status {status}")]
    ApiStatus { status: u16 },

    /// A page URL the title could not be extracted from.
    #[error("invalid page URL: {0}")]
    InvalidUrl(String),

    /// Unexpected response body.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
