//! Error types for the knowledge base.

use thiserror::Error;

/// Result type alias for knowledge base operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Errors surfaced by the knowledge base.
///
/// Embedding gateway failures never appear here: the store logs them and
/// degrades to keyword search instead.
#[derive(Error, Debug)]
pub enum KnowledgeError {
    /// Payload is not an array of well-formed documents.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Persistence backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
