//! Storage error types.

use thiserror::Error;

/// Errors surfaced by record store implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    /// No record with the given primary key.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// A different record already holds the unique secondary key.
    #[error("{resource} already exists: {key}")]
    Conflict { resource: &'static str, key: String },

    /// The filter expression is outside the supported grammar.
    #[error("unsupported filter: {message}")]
    BadFilter { message: String },

    /// A record field failed structural validation.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
