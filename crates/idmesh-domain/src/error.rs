//! Domain error types for policy loading and evaluation.

use thiserror::Error;

/// Domain-specific errors for policy operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Policy document could not be parsed.
    #[error("policy parse error: {message}")]
    PolicyParse { message: String },

    /// Policy document parsed but failed semantic validation.
    #[error("policy semantic error in rule '{rule_id}': {message}")]
    PolicySemantic { rule_id: String, message: String },

    /// Policy file could not be read or written.
    #[error("policy io error for '{path}': {message}")]
    PolicyIo { path: String, message: String },

    /// Internal evaluation failure.
    ///
    /// Callers must never surface this as a Permit.
    #[error("evaluation error: {message}")]
    Evaluation { message: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
