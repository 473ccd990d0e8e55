//! Domain error model.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// stock shortfalls, conflicts). Storage faults belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. empty name, non-positive price).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A batch failed validation (e.g. negative quantity).
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced product or batch does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The product as a whole cannot cover the requested quantity.
    #[error("insufficient stock (requested {requested}, available {available})")]
    InsufficientStock { requested: i64, available: i64 },

    /// The explicitly selected batch cannot cover the requested quantity.
    #[error(
        "insufficient stock in batch {} (requested {requested}, available {available})",
        fmt_expiry(.expiry)
    )]
    InsufficientBatchStock {
        expiry: Option<NaiveDate>,
        requested: i64,
        available: i64,
    },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

fn fmt_expiry(expiry: &Option<NaiveDate>) -> String {
    match expiry {
        Some(date) => date.to_string(),
        None => "without expiry".to_string(),
    }
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_batch(msg: impl Into<String>) -> Self {
        Self::InvalidBatch(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Input was malformed; the caller is expected to correct it and resubmit.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidBatch(_) | Self::InvalidId(_)
        )
    }

    /// Retrying the whole operation against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
