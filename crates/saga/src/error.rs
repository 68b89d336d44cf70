//! Saga error types.

use domain::{DomainError, SagaStatus};
use saga_store::StoreError;
use thiserror::Error;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A saga already exists for the correlation id.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Saga not found for {key}: {value}")]
    NotFound { key: &'static str, value: String },

    /// Malformed input, rejected before any state was changed.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// The booking collaborator failed.
    #[error("Booking service error: {0}")]
    BookingService(String),

    /// A compensating action failed.
    #[error("Compensation failed: {0}")]
    Compensation(String),

    /// Saga is in an invalid state for the requested operation.
    #[error("Invalid saga state: expected {expected}, actual {actual}")]
    InvalidState {
        expected: String,
        actual: SagaStatus,
    },

    #[error("Saga store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification callers branch on, e.g. to pick an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Conflict,
    NotFound,
    Validation,
    Dependency,
    Compensation,
    Internal,
}

impl SagaError {
    pub fn not_found(key: &'static str, value: impl Into<String>) -> Self {
        SagaError::NotFound {
            key,
            value: value.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::Conflict(_) | SagaError::InvalidState { .. } => ErrorKind::Conflict,
            SagaError::NotFound { .. } => ErrorKind::NotFound,
            SagaError::Validation(_) => ErrorKind::Validation,
            SagaError::BookingService(_) => ErrorKind::Dependency,
            SagaError::Compensation(_) => ErrorKind::Compensation,
            SagaError::Store(err) if err.is_conflict() => ErrorKind::Conflict,
            SagaError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
