//! Saga status state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Initiated ──► Processing ──┬──► Completed
///                            ├──► Failed ──┬──► Retrying ──► Processing
///                            │             └──► Compensating ──┬──► Compensated
///                            │                                 └──► CompensationFailed
///                            └──► Cancelled ──► Compensating
/// ```
///
/// `Cancelled` is written before compensation runs and is then replaced
/// by the compensation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    #[default]
    Initiated,
    Processing,
    /// A step failed and a caller-driven retry is pending.
    Retrying,
    /// All required steps finished (terminal state).
    Completed,
    /// A step failed and no retry is left.
    Failed,
    /// Compensating actions are in progress.
    Compensating,
    /// All compensating actions succeeded (terminal state).
    Compensated,
    /// Compensation raised an error; needs manual remediation (terminal state).
    CompensationFailed,
    /// Cancelled on request (terminal state).
    Cancelled,
}

impl SagaStatus {
    pub const ALL: [SagaStatus; 9] = [
        SagaStatus::Initiated,
        SagaStatus::Processing,
        SagaStatus::Retrying,
        SagaStatus::Completed,
        SagaStatus::Failed,
        SagaStatus::Compensating,
        SagaStatus::Compensated,
        SagaStatus::CompensationFailed,
        SagaStatus::Cancelled,
    ];

    /// Returns true if no further step transitions are permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed
                | SagaStatus::Compensated
                | SagaStatus::CompensationFailed
                | SagaStatus::Cancelled
        )
    }

    /// Returns true if a caller-driven retry may pick this saga up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SagaStatus::Failed | SagaStatus::Retrying)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Initiated => "INITIATED",
            SagaStatus::Processing => "PROCESSING",
            SagaStatus::Retrying => "RETRYING",
            SagaStatus::Completed => "COMPLETED",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Compensated => "COMPENSATED",
            SagaStatus::CompensationFailed => "COMPENSATION_FAILED",
            SagaStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SagaStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "saga status",
                value: s.to_string(),
            })
    }
}
