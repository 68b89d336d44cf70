use thiserror::Error;

/// Errors raised while calling the appointment service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The remote service could not be reached or answered with an error.
    #[error("Appointment service unavailable: {0}")]
    Unavailable(String),

    #[error("Appointment service timed out after {0} ms")]
    Timeout(u64),

    /// The remote service does not know the appointment.
    #[error("Appointment not found: {0}")]
    NotFound(String),

    /// The circuit breaker refused the call.
    #[error("Circuit breaker '{0}' is OPEN, call not permitted")]
    CallNotPermitted(String),
}

impl GatewayError {
    /// Returns true if the error counts against the dependency's health.
    ///
    /// A missing appointment is a valid answer from a healthy service.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Timeout(_))
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
