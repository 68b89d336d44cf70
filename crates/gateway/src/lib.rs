//! Resilient access to the appointment service.
//!
//! Every lookup goes through a bounded [`RetryPolicy`] whose attempts each
//! pass a [`CircuitBreaker`]. When the breaker refuses a call, or all
//! attempts fail, callers get a fallback [`AppointmentResponse`] instead of
//! an error.
//!
//! [`AppointmentResponse`]: domain::AppointmentResponse

pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod gateway;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState, Permit,
};
pub use client::{AppointmentClient, InMemoryAppointmentClient};
pub use error::{GatewayError, Result};
pub use gateway::{
    APPOINTMENT_SERVICE, AppointmentGateway, FALLBACK_MESSAGE, FALLBACK_TITLE, fallback_response,
};
pub use retry::RetryPolicy;
