//! Booking saga orchestration and compensation.
//!
//! The booking saga spans the appointment and booking services:
//! 1. Appointment confirmed
//! 2. Booking created
//! 3. Payment completed
//!
//! A failing step is retried up to the saga's retry budget. Once the budget
//! is spent, or the saga is cancelled, completed steps are compensated in
//! reverse order.

pub mod compensation;
pub mod config;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod services;

pub use compensation::CompensationService;
pub use config::SagaConfig;
pub use error::{ErrorKind, Result, SagaError};
pub use handler::{BookingOverrides, DEFAULT_BOOKING_NOTES, SagaAppointmentHandler};
pub use orchestrator::SagaOrchestrator;
pub use services::{BookingService, InMemoryBookingService};
