//! Domain layer for the booking saga engine.
//!
//! This crate provides:
//! - The durable saga record and its status/step vocabulary
//! - Booking and appointment value types exchanged with collaborators
//! - Inbound appointment events and outbound booking events

pub mod appointment;
pub mod booking;
pub mod error;
pub mod events;
pub mod saga;

pub use appointment::{AppointmentResponse, AppointmentSnapshot, AppointmentStatus};
pub use booking::{Booking, BookingRequest, BookingStatus};
pub use common::{Money, SagaId, Version};
pub use error::DomainError;
pub use events::{AppointmentEvent, AppointmentEventType, BookingEvent, BookingEventType};
pub use saga::{SAGA_TYPE, SagaData, SagaPayload, SagaRecord, SagaStatus, SagaStep};
