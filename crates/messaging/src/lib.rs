//! Message bus boundary of the booking service.
//!
//! This crate provides:
//! - [`EventPublisher`], the fallible transport seam, and [`InMemoryBroker`]
//!   which implements it over broadcast queues
//! - [`BookingEventProducer`], a best-effort publisher of booking events
//! - [`AppointmentConsumer`], which decodes appointment events and hands each
//!   one to an [`AppointmentEventHandler`]

pub mod broker;
pub mod consumer;
pub mod error;
pub mod producer;

pub use broker::{
    APPOINTMENT_QUEUE, BOOKING_QUEUE, BrokerMessage, EventPublisher, InMemoryBroker,
};
pub use consumer::{AppointmentConsumer, AppointmentEventHandler, ConsumeOutcome};
pub use error::{MessagingError, Result};
pub use producer::BookingEventProducer;
