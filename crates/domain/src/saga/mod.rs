//! Durable saga record for the booking transaction.

pub mod data;
pub mod record;
pub mod status;
pub mod step;

pub use data::{SagaData, SagaPayload};
pub use record::SagaRecord;
pub use status::SagaStatus;
pub use step::SagaStep;

/// The saga type identifier for the booking saga.
pub const SAGA_TYPE: &str = "BOOKING_SAGA";
