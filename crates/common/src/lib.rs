//! Shared types used across the booking saga workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{EventId, SagaId, Version};
