//! Messaging error types.

use thiserror::Error;

/// Errors that can occur while moving events across the bus.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The transport refused or failed to deliver a message.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// An inbound message could not be decoded.
    #[error("Malformed message: {0}")]
    Decode(String),

    /// The handler failed to process a decoded event.
    #[error("Handler error: {0}")]
    Handler(String),

    /// An outbound event could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
