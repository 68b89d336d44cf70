//! Step-specific payload carried on a saga record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::BookingRequest;

/// Key for the original booking request.
pub const KEY_BOOKING_REQUEST: &str = "bookingRequest";
/// Key for the appointment id that started the saga.
pub const KEY_APPOINTMENT_ID: &str = "appointmentId";
/// Key for the booking id resolved by the booking step.
pub const KEY_BOOKING_ID: &str = "bookingId";
/// Key for the payment transaction id.
pub const KEY_TRANSACTION_ID: &str = "transactionId";
/// Key for the payment completion timestamp.
pub const KEY_PAYMENT_COMPLETED_AT: &str = "paymentCompletedAt";

/// A single typed payload value.
///
/// Steps are heterogeneous, so each known payload kind gets its own
/// variant. `Opaque` carries anything a future step needs that has no
/// variant yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SagaPayload {
    BookingRequest(BookingRequest),
    Text(String),
    Timestamp(DateTime<Utc>),
    Opaque(Vec<u8>),
}

/// Keyed bag of step payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaData(BTreeMap<String, SagaPayload>);

impl SagaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a payload.
    pub fn insert(&mut self, key: impl Into<String>, value: SagaPayload) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&SagaPayload> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the text payload stored under `key`, if it is text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(SagaPayload::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the timestamp payload stored under `key`, if it is a timestamp.
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.0.get(key) {
            Some(SagaPayload::Timestamp(value)) => Some(*value),
            _ => None,
        }
    }

    /// Returns the original booking request.
    pub fn booking_request(&self) -> Option<&BookingRequest> {
        match self.0.get(KEY_BOOKING_REQUEST) {
            Some(SagaPayload::BookingRequest(request)) => Some(request),
            _ => None,
        }
    }

    /// Returns the recorded payment transaction id.
    pub fn transaction_id(&self) -> Option<&str> {
        self.text(KEY_TRANSACTION_ID)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
