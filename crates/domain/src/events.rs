//! Event shapes crossing the message bus.
//!
//! Both shapes use camelCase field names on the wire, and both are "open":
//! every field except the type is optional so producers only fill what the
//! event needs.

use chrono::{DateTime, Utc};
use common::{EventId, Money};
use serde::{Deserialize, Serialize};

use crate::booking::Booking;

/// Inbound appointment event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentEventType {
    AppointmentConfirmed,
    AppointmentCancelled,
    AppointmentRescheduled,
    /// Any type this service does not react to.
    #[serde(other)]
    Unknown,
}

impl AppointmentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentEventType::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            AppointmentEventType::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            AppointmentEventType::AppointmentRescheduled => "APPOINTMENT_RESCHEDULED",
            AppointmentEventType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for AppointmentEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event published by the appointment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentEvent {
    pub event_type: AppointmentEventType,
    pub appointment_id: String,
    #[serde(default)]
    pub event_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub appointment_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub previous_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub property_id: Option<i64>,
    #[serde(default)]
    pub property_title: Option<String>,
    #[serde(default)]
    pub requester_id: Option<i64>,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub requester_email: Option<String>,
    #[serde(default)]
    pub provider_id: Option<i64>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub provider_email: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl AppointmentEvent {
    pub fn new(event_type: AppointmentEventType, appointment_id: impl Into<String>) -> Self {
        Self {
            event_type,
            appointment_id: appointment_id.into(),
            event_timestamp: Some(Utc::now()),
            appointment_date_time: None,
            previous_date_time: None,
            property_id: None,
            property_title: None,
            requester_id: None,
            requester_name: None,
            requester_email: None,
            provider_id: None,
            provider_name: None,
            provider_email: None,
            cancellation_reason: None,
        }
    }
}

/// Outbound booking event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventType {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    BookingExpired,
    BookingPaymentCompleted,
    BookingCancelledCompensation,
    PaymentRefundedCompensation,
}

impl BookingEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventType::BookingCreated => "BOOKING_CREATED",
            BookingEventType::BookingConfirmed => "BOOKING_CONFIRMED",
            BookingEventType::BookingCancelled => "BOOKING_CANCELLED",
            BookingEventType::BookingCompleted => "BOOKING_COMPLETED",
            BookingEventType::BookingExpired => "BOOKING_EXPIRED",
            BookingEventType::BookingPaymentCompleted => "BOOKING_PAYMENT_COMPLETED",
            BookingEventType::BookingCancelledCompensation => "BOOKING_CANCELLED_COMPENSATION",
            BookingEventType::PaymentRefundedCompensation => "PAYMENT_REFUNDED_COMPENSATION",
        }
    }

    /// Returns true for events emitted while rolling a saga back.
    pub fn is_compensation(&self) -> bool {
        matches!(
            self,
            BookingEventType::BookingCancelledCompensation
                | BookingEventType::PaymentRefundedCompensation
        )
    }
}

impl std::fmt::Display for BookingEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event published by this service about a booking.
///
/// `event_id` and `event_timestamp` are left empty by callers and filled by
/// the producer at publish time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub event_type: BookingEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_in_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_out_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_duration_months: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<Money>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl BookingEvent {
    /// Creates an event with only the type set.
    pub fn new(event_type: BookingEventType) -> Self {
        Self {
            event_type,
            event_id: None,
            event_timestamp: None,
            booking_id: None,
            appointment_id: None,
            move_in_date: None,
            move_out_date: None,
            booking_duration_months: None,
            status: None,
            notes: None,
            total_amount: None,
            deposit_amount: None,
            monthly_rent: None,
            paid_amount: None,
            property_id: None,
            property_title: None,
            requester_id: None,
            requester_name: None,
            provider_id: None,
            provider_name: None,
            cancellation_reason: None,
            cancelled_at: None,
            payment_id: None,
            transaction_id: None,
        }
    }

    /// Creates an event carrying the booking's core details.
    pub fn from_booking(event_type: BookingEventType, booking: &Booking) -> Self {
        Self {
            booking_id: Some(booking.booking_id.clone()),
            appointment_id: Some(booking.appointment_id.clone()),
            move_in_date: Some(booking.move_in_date),
            move_out_date: Some(booking.move_out_date),
            booking_duration_months: Some(booking.booking_duration_months),
            status: Some(booking.status.to_string()),
            notes: booking.notes.clone(),
            total_amount: Some(booking.total_amount),
            deposit_amount: Some(booking.deposit_amount),
            monthly_rent: Some(booking.monthly_rent),
            property_id: booking.property_id,
            requester_id: booking.requester_id,
            provider_id: booking.provider_id,
            cancellation_reason: booking.cancellation_reason.clone(),
            cancelled_at: booking.cancelled_at,
            ..Self::new(event_type)
        }
    }
}
