//! Booking value types exchanged with the booking collaborator.

use chrono::{DateTime, Utc};
use common::Money;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Lifecycle status of a booking as reported by the booking collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Pending,
    PaymentPending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::PaymentPending => "PAYMENT_PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    /// Returns true if the booking can no longer change.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Expired
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to create a booking for a confirmed appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub appointment_id: String,
    pub move_in_date: DateTime<Utc>,
    pub move_out_date: DateTime<Utc>,
    pub booking_duration_months: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl BookingRequest {
    pub fn new(
        appointment_id: impl Into<String>,
        move_in_date: DateTime<Utc>,
        move_out_date: DateTime<Utc>,
        booking_duration_months: u32,
    ) -> Self {
        Self {
            appointment_id: appointment_id.into(),
            move_in_date,
            move_out_date,
            booking_duration_months,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the structural constraints a booking collaborator relies on.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.appointment_id.trim().is_empty() {
            return Err(DomainError::validation(
                "appointmentId",
                "Appointment ID is required",
            ));
        }
        if self.booking_duration_months == 0 {
            return Err(DomainError::validation(
                "bookingDurationMonths",
                "Duration must be positive",
            ));
        }
        if self.move_out_date <= self.move_in_date {
            return Err(DomainError::validation(
                "moveOutDate",
                "Move-out date must be after move-in date",
            ));
        }
        Ok(())
    }
}

/// A booking as returned by the booking collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: String,
    pub appointment_id: String,
    pub property_id: Option<i64>,
    pub requester_id: Option<i64>,
    pub provider_id: Option<i64>,
    pub status: BookingStatus,
    pub move_in_date: DateTime<Utc>,
    pub move_out_date: DateTime<Utc>,
    pub booking_duration_months: u32,
    pub notes: Option<String>,
    pub monthly_rent: Money,
    pub deposit_amount: Money,
    pub total_amount: Money,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Builds a pending booking from a request, with zero amounts.
    pub fn from_request(booking_id: impl Into<String>, request: &BookingRequest) -> Self {
        Self {
            booking_id: booking_id.into(),
            appointment_id: request.appointment_id.clone(),
            property_id: None,
            requester_id: None,
            provider_id: None,
            status: BookingStatus::Pending,
            move_in_date: request.move_in_date,
            move_out_date: request.move_out_date,
            booking_duration_months: request.booking_duration_months,
            notes: request.notes.clone(),
            monthly_rent: Money::zero(),
            deposit_amount: Money::zero(),
            total_amount: Money::zero(),
            cancellation_reason: None,
            cancelled_at: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn valid_request() -> BookingRequest {
        let move_in = Utc::now() + Duration::days(7);
        BookingRequest::new("APT-1", move_in, move_in + Duration::days(365), 12)
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_appointment() {
        let mut request = valid_request();
        request.appointment_id = "  ".into();
        let err = request.validate().unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "appointmentId",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_dates() {
        let mut request = valid_request();
        request.move_out_date = request.move_in_date - Duration::days(1);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut request = valid_request();
        request.booking_duration_months = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_wire_format_is_camel_case() {
        let json = serde_json::to_value(valid_request().with_notes("hi")).unwrap();
        assert_eq!(json["appointmentId"], "APT-1");
        assert_eq!(json["bookingDurationMonths"], 12);
        assert_eq!(json["notes"], "hi");
    }

    #[test]
    fn test_booking_from_request() {
        let request = valid_request();
        let booking = Booking::from_request("B-1", &request);
        assert_eq!(booking.booking_id, "B-1");
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.total_amount.is_zero());
        assert!(!booking.is_cancelled());
    }

    #[test]
    fn test_final_booking_statuses() {
        assert!(BookingStatus::Cancelled.is_final());
        assert!(BookingStatus::Expired.is_final());
        assert!(!BookingStatus::PaymentPending.is_final());
        assert_eq!(BookingStatus::PaymentPending.to_string(), "PAYMENT_PENDING");
    }
}
