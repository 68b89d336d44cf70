//! Appointment snapshot returned by the appointment lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::NoShow => "NO_SHOW",
            AppointmentStatus::Rescheduled => "RESCHEDULED",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The subset of appointment fields the booking flow reads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentSnapshot {
    pub appointment_id: String,
    #[serde(default)]
    pub appointment_title: Option<String>,
    #[serde(default)]
    pub appointment_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub property_id: Option<i64>,
    #[serde(default)]
    pub requester_id: Option<i64>,
    #[serde(default)]
    pub provider_id: Option<i64>,
    #[serde(default)]
    pub property_title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl AppointmentSnapshot {
    pub fn new(appointment_id: impl Into<String>, status: AppointmentStatus) -> Self {
        Self {
            appointment_id: appointment_id.into(),
            status,
            ..Default::default()
        }
    }
}

/// Envelope returned by the appointment lookup.
///
/// `success` is false when the data is a fallback placeholder rather than a
/// live answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub success: bool,
    pub message: String,
    pub appointment: AppointmentSnapshot,
}

impl AppointmentResponse {
    pub fn ok(appointment: AppointmentSnapshot) -> Self {
        Self {
            success: true,
            message: "Appointment retrieved successfully".to_string(),
            appointment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_defaults() {
        let snapshot = AppointmentSnapshot::new("APT-1", AppointmentStatus::Confirmed);
        assert_eq!(snapshot.appointment_id, "APT-1");
        assert_eq!(snapshot.status, AppointmentStatus::Confirmed);
        assert!(snapshot.property_id.is_none());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"NO_SHOW\"");
        assert_eq!(AppointmentStatus::Rescheduled.to_string(), "RESCHEDULED");
    }

    #[test]
    fn test_response_deserializes_sparse_payload() {
        let json = r#"{"success":true,"message":"ok","appointment":{"appointmentId":"APT-9"}}"#;
        let response: AppointmentResponse = serde_json::from_str(json).unwrap();
        assert!(response.success);
        assert_eq!(response.appointment.status, AppointmentStatus::Pending);
    }
}
