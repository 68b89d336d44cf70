//! Booking saga step vocabulary.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A step of the booking saga.
///
/// Variants are declared in dependency order, so the derived `Ord`
/// sorts steps the way they execute. Compensation walks them in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    AppointmentConfirmed,
    BookingCreated,
    PaymentCompleted,
    PropertyUpdated,
    Completed,
}

impl SagaStep {
    pub const ALL: [SagaStep; 5] = [
        SagaStep::AppointmentConfirmed,
        SagaStep::BookingCreated,
        SagaStep::PaymentCompleted,
        SagaStep::PropertyUpdated,
        SagaStep::Completed,
    ];

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            SagaStep::BookingCreated => "BOOKING_CREATED",
            SagaStep::PaymentCompleted => "PAYMENT_COMPLETED",
            SagaStep::PropertyUpdated => "PROPERTY_UPDATED",
            SagaStep::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SagaStep {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SagaStep::ALL
            .into_iter()
            .find(|step| step.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "saga step",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_sort_in_execution_order() {
        let mut steps = vec![
            SagaStep::Completed,
            SagaStep::BookingCreated,
            SagaStep::PaymentCompleted,
            SagaStep::AppointmentConfirmed,
        ];
        steps.sort();
        assert_eq!(
            steps,
            vec![
                SagaStep::AppointmentConfirmed,
                SagaStep::BookingCreated,
                SagaStep::PaymentCompleted,
                SagaStep::Completed,
            ]
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "BOOKING_CREATED".parse::<SagaStep>().unwrap(),
            SagaStep::BookingCreated
        );
        assert!("SHIPPED".parse::<SagaStep>().is_err());
    }
}
