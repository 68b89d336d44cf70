//! Reaction of the booking saga to appointment events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use domain::{AppointmentEvent, AppointmentEventType, BookingRequest, SagaRecord};
use messaging::{AppointmentEventHandler, MessagingError};
use saga_store::SagaStore;

use crate::error::{Result, SagaError};
use crate::orchestrator::SagaOrchestrator;
use crate::services::BookingService;

/// Notes attached to bookings created from a confirmed appointment.
pub const DEFAULT_BOOKING_NOTES: &str = "Booking created after appointment confirmation";

const DEFAULT_DURATION_MONTHS: u32 = 12;
const MOVE_IN_DELAY_DAYS: i64 = 7;

/// Optional values replacing the defaults derived from an appointment.
#[derive(Debug, Clone, Default)]
pub struct BookingOverrides {
    pub move_in_date: Option<DateTime<Utc>>,
    pub move_out_date: Option<DateTime<Utc>>,
    pub booking_duration_months: Option<u32>,
    pub notes: Option<String>,
}

/// Routes appointment events to the saga orchestrator.
///
/// A confirmed appointment does not start a saga on its own; bookings are
/// triggered through [`create_booking_from_appointment`]. A cancelled
/// appointment cancels and compensates its running saga.
///
/// [`create_booking_from_appointment`]: SagaAppointmentHandler::create_booking_from_appointment
pub struct SagaAppointmentHandler<S, B>
where
    S: SagaStore,
    B: BookingService,
{
    orchestrator: Arc<SagaOrchestrator<S, B>>,
}

impl<S, B> SagaAppointmentHandler<S, B>
where
    S: SagaStore,
    B: BookingService,
{
    pub fn new(orchestrator: Arc<SagaOrchestrator<S, B>>) -> Self {
        Self { orchestrator }
    }

    /// Creates a booking for a confirmed appointment and starts its saga.
    ///
    /// Move-in defaults to a week after the appointment, move-out to twelve
    /// months after it.
    #[tracing::instrument(skip(self, event, overrides), fields(appointment_id = %event.appointment_id))]
    pub async fn create_booking_from_appointment(
        &self,
        event: &AppointmentEvent,
        overrides: BookingOverrides,
    ) -> Result<SagaRecord> {
        match self
            .orchestrator
            .get_saga_by_appointment_id(&event.appointment_id)
            .await
        {
            Ok(existing) => {
                return Err(SagaError::Conflict(format!(
                    "Saga {} already exists for appointment: {}",
                    existing.id, event.appointment_id
                )));
            }
            Err(SagaError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let request = booking_request_for(event, overrides);
        let booking = self
            .orchestrator
            .booking_service()
            .create_booking(&request)
            .await?;

        tracing::info!(booking_id = %booking.booking_id, "booking created from appointment");

        self.orchestrator
            .start_booking_saga(&event.appointment_id, request)
            .await
    }

    async fn on_cancelled(&self, event: &AppointmentEvent) -> Result<()> {
        let saga = match self
            .orchestrator
            .get_saga_by_appointment_id(&event.appointment_id)
            .await
        {
            Ok(saga) => saga,
            Err(SagaError::NotFound { .. }) => {
                tracing::info!("appointment cancelled, no saga to cancel");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if saga.is_terminal() {
            tracing::info!(saga_id = %saga.id, status = %saga.status, "saga already finished");
            return Ok(());
        }

        let reason = event
            .cancellation_reason
            .as_deref()
            .unwrap_or("Appointment cancelled");
        self.orchestrator.cancel_saga(saga.id, reason).await?;
        Ok(())
    }
}

#[async_trait]
impl<S, B> AppointmentEventHandler for SagaAppointmentHandler<S, B>
where
    S: SagaStore + 'static,
    B: BookingService + 'static,
{
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, appointment_id = %event.appointment_id)
    )]
    async fn handle(&self, event: &AppointmentEvent) -> messaging::Result<()> {
        match event.event_type {
            AppointmentEventType::AppointmentConfirmed => {
                tracing::info!(
                    property_id = ?event.property_id,
                    requester_id = ?event.requester_id,
                    "appointment confirmed, booking can now be created"
                );
                Ok(())
            }
            AppointmentEventType::AppointmentCancelled => self
                .on_cancelled(event)
                .await
                .map_err(|e| MessagingError::Handler(e.to_string())),
            AppointmentEventType::AppointmentRescheduled => {
                tracing::info!(
                    previous = ?event.previous_date_time,
                    new = ?event.appointment_date_time,
                    "appointment rescheduled"
                );
                Ok(())
            }
            AppointmentEventType::Unknown => {
                tracing::debug!("ignoring unknown appointment event");
                Ok(())
            }
        }
    }
}

fn booking_request_for(event: &AppointmentEvent, overrides: BookingOverrides) -> BookingRequest {
    let base = event.appointment_date_time.unwrap_or_else(Utc::now);
    let move_in = overrides
        .move_in_date
        .unwrap_or(base + Duration::days(MOVE_IN_DELAY_DAYS));
    let move_out = overrides.move_out_date.unwrap_or_else(|| {
        base.checked_add_months(Months::new(DEFAULT_DURATION_MONTHS))
            .unwrap_or(base + Duration::days(365))
    });
    let months = overrides
        .booking_duration_months
        .unwrap_or(DEFAULT_DURATION_MONTHS);

    BookingRequest::new(event.appointment_id.clone(), move_in, move_out, months).with_notes(
        overrides
            .notes
            .unwrap_or_else(|| DEFAULT_BOOKING_NOTES.to_string()),
    )
}
