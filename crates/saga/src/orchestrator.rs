//! Booking saga orchestrator.

use chrono::Utc;
use common::SagaId;
use domain::saga::data::{
    KEY_APPOINTMENT_ID, KEY_BOOKING_ID, KEY_BOOKING_REQUEST, KEY_PAYMENT_COMPLETED_AT,
    KEY_TRANSACTION_ID,
};
use domain::{
    Booking, BookingEvent, BookingEventType, BookingRequest, DomainError, SagaPayload,
    SagaRecord, SagaStatus, SagaStep,
};
use messaging::BookingEventProducer;
use saga_store::{SagaStore, SagaStoreExt, StoreError};

use crate::compensation::CompensationService;
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::services::BookingService;

/// Drives booking sagas through their steps.
///
/// Every operation loads a record, mutates it and saves it back. Saves are
/// compare-and-swap on the record version, so each mutation continues from
/// the record returned by the previous save. A step failure is never
/// returned to the caller: it becomes a `RETRYING` transition or, once
/// retries run out, a compensation.
pub struct SagaOrchestrator<S, B>
where
    S: SagaStore,
    B: BookingService,
{
    store: S,
    booking_service: B,
    compensation: CompensationService<S, B>,
    producer: BookingEventProducer,
    config: SagaConfig,
}

impl<S, B> SagaOrchestrator<S, B>
where
    S: SagaStore + Clone,
    B: BookingService + Clone,
{
    pub fn new(store: S, booking_service: B, producer: BookingEventProducer) -> Self {
        Self::with_config(store, booking_service, producer, SagaConfig::default())
    }

    pub fn with_config(
        store: S,
        booking_service: B,
        producer: BookingEventProducer,
        config: SagaConfig,
    ) -> Self {
        let compensation =
            CompensationService::new(store.clone(), booking_service.clone(), producer.clone());
        Self {
            store,
            booking_service,
            compensation,
            producer,
            config,
        }
    }
}

impl<S, B> SagaOrchestrator<S, B>
where
    S: SagaStore,
    B: BookingService,
{
    pub fn booking_service(&self) -> &B {
        &self.booking_service
    }

    pub fn compensation(&self) -> &CompensationService<S, B> {
        &self.compensation
    }

    /// Starts the booking saga for an appointment.
    ///
    /// Idempotent per appointment: when a saga already exists it is returned
    /// as is. A booking already made for the appointment is attached to the
    /// new record.
    #[tracing::instrument(skip(self, request))]
    pub async fn start_booking_saga(
        &self,
        appointment_id: &str,
        request: BookingRequest,
    ) -> Result<SagaRecord> {
        if appointment_id.trim().is_empty() {
            return Err(
                DomainError::validation("appointmentId", "Appointment ID is required").into(),
            );
        }

        if let Some(existing) = self.store.find_by_appointment_id(appointment_id).await? {
            tracing::warn!(
                saga_id = %existing.id,
                status = %existing.status,
                "saga already exists for appointment"
            );
            return Ok(existing);
        }

        let mut saga = SagaRecord::new_booking_saga(appointment_id, self.config.max_retries);
        saga.status = SagaStatus::Processing;
        saga.current_step = SagaStep::BookingCreated;
        saga.mark_step_completed(SagaStep::AppointmentConfirmed);
        saga.mark_step_completed(SagaStep::BookingCreated);
        saga.put_data(KEY_BOOKING_REQUEST, SagaPayload::BookingRequest(request));
        saga.put_data(KEY_APPOINTMENT_ID, SagaPayload::Text(appointment_id.to_string()));

        match self
            .booking_service
            .get_bookings_by_appointment_id(appointment_id)
            .await
        {
            Ok(bookings) => {
                if let Some(booking) = bookings.first() {
                    attach_booking(&mut saga, booking);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "booking lookup failed, starting saga without booking id");
            }
        }

        let saga = match self.store.save(saga).await {
            Ok(saga) => saga,
            Err(StoreError::DuplicateAppointment(_)) => {
                // Lost a race with a concurrent start for the same appointment.
                return self
                    .store
                    .find_by_appointment_id(appointment_id)
                    .await?
                    .ok_or_else(|| {
                        SagaError::Conflict(format!(
                            "Saga already exists for appointment: {appointment_id}"
                        ))
                    });
            }
            Err(e) => return Err(e.into()),
        };

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(
            saga_id = %saga.id,
            booking_id = ?saga.booking_id,
            "booking saga started"
        );

        Ok(saga)
    }

    /// Ensures a booking exists for the saga's appointment.
    ///
    /// Reuses the first existing booking before creating a new one. A
    /// collaborator failure is handed to [`handle_saga_failure`].
    ///
    /// [`handle_saga_failure`]: SagaOrchestrator::handle_saga_failure
    #[tracing::instrument(skip(self, saga, request), fields(saga_id = %saga.id))]
    pub async fn execute_create_booking_step(
        &self,
        mut saga: SagaRecord,
        request: &BookingRequest,
    ) -> Result<SagaRecord> {
        saga.status = SagaStatus::Processing;
        saga.current_step = SagaStep::BookingCreated;
        saga.touch();
        let mut saga = self.store.save(saga).await?;

        match self.find_or_create_booking(&saga.appointment_id, request).await {
            Ok(booking) => {
                attach_booking(&mut saga, &booking);
                saga.mark_step_completed(SagaStep::BookingCreated);
                saga.error_message = None;
                saga.touch();
                let saga = self.store.save(saga).await?;

                tracing::info!(
                    saga_id = %saga.id,
                    booking_id = %booking.booking_id,
                    "booking step completed"
                );
                Ok(saga)
            }
            Err(e) => {
                tracing::warn!(saga_id = %saga.id, error = %e, "booking step failed");
                self.handle_saga_failure(saga, SagaStep::BookingCreated, &e)
                    .await
            }
        }
    }

    async fn find_or_create_booking(
        &self,
        appointment_id: &str,
        request: &BookingRequest,
    ) -> Result<Booking> {
        let existing = self
            .booking_service
            .get_bookings_by_appointment_id(appointment_id)
            .await?;
        match existing.into_iter().next() {
            Some(booking) => Ok(booking),
            None => self.booking_service.create_booking(request).await,
        }
    }

    /// Records a completed payment for the saga owning `booking_id`, announces
    /// it on the booking queue and completes the saga.
    #[tracing::instrument(skip(self))]
    pub async fn handle_payment_completed(
        &self,
        booking_id: &str,
        transaction_id: &str,
    ) -> Result<SagaRecord> {
        let mut saga = self.get_saga_by_booking_id(booking_id).await?;

        if saga.status == SagaStatus::Completed {
            tracing::info!(saga_id = %saga.id, "payment already recorded, saga is completed");
            return Ok(saga);
        }
        if saga.is_terminal() {
            return Err(SagaError::InvalidState {
                expected: "non-terminal".to_string(),
                actual: saga.status,
            });
        }

        saga.current_step = SagaStep::PaymentCompleted;
        saga.mark_step_completed(SagaStep::PaymentCompleted);
        saga.put_data(KEY_TRANSACTION_ID, SagaPayload::Text(transaction_id.to_string()));
        saga.put_data(KEY_PAYMENT_COMPLETED_AT, SagaPayload::Timestamp(Utc::now()));
        saga.touch();
        let saga = self.store.save(saga).await?;

        tracing::info!(saga_id = %saga.id, transaction_id, "payment completed");
        self.producer
            .publish_booking_payment_completed(payment_completed_event(&saga, transaction_id))
            .await;

        self.complete_saga(saga).await
    }

    /// Marks the saga completed.
    #[tracing::instrument(skip(self, saga), fields(saga_id = %saga.id))]
    pub async fn complete_saga(&self, mut saga: SagaRecord) -> Result<SagaRecord> {
        let now = Utc::now();
        saga.status = SagaStatus::Completed;
        saga.current_step = SagaStep::Completed;
        saga.completed_at = Some(now);
        saga.touch();
        let saga = self.store.save(saga).await?;

        let duration = (now - saga.started_at).num_milliseconds() as f64 / 1000.0;
        metrics::histogram!("saga_duration_seconds").record(duration);
        metrics::counter!("saga_completed_total").increment(1);
        tracing::info!(saga_id = %saga.id, duration, "saga completed");

        Ok(saga)
    }

    /// Records a step failure.
    ///
    /// While retries remain the saga moves to `RETRYING`. Otherwise it stays
    /// `FAILED` and is compensated before this returns. Terminal sagas are
    /// returned unchanged.
    #[tracing::instrument(skip(self, saga, cause), fields(saga_id = %saga.id))]
    pub async fn handle_saga_failure(
        &self,
        mut saga: SagaRecord,
        failed_step: SagaStep,
        cause: &SagaError,
    ) -> Result<SagaRecord> {
        if saga.is_terminal() {
            tracing::warn!(status = %saga.status, "ignoring failure reported for terminal saga");
            return Ok(saga);
        }

        saga.status = SagaStatus::Failed;
        saga.current_step = failed_step;
        saga.mark_step_failed(failed_step);
        saga.error_message = Some(cause.to_string());
        saga.compensation_required = true;

        if saga.can_retry() {
            saga.increment_retry_count();
            saga.status = SagaStatus::Retrying;
        }
        saga.touch();
        let saga = self.store.save(saga).await?;

        metrics::counter!("saga_failed_total").increment(1);
        tracing::error!(
            step = %failed_step,
            status = %saga.status,
            retry_count = saga.retry_count,
            max_retries = saga.max_retries,
            error = %cause,
            "saga step failed"
        );

        if saga.status == SagaStatus::Failed {
            return self.compensation.compensate(saga).await;
        }
        Ok(saga)
    }

    /// Re-runs the saga's current step if retries remain.
    #[tracing::instrument(skip(self))]
    pub async fn retry_saga(&self, saga_id: SagaId) -> Result<SagaRecord> {
        let saga = self.get_saga(saga_id).await?;

        if saga.is_terminal() || !saga.can_retry() {
            tracing::warn!(
                status = %saga.status,
                retry_count = saga.retry_count,
                "saga cannot be retried"
            );
            return Ok(saga);
        }

        match saga.current_step {
            SagaStep::BookingCreated => {
                let request = saga
                    .saga_data
                    .booking_request()
                    .cloned()
                    .ok_or_else(|| {
                        DomainError::validation(KEY_BOOKING_REQUEST, "No booking request recorded")
                    })?;

                metrics::counter!("saga_retries_total").increment(1);
                tracing::info!(retry_count = saga.retry_count, "retrying booking step");
                self.execute_create_booking_step(saga, &request).await
            }
            step => {
                tracing::info!(%step, "no retry action for step");
                Ok(saga)
            }
        }
    }

    /// Cancels a running saga and compensates it.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_saga(&self, saga_id: SagaId, reason: &str) -> Result<SagaRecord> {
        let mut saga = self.get_saga(saga_id).await?;

        if saga.is_terminal() {
            return Err(SagaError::InvalidState {
                expected: "non-terminal".to_string(),
                actual: saga.status,
            });
        }

        saga.status = SagaStatus::Cancelled;
        saga.error_message = Some(format!("Cancelled: {reason}"));
        saga.compensation_required = true;
        saga.touch();
        let saga = self.store.save(saga).await?;

        metrics::counter!("saga_cancelled_total").increment(1);
        tracing::info!(saga_id = %saga.id, reason, "saga cancelled");

        self.compensation.compensate(saga).await
    }

    pub async fn retry_compensation(&self, saga_id: SagaId) -> Result<SagaRecord> {
        self.compensation.retry_compensation(saga_id).await
    }

    pub async fn get_saga(&self, saga_id: SagaId) -> Result<SagaRecord> {
        self.store
            .find_by_id(saga_id)
            .await?
            .ok_or_else(|| SagaError::not_found("id", saga_id.to_string()))
    }

    pub async fn get_saga_by_booking_id(&self, booking_id: &str) -> Result<SagaRecord> {
        self.store
            .find_by_booking_id(booking_id)
            .await?
            .ok_or_else(|| SagaError::not_found("booking", booking_id))
    }

    pub async fn get_saga_by_appointment_id(&self, appointment_id: &str) -> Result<SagaRecord> {
        self.store
            .find_by_appointment_id(appointment_id)
            .await?
            .ok_or_else(|| SagaError::not_found("appointment", appointment_id))
    }

    pub async fn get_sagas_by_status(&self, status: SagaStatus) -> Result<Vec<SagaRecord>> {
        Ok(self.store.find_by_status(status).await?)
    }

    pub async fn get_all_sagas(&self) -> Result<Vec<SagaRecord>> {
        Ok(self.store.find_all().await?)
    }

    /// Failed or retrying sagas that still have retries left.
    pub async fn get_retryable_sagas(&self) -> Result<Vec<SagaRecord>> {
        Ok(self.store.find_retryable().await?)
    }
}

fn attach_booking(saga: &mut SagaRecord, booking: &Booking) {
    saga.booking_id = Some(booking.booking_id.clone());
    saga.property_id = booking.property_id;
    saga.requester_id = booking.requester_id;
    saga.provider_id = booking.provider_id;
    saga.put_data(KEY_BOOKING_ID, SagaPayload::Text(booking.booking_id.clone()));
}

fn payment_completed_event(saga: &SagaRecord, transaction_id: &str) -> BookingEvent {
    let mut event = BookingEvent::new(BookingEventType::BookingPaymentCompleted);
    event.booking_id = saga.booking_id.clone();
    event.appointment_id = Some(saga.appointment_id.clone());
    event.property_id = saga.property_id;
    event.requester_id = saga.requester_id;
    event.provider_id = saga.provider_id;
    event.transaction_id = Some(transaction_id.to_string());
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use messaging::InMemoryBroker;
    use saga_store::InMemorySagaStore;

    use crate::services::InMemoryBookingService;

    fn orchestrator() -> (
        SagaOrchestrator<InMemorySagaStore, InMemoryBookingService>,
        InMemoryBookingService,
    ) {
        let bookings = InMemoryBookingService::new();
        let producer = BookingEventProducer::new(Arc::new(InMemoryBroker::new()));
        (
            SagaOrchestrator::new(InMemorySagaStore::new(), bookings.clone(), producer),
            bookings,
        )
    }

    fn request(appointment_id: &str) -> BookingRequest {
        let move_in = Utc::now() + Duration::days(7);
        BookingRequest::new(appointment_id, move_in, move_in + Duration::days(365), 12)
    }

    #[tokio::test]
    async fn test_start_creates_processing_saga() {
        let (orchestrator, _) = orchestrator();
        let saga = orchestrator
            .start_booking_saga("APT-1", request("APT-1"))
            .await
            .unwrap();

        assert_eq!(saga.status, SagaStatus::Processing);
        assert_eq!(saga.current_step, SagaStep::BookingCreated);
        assert!(saga.is_step_completed(SagaStep::AppointmentConfirmed));
        assert!(saga.is_step_completed(SagaStep::BookingCreated));
        assert!(saga.saga_data.booking_request().is_some());
        assert_eq!(saga.saga_data.text(KEY_APPOINTMENT_ID), Some("APT-1"));
        assert_eq!(saga.max_retries, 3);
        assert!(saga.booking_id.is_none());
    }

    #[tokio::test]
    async fn test_start_rejects_blank_appointment() {
        let (orchestrator, _) = orchestrator();
        let result = orchestrator.start_booking_saga("  ", request("APT-1")).await;
        assert!(matches!(result, Err(SagaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_start_survives_lookup_failure() {
        let (orchestrator, bookings) = orchestrator();
        bookings.set_fail_on_lookup(true);

        let saga = orchestrator
            .start_booking_saga("APT-1", request("APT-1"))
            .await
            .unwrap();
        assert_eq!(saga.status, SagaStatus::Processing);
        assert!(saga.booking_id.is_none());
    }

    #[tokio::test]
    async fn test_execute_step_creates_booking_once() {
        let (orchestrator, bookings) = orchestrator();
        let saga = orchestrator
            .start_booking_saga("APT-1", request("APT-1"))
            .await
            .unwrap();

        let saga = orchestrator
            .execute_create_booking_step(saga, &request("APT-1"))
            .await
            .unwrap();
        assert_eq!(saga.booking_id.as_deref(), Some("BKG-0001"));
        assert_eq!(saga.saga_data.text(KEY_BOOKING_ID), Some("BKG-0001"));

        let saga = orchestrator
            .execute_create_booking_step(saga, &request("APT-1"))
            .await
            .unwrap();
        assert_eq!(saga.booking_id.as_deref(), Some("BKG-0001"));
        assert_eq!(bookings.create_count(), 1);
    }

    #[tokio::test]
    async fn test_execute_step_failure_moves_to_retrying() {
        let (orchestrator, bookings) = orchestrator();
        bookings.set_fail_on_create(true);
        let saga = orchestrator
            .start_booking_saga("APT-1", request("APT-1"))
            .await
            .unwrap();

        let saga = orchestrator
            .execute_create_booking_step(saga, &request("APT-1"))
            .await
            .unwrap();

        assert_eq!(saga.status, SagaStatus::Retrying);
        assert_eq!(saga.retry_count, 1);
        assert!(saga.failed_steps.contains(&SagaStep::BookingCreated));
        assert!(saga.compensation_required);
        assert!(saga.error_message.is_some());
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_recovery() {
        let (orchestrator, bookings) = orchestrator();
        bookings.set_fail_on_create(true);
        let saga = orchestrator
            .start_booking_saga("APT-1", request("APT-1"))
            .await
            .unwrap();
        let saga = orchestrator
            .execute_create_booking_step(saga, &request("APT-1"))
            .await
            .unwrap();
        assert_eq!(saga.status, SagaStatus::Retrying);

        bookings.set_fail_on_create(false);
        let saga = orchestrator.retry_saga(saga.id).await.unwrap();

        assert_eq!(saga.status, SagaStatus::Processing);
        assert_eq!(saga.booking_id.as_deref(), Some("BKG-0001"));
        assert!(saga.error_message.is_none());
        assert_eq!(saga.retry_count, 1);
    }

    #[tokio::test]
    async fn test_retry_without_request_is_validation_error() {
        let (orchestrator, _) = orchestrator();
        let mut saga = SagaRecord::new_booking_saga("APT-1", 3);
        saga.current_step = SagaStep::BookingCreated;
        saga.status = SagaStatus::Retrying;
        let saga = orchestrator.store.save(saga).await.unwrap();

        let result = orchestrator.retry_saga(saga.id).await;
        assert!(matches!(result, Err(SagaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_retry_unknown_saga() {
        let (orchestrator, _) = orchestrator();
        let result = orchestrator.retry_saga(SagaId::new()).await;
        assert!(matches!(result, Err(SagaError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancel_compensates() {
        let (orchestrator, _) = orchestrator();
        let saga = orchestrator
            .start_booking_saga("APT-1", request("APT-1"))
            .await
            .unwrap();

        let saga = orchestrator
            .cancel_saga(saga.id, "changed plans")
            .await
            .unwrap();

        assert_eq!(saga.status, SagaStatus::Compensated);
        assert_eq!(saga.error_message.as_deref(), Some("Cancelled: changed plans"));
        assert!(saga.compensation_required);
    }

    #[tokio::test]
    async fn test_lookups_miss_with_not_found() {
        let (orchestrator, _) = orchestrator();
        assert!(matches!(
            orchestrator.get_saga_by_booking_id("nope").await,
            Err(SagaError::NotFound { .. })
        ));
        assert!(matches!(
            orchestrator.get_saga_by_appointment_id("nope").await,
            Err(SagaError::NotFound { .. })
        ));
        assert!(
            orchestrator
                .get_sagas_by_status(SagaStatus::Failed)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
