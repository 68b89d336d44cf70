//! Rollback of completed saga steps.

use chrono::Utc;
use common::SagaId;
use domain::{BookingEvent, BookingEventType, SagaRecord, SagaStatus, SagaStep};
use messaging::BookingEventProducer;
use saga_store::SagaStore;

use crate::error::{Result, SagaError};
use crate::services::BookingService;

/// Reverses the completed steps of a saga.
///
/// Steps are undone in reverse completion order. Each compensation emits an
/// event so downstream consumers can react. Any failure leaves the saga in
/// `COMPENSATION_FAILED`, from which [`retry_compensation`] can start over.
///
/// [`retry_compensation`]: CompensationService::retry_compensation
pub struct CompensationService<S, B>
where
    S: SagaStore,
    B: BookingService,
{
    store: S,
    booking_service: B,
    producer: BookingEventProducer,
}

impl<S, B> CompensationService<S, B>
where
    S: SagaStore,
    B: BookingService,
{
    pub fn new(store: S, booking_service: B, producer: BookingEventProducer) -> Self {
        Self {
            store,
            booking_service,
            producer,
        }
    }

    /// Runs every compensation the saga needs and records the outcome.
    ///
    /// Only store failures are returned as errors. A failed compensating
    /// action is recorded on the saga, which is returned as
    /// `COMPENSATION_FAILED`.
    #[tracing::instrument(skip(self, saga), fields(saga_id = %saga.id))]
    pub async fn compensate(&self, mut saga: SagaRecord) -> Result<SagaRecord> {
        tracing::info!(
            appointment_id = %saga.appointment_id,
            status = %saga.status,
            "starting compensation"
        );

        saga.status = SagaStatus::Compensating;
        saga.compensation_started_at = Some(Utc::now());
        saga.touch();
        let mut saga = self.store.save(saga).await?;

        match self.run_compensations(&saga).await {
            Ok(()) => {
                saga.status = SagaStatus::Compensated;
                metrics::counter!("saga_compensated_total").increment(1);
                tracing::info!(saga_id = %saga.id, "compensation completed");
            }
            Err(e) => {
                saga.status = SagaStatus::CompensationFailed;
                saga.error_message = Some(e.to_string());
                metrics::counter!("saga_compensation_failed_total").increment(1);
                tracing::error!(saga_id = %saga.id, error = %e, "compensation failed");
            }
        }
        saga.compensation_completed_at = Some(Utc::now());
        saga.touch();

        Ok(self.store.save(saga).await?)
    }

    /// Re-runs compensation for a saga stuck in `COMPENSATION_FAILED`.
    ///
    /// Sagas in any other status are returned unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn retry_compensation(&self, saga_id: SagaId) -> Result<SagaRecord> {
        let saga = self
            .store
            .find_by_id(saga_id)
            .await?
            .ok_or_else(|| SagaError::not_found("id", saga_id.to_string()))?;

        if saga.status != SagaStatus::CompensationFailed {
            tracing::info!(
                %saga_id,
                status = %saga.status,
                "compensation retry skipped, saga is not in COMPENSATION_FAILED"
            );
            return Ok(saga);
        }

        self.compensate(saga).await
    }

    async fn run_compensations(&self, saga: &SagaRecord) -> Result<()> {
        for step in saga.completed_steps_reversed() {
            match step {
                SagaStep::PaymentCompleted => self.compensate_payment(saga).await,
                SagaStep::BookingCreated => self.compensate_booking_creation(saga).await?,
                _ => {}
            }
        }
        Ok(())
    }

    async fn compensate_booking_creation(&self, saga: &SagaRecord) -> Result<()> {
        let Some(booking_id) = saga.booking_id.as_deref() else {
            tracing::debug!(saga_id = %saga.id, "no booking attached, nothing to cancel");
            return Ok(());
        };

        let reason = format!(
            "Booking cancelled due to saga failure: {}",
            saga.error_message.as_deref().unwrap_or_default()
        );
        self.booking_service
            .cancel_booking(booking_id, &reason)
            .await
            .map_err(|e| SagaError::Compensation(format!("cancel booking {booking_id}: {e}")))?;

        self.producer
            .publish_booking_cancelled_compensation(
                self.compensation_event(BookingEventType::BookingCancelledCompensation, saga),
            )
            .await;

        tracing::info!(saga_id = %saga.id, booking_id, "booking creation compensated");
        Ok(())
    }

    async fn compensate_payment(&self, saga: &SagaRecord) {
        let (Some(booking_id), Some(transaction_id)) = (
            saga.booking_id.as_deref(),
            saga.saga_data.transaction_id(),
        ) else {
            return;
        };

        self.producer
            .publish_payment_refunded_compensation(
                self.compensation_event(BookingEventType::PaymentRefundedCompensation, saga),
            )
            .await;

        tracing::info!(saga_id = %saga.id, booking_id, transaction_id, "payment refund requested");
    }

    fn compensation_event(&self, event_type: BookingEventType, saga: &SagaRecord) -> BookingEvent {
        let mut event = BookingEvent::new(event_type);
        event.booking_id = saga.booking_id.clone();
        event.appointment_id = Some(saga.appointment_id.clone());
        event.property_id = saga.property_id;
        event.requester_id = saga.requester_id;
        event.provider_id = saga.provider_id;
        event.cancellation_reason = saga.error_message.clone();
        event.transaction_id = saga.saga_data.transaction_id().map(str::to_string);
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use domain::{Booking, BookingRequest};
    use messaging::{BOOKING_QUEUE, InMemoryBroker};
    use saga_store::InMemorySagaStore;

    use crate::services::InMemoryBookingService;

    fn setup() -> (
        CompensationService<InMemorySagaStore, InMemoryBookingService>,
        InMemorySagaStore,
        InMemoryBookingService,
        Arc<InMemoryBroker>,
    ) {
        let store = InMemorySagaStore::new();
        let bookings = InMemoryBookingService::new();
        let broker = Arc::new(InMemoryBroker::new());
        let service = CompensationService::new(
            store.clone(),
            bookings.clone(),
            BookingEventProducer::new(broker.clone()),
        );
        (service, store, bookings, broker)
    }

    fn seed_booking(bookings: &InMemoryBookingService, booking_id: &str, appointment_id: &str) {
        let now = Utc::now();
        let request = BookingRequest::new(appointment_id, now, now + Duration::days(30), 1);
        bookings.seed(Booking::from_request(booking_id, &request));
    }

    async fn failed_saga(store: &InMemorySagaStore, booking_id: Option<&str>) -> SagaRecord {
        let mut saga = SagaRecord::new_booking_saga("APT-1", 3);
        saga.mark_step_completed(SagaStep::BookingCreated);
        saga.booking_id = booking_id.map(str::to_string);
        saga.status = SagaStatus::Failed;
        saga.error_message = Some("boom".to_string());
        saga.compensation_required = true;
        store.save(saga).await.unwrap()
    }

    #[tokio::test]
    async fn test_compensate_cancels_booking_and_publishes() {
        let (service, store, bookings, broker) = setup();
        seed_booking(&bookings, "B1", "APT-1");
        let saga = failed_saga(&store, Some("B1")).await;

        let saga = service.compensate(saga).await.unwrap();

        assert_eq!(saga.status, SagaStatus::Compensated);
        assert!(saga.compensation_started_at.is_some());
        assert!(saga.compensation_completed_at.is_some());
        assert_eq!(bookings.cancel_count(), 1);

        let cancelled = bookings.get("B1").unwrap();
        assert_eq!(
            cancelled.cancellation_reason.as_deref(),
            Some("Booking cancelled due to saga failure: boom")
        );

        let events = broker.history_json(BOOKING_QUEUE).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["eventType"], "BOOKING_CANCELLED_COMPENSATION");
        assert_eq!(events[0]["bookingId"], "B1");
        assert_eq!(events[0]["cancellationReason"], "boom");
    }

    #[tokio::test]
    async fn test_compensate_without_booking_is_noop() {
        let (service, store, bookings, broker) = setup();
        let saga = failed_saga(&store, None).await;

        let saga = service.compensate(saga).await.unwrap();

        assert_eq!(saga.status, SagaStatus::Compensated);
        assert_eq!(bookings.cancel_count(), 0);
        assert_eq!(broker.published_count(BOOKING_QUEUE), 0);
    }

    #[tokio::test]
    async fn test_compensation_failure_is_recorded() {
        let (service, store, bookings, broker) = setup();
        seed_booking(&bookings, "B1", "APT-1");
        bookings.set_fail_on_cancel(true);
        let saga = failed_saga(&store, Some("B1")).await;

        let saga = service.compensate(saga).await.unwrap();

        assert_eq!(saga.status, SagaStatus::CompensationFailed);
        assert!(
            saga.error_message
                .as_deref()
                .unwrap()
                .starts_with("Compensation failed: cancel booking B1: ")
        );
        assert!(saga.compensation_completed_at.is_some());
        assert_eq!(broker.published_count(BOOKING_QUEUE), 0);

        let stored = store.find_by_id(saga.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SagaStatus::CompensationFailed);
    }

    #[tokio::test]
    async fn test_retry_compensation_recovers() {
        let (service, store, bookings, _broker) = setup();
        seed_booking(&bookings, "B1", "APT-1");
        bookings.set_fail_on_cancel(true);
        let saga = failed_saga(&store, Some("B1")).await;
        let saga = service.compensate(saga).await.unwrap();
        assert_eq!(saga.status, SagaStatus::CompensationFailed);

        bookings.set_fail_on_cancel(false);
        let saga = service.retry_compensation(saga.id).await.unwrap();

        assert_eq!(saga.status, SagaStatus::Compensated);
        assert_eq!(bookings.cancel_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_compensation_ignores_other_statuses() {
        let (service, store, bookings, _broker) = setup();
        let saga = failed_saga(&store, Some("B1")).await;

        let unchanged = service.retry_compensation(saga.id).await.unwrap();

        assert_eq!(unchanged.status, SagaStatus::Failed);
        assert_eq!(unchanged.version, saga.version);
        assert_eq!(bookings.cancel_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_compensation_unknown_saga() {
        let (service, _store, _bookings, _broker) = setup();
        let result = service.retry_compensation(SagaId::new()).await;
        assert!(matches!(result, Err(SagaError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_payment_refund_event() {
        let (service, store, bookings, broker) = setup();
        seed_booking(&bookings, "B1", "APT-1");
        let mut saga = failed_saga(&store, Some("B1")).await;
        saga.mark_step_completed(SagaStep::PaymentCompleted);
        saga.put_data(
            domain::saga::data::KEY_TRANSACTION_ID,
            domain::SagaPayload::Text("TXN1".to_string()),
        );

        service.compensate(saga).await.unwrap();

        let events = broker.history_json(BOOKING_QUEUE).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["eventType"], "PAYMENT_REFUNDED_COMPENSATION");
        assert_eq!(events[0]["transactionId"], "TXN1");
        assert_eq!(events[1]["eventType"], "BOOKING_CANCELLED_COMPENSATION");
    }
}
