//! Best-effort publisher of booking events.

use std::sync::Arc;

use chrono::Utc;
use common::EventId;
use domain::{BookingEvent, BookingEventType};

use crate::{BOOKING_QUEUE, EventPublisher, Result};

/// Publishes booking events without ever failing the caller.
///
/// Delivery is at-most-once: a transport failure is logged and the event is
/// dropped. A transactional outbox is the way to upgrade this to
/// at-least-once.
#[derive(Clone)]
pub struct BookingEventProducer {
    publisher: Arc<dyn EventPublisher>,
    queue: String,
}

impl BookingEventProducer {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self::with_queue(publisher, BOOKING_QUEUE)
    }

    pub fn with_queue(publisher: Arc<dyn EventPublisher>, queue: impl Into<String>) -> Self {
        Self {
            publisher,
            queue: queue.into(),
        }
    }

    /// Stamps and publishes an event. Returns whether the transport accepted it.
    #[tracing::instrument(
        skip(self, event),
        fields(event_type = %event.event_type, booking_id = ?event.booking_id)
    )]
    pub async fn publish_booking_event(&self, mut event: BookingEvent) -> bool {
        if event.event_id.is_none() {
            event.event_id = Some(EventId::new());
        }
        if event.event_timestamp.is_none() {
            event.event_timestamp = Some(Utc::now());
        }

        match self.send(&event).await {
            Ok(()) => {
                metrics::counter!("booking_events_published_total", "type" => event.event_type.as_str())
                    .increment(1);
                tracing::info!("published booking event");
                true
            }
            Err(err) => {
                metrics::counter!("booking_events_publish_failed_total", "type" => event.event_type.as_str())
                    .increment(1);
                tracing::error!(error = %err, "failed to publish booking event");
                false
            }
        }
    }

    async fn send(&self, event: &BookingEvent) -> Result<()> {
        let body = serde_json::to_string(event)?;
        self.publisher.publish(&self.queue, body).await
    }

    async fn publish_as(&self, event_type: BookingEventType, mut event: BookingEvent) -> bool {
        event.event_type = event_type;
        self.publish_booking_event(event).await
    }

    pub async fn publish_booking_created(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingCreated, event).await
    }

    pub async fn publish_booking_confirmed(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingConfirmed, event).await
    }

    pub async fn publish_booking_cancelled(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingCancelled, event).await
    }

    pub async fn publish_booking_completed(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingCompleted, event).await
    }

    pub async fn publish_booking_expired(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingExpired, event).await
    }

    pub async fn publish_booking_payment_completed(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingPaymentCompleted, event)
            .await
    }

    pub async fn publish_booking_cancelled_compensation(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::BookingCancelledCompensation, event)
            .await
    }

    pub async fn publish_payment_refunded_compensation(&self, event: BookingEvent) -> bool {
        self.publish_as(BookingEventType::PaymentRefundedCompensation, event)
            .await
    }
}
