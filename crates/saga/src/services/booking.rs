//! Booking service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use domain::{Booking, BookingEvent, BookingEventType, BookingRequest, BookingStatus};
use messaging::BookingEventProducer;
use parking_lot::RwLock;

use crate::error::SagaError;

/// Booking operations the saga depends on.
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Creates a booking for an appointment.
    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, SagaError>;

    /// Returns all bookings made for an appointment, oldest first.
    async fn get_bookings_by_appointment_id(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<Booking>, SagaError>;

    /// Cancels a booking, recording the reason.
    async fn cancel_booking(&self, booking_id: &str, reason: &str) -> Result<Booking, SagaError>;
}

#[derive(Default)]
struct InMemoryBookingState {
    bookings: HashMap<String, Booking>,
    order: Vec<String>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_cancel: bool,
    fail_on_lookup: bool,
    create_calls: usize,
    cancel_calls: usize,
}

/// In-memory booking service for testing and local runs.
#[derive(Clone, Default)]
pub struct InMemoryBookingService {
    state: Arc<RwLock<InMemoryBookingState>>,
    producer: Option<BookingEventProducer>,
}

impl InMemoryBookingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes booking lifecycle events through `producer`.
    pub fn with_producer(mut self, producer: BookingEventProducer) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Stores a booking as if it had been created earlier.
    pub fn seed(&self, booking: Booking) {
        let mut state = self.state.write();
        state.order.push(booking.booking_id.clone());
        state.bookings.insert(booking.booking_id.clone(), booking);
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().fail_on_create = fail;
    }

    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().fail_on_cancel = fail;
    }

    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.state.write().fail_on_lookup = fail;
    }

    /// Number of `create_booking` invocations, failed ones included.
    pub fn create_count(&self) -> usize {
        self.state.read().create_calls
    }

    /// Number of `cancel_booking` invocations, failed ones included.
    pub fn cancel_count(&self) -> usize {
        self.state.read().cancel_calls
    }

    pub fn booking_count(&self) -> usize {
        self.state.read().bookings.len()
    }

    pub fn get(&self, booking_id: &str) -> Option<Booking> {
        self.state.read().bookings.get(booking_id).cloned()
    }

    async fn publish(&self, event_type: BookingEventType, booking: &Booking) {
        if let Some(producer) = &self.producer {
            producer
                .publish_booking_event(BookingEvent::from_booking(event_type, booking))
                .await;
        }
    }
}

#[async_trait]
impl BookingService for InMemoryBookingService {
    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, SagaError> {
        request.validate()?;

        let booking = {
            let mut state = self.state.write();
            state.create_calls += 1;
            if state.fail_on_create {
                return Err(SagaError::BookingService(
                    "Booking service unavailable".to_string(),
                ));
            }
            if state
                .bookings
                .values()
                .any(|b| b.appointment_id == request.appointment_id)
            {
                return Err(SagaError::Conflict(format!(
                    "Booking already exists for appointment: {}",
                    request.appointment_id
                )));
            }
            state.next_id += 1;
            let booking = Booking::from_request(format!("BKG-{:04}", state.next_id), request);
            state.order.push(booking.booking_id.clone());
            state
                .bookings
                .insert(booking.booking_id.clone(), booking.clone());
            booking
        };

        self.publish(BookingEventType::BookingCreated, &booking).await;
        Ok(booking)
    }

    async fn get_bookings_by_appointment_id(
        &self,
        appointment_id: &str,
    ) -> Result<Vec<Booking>, SagaError> {
        let state = self.state.read();
        if state.fail_on_lookup {
            return Err(SagaError::BookingService(
                "Booking lookup unavailable".to_string(),
            ));
        }
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.bookings.get(id))
            .filter(|b| b.appointment_id == appointment_id)
            .cloned()
            .collect())
    }

    async fn cancel_booking(&self, booking_id: &str, reason: &str) -> Result<Booking, SagaError> {
        let booking = {
            let mut state = self.state.write();
            state.cancel_calls += 1;
            if state.fail_on_cancel {
                return Err(SagaError::BookingService(
                    "Booking cancellation failed".to_string(),
                ));
            }
            let booking = state.bookings.get_mut(booking_id).ok_or_else(|| {
                SagaError::BookingService(format!("Booking not found: {booking_id}"))
            })?;
            if booking.is_cancelled() {
                return Ok(booking.clone());
            }
            booking.status = BookingStatus::Cancelled;
            booking.cancellation_reason = Some(reason.to_string());
            booking.cancelled_at = Some(Utc::now());
            booking.clone()
        };

        self.publish(BookingEventType::BookingCancelled, &booking).await;
        Ok(booking)
    }
}
