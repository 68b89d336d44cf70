//! Shared application state.

use std::sync::Arc;

use gateway::{AppointmentGateway, InMemoryAppointmentClient};
use messaging::{BookingEventProducer, InMemoryBroker};
use saga::{InMemoryBookingService, SagaAppointmentHandler, SagaOrchestrator};
use saga_store::SagaStore;

use crate::config::Config;

pub type Orchestrator<S> = SagaOrchestrator<S, InMemoryBookingService>;
pub type AppointmentHandler<S> = SagaAppointmentHandler<S, InMemoryBookingService>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: SagaStore> {
    pub orchestrator: Arc<Orchestrator<S>>,
    pub appointment_handler: Arc<AppointmentHandler<S>>,
    pub gateway: AppointmentGateway,
    pub bookings: InMemoryBookingService,
    pub appointments: InMemoryAppointmentClient,
    pub broker: Arc<InMemoryBroker>,
}

/// Wires the orchestrator, collaborators and gateway around `store`.
///
/// The booking collaborator, appointment client and message broker are the
/// in-process implementations.
pub fn create_default_state<S: SagaStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    let broker = Arc::new(InMemoryBroker::new());
    let producer = BookingEventProducer::new(broker.clone());
    let bookings = InMemoryBookingService::new().with_producer(producer.clone());

    let orchestrator = Arc::new(SagaOrchestrator::with_config(
        store,
        bookings.clone(),
        producer,
        config.saga,
    ));
    let appointment_handler = Arc::new(SagaAppointmentHandler::new(orchestrator.clone()));

    let appointments = InMemoryAppointmentClient::new();
    let gateway = AppointmentGateway::with_config(
        Arc::new(appointments.clone()),
        config.circuit_breaker.clone(),
        config.retry,
    );

    Arc::new(AppState {
        orchestrator,
        appointment_handler,
        gateway,
        bookings,
        appointments,
        broker,
    })
}
