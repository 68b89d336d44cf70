//! Operator HTTP API for the booking saga engine.
//!
//! Exposes saga queries and commands, the appointment lookup with its
//! circuit breaker, structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga_store::SagaStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: SagaStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/sagas", get(routes::sagas::list::<S>))
        .route("/sagas/retryable", get(routes::sagas::retryable::<S>))
        .route("/sagas/{id}", get(routes::sagas::get::<S>))
        .route(
            "/sagas/by-booking/{booking_id}",
            get(routes::sagas::by_booking::<S>),
        )
        .route(
            "/sagas/by-appointment/{appointment_id}",
            get(routes::sagas::by_appointment::<S>),
        )
        .route("/sagas/{id}/retry", post(routes::sagas::retry::<S>))
        .route("/sagas/{id}/cancel", post(routes::sagas::cancel::<S>))
        .route(
            "/sagas/{id}/compensation/retry",
            post(routes::sagas::retry_compensation::<S>),
        )
        .route(
            "/bookings/{booking_id}/payment-completed",
            post(routes::bookings::payment_completed::<S>),
        )
        .route(
            "/appointments/{id}",
            get(routes::gateway::get_appointment::<S>),
        )
        .route(
            "/appointments/{id}/booking",
            post(routes::bookings::create_from_appointment::<S>),
        )
        .route(
            "/events/appointments",
            post(routes::events::publish_appointment_event::<S>),
        )
        .route(
            "/circuit-breakers/appointment",
            get(routes::gateway::circuit_breaker::<S>),
        )
        .route(
            "/circuit-breakers/appointment/reset",
            post(routes::gateway::reset_circuit_breaker::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
