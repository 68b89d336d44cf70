//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the series this service emits.
pub fn describe() {
    describe_counter!("saga_started_total", "Booking sagas started");
    describe_counter!("saga_completed_total", "Booking sagas completed");
    describe_counter!("saga_failed_total", "Saga step failures recorded");
    describe_counter!("saga_retries_total", "Saga step retries attempted");
    describe_counter!("saga_cancelled_total", "Sagas cancelled");
    describe_counter!("saga_compensated_total", "Compensations that succeeded");
    describe_counter!(
        "saga_compensation_failed_total",
        "Compensations that ended in COMPENSATION_FAILED"
    );
    describe_histogram!(
        "saga_duration_seconds",
        Unit::Seconds,
        "Time from saga start to completion"
    );
    describe_counter!(
        "circuit_breaker_transitions_total",
        "Circuit breaker state transitions"
    );
    describe_counter!(
        "circuit_breaker_calls_not_permitted_total",
        "Calls refused by an open circuit breaker"
    );
    describe_counter!(
        "gateway_fallbacks_total",
        "Appointment lookups answered with fallback data"
    );
    describe_counter!("booking_events_published_total", "Booking events published");
    describe_counter!(
        "booking_events_publish_failed_total",
        "Booking events dropped after a transport failure"
    );
    describe_counter!(
        "appointment_events_consumed_total",
        "Appointment messages consumed, by outcome"
    );
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
