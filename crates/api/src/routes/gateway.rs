//! Appointment lookup and circuit breaker endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::AppointmentResponse;
use gateway::CircuitBreakerMetrics;
use saga_store::SagaStore;

use crate::state::AppState;

/// GET /appointments/{id}: live data, or the fallback when the
/// appointment service is unusable.
pub async fn get_appointment<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(appointment_id): Path<String>,
) -> Json<AppointmentResponse> {
    Json(state.gateway.fetch_appointment(&appointment_id).await)
}

/// GET /circuit-breakers/appointment
pub async fn circuit_breaker<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<CircuitBreakerMetrics> {
    Json(state.gateway.circuit_breaker().metrics())
}

/// POST /circuit-breakers/appointment/reset
#[tracing::instrument(skip(state))]
pub async fn reset_circuit_breaker<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<CircuitBreakerMetrics> {
    let breaker = state.gateway.circuit_breaker();
    breaker.reset();
    tracing::info!(breaker = breaker.name(), "circuit breaker reset by operator");
    Json(breaker.metrics())
}
