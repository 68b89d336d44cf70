//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use gateway::CircuitState;
use saga_store::SagaStore;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the appointment breaker is open.
    pub status: &'static str,
    pub appointment_service: &'static str,
}

/// GET /health: liveness plus the appointment dependency's breaker state.
pub async fn check<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let breaker = state.gateway.circuit_breaker().state();
    Json(HealthResponse {
        status: if breaker == CircuitState::Open {
            "degraded"
        } else {
            "ok"
        },
        appointment_service: breaker.as_str(),
    })
}
