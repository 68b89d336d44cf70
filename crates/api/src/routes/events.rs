//! Inbound appointment events posted over HTTP.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::AppointmentEvent;
use messaging::{APPOINTMENT_QUEUE, EventPublisher};
use saga_store::SagaStore;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /events/appointments: enqueues an appointment event for the
/// background consumer.
#[tracing::instrument(skip(state, event), fields(appointment_id = %event.appointment_id))]
pub async fn publish_appointment_event<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(event): Json<AppointmentEvent>,
) -> Result<StatusCode, ApiError> {
    let body = serde_json::to_string(&event)
        .map_err(|e| ApiError::BadRequest(format!("Invalid appointment event: {e}")))?;
    state
        .broker
        .publish(APPOINTMENT_QUEUE, body)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
