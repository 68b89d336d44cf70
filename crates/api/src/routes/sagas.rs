//! Saga query and command endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::SagaId;
use domain::{SagaRecord, SagaStatus};
use saga_store::SagaStore;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_CANCEL_REASON: &str = "Cancelled by operator";

// -- Request types --

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaResponse {
    pub saga_id: String,
    pub saga_type: String,
    pub appointment_id: String,
    pub booking_id: Option<String>,
    pub status: SagaStatus,
    pub current_step: String,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub compensation_required: bool,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl From<SagaRecord> for SagaResponse {
    fn from(saga: SagaRecord) -> Self {
        Self {
            saga_id: saga.id.to_string(),
            saga_type: saga.saga_type,
            appointment_id: saga.appointment_id,
            booking_id: saga.booking_id,
            status: saga.status,
            current_step: saga.current_step.to_string(),
            completed_steps: saga.completed_steps.iter().map(|s| s.to_string()).collect(),
            failed_steps: saga.failed_steps.iter().map(|s| s.to_string()).collect(),
            error_message: saga.error_message,
            retry_count: saga.retry_count,
            max_retries: saga.max_retries,
            compensation_required: saga.compensation_required,
            started_at: saga.started_at,
            last_updated_at: saga.last_updated_at,
            completed_at: saga.completed_at,
            version: saga.version.as_i64(),
        }
    }
}

fn parse_saga_id(id: &str) -> Result<SagaId, ApiError> {
    SagaId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid saga id: {e}")))
}

fn to_responses(sagas: Vec<SagaRecord>) -> Json<Vec<SagaResponse>> {
    Json(sagas.into_iter().map(SagaResponse::from).collect())
}

// -- Handlers --

/// GET /sagas: all sagas, or those in `?status=`.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SagaResponse>>, ApiError> {
    let sagas = match query.status.as_deref() {
        Some(status) => {
            let status: SagaStatus = status
                .parse()
                .map_err(|e: domain::DomainError| ApiError::BadRequest(e.to_string()))?;
            state.orchestrator.get_sagas_by_status(status).await?
        }
        None => state.orchestrator.get_all_sagas().await?,
    };
    Ok(to_responses(sagas))
}

/// GET /sagas/retryable: failed or retrying sagas with retries left.
pub async fn retryable<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<SagaResponse>>, ApiError> {
    Ok(to_responses(state.orchestrator.get_retryable_sagas().await?))
}

/// GET /sagas/{id}
pub async fn get<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError> {
    let saga = state.orchestrator.get_saga(parse_saga_id(&id)?).await?;
    Ok(Json(saga.into()))
}

/// GET /sagas/by-booking/{booking_id}
pub async fn by_booking<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(booking_id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError> {
    let saga = state.orchestrator.get_saga_by_booking_id(&booking_id).await?;
    Ok(Json(saga.into()))
}

/// GET /sagas/by-appointment/{appointment_id}
pub async fn by_appointment<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError> {
    let saga = state
        .orchestrator
        .get_saga_by_appointment_id(&appointment_id)
        .await?;
    Ok(Json(saga.into()))
}

/// POST /sagas/{id}/retry: re-runs the current step if retries remain.
#[tracing::instrument(skip(state))]
pub async fn retry<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError> {
    let saga = state.orchestrator.retry_saga(parse_saga_id(&id)?).await?;
    Ok(Json(saga.into()))
}

/// POST /sagas/{id}/cancel: cancels and compensates a running saga.
#[tracing::instrument(skip(state, req))]
pub async fn cancel<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<SagaResponse>, ApiError> {
    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
    let saga = state
        .orchestrator
        .cancel_saga(parse_saga_id(&id)?, &reason)
        .await?;
    Ok(Json(saga.into()))
}

/// POST /sagas/{id}/compensation/retry
#[tracing::instrument(skip(state))]
pub async fn retry_compensation<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<SagaResponse>, ApiError> {
    let saga = state
        .orchestrator
        .retry_compensation(parse_saga_id(&id)?)
        .await?;
    Ok(Json(saga.into()))
}
