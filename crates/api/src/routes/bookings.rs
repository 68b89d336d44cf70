//! Booking triggers: saga start from an appointment and payment completion.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use domain::{AppointmentEvent, AppointmentEventType, AppointmentSnapshot, AppointmentStatus};
use saga::BookingOverrides;
use saga_store::SagaStore;
use serde::Deserialize;

use crate::error::ApiError;
use crate::routes::sagas::SagaResponse;
use crate::state::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateBookingRequest {
    pub move_in_date: Option<DateTime<Utc>>,
    pub move_out_date: Option<DateTime<Utc>>,
    pub booking_duration_months: Option<u32>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompletedRequest {
    pub transaction_id: String,
}

/// POST /appointments/{id}/booking: books a confirmed appointment and
/// starts its saga.
#[tracing::instrument(skip(state, req))]
pub async fn create_from_appointment<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(appointment_id): Path<String>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<SagaResponse>), ApiError> {
    let response = state.gateway.fetch_appointment(&appointment_id).await;
    if !response.success {
        return Err(ApiError::ServiceUnavailable(response.message));
    }
    let appointment = response.appointment;
    if appointment.status != AppointmentStatus::Confirmed {
        return Err(ApiError::Conflict(format!(
            "Appointment {} is {}, expected CONFIRMED",
            appointment_id, appointment.status
        )));
    }

    let overrides = BookingOverrides {
        move_in_date: req.move_in_date,
        move_out_date: req.move_out_date,
        booking_duration_months: req.booking_duration_months,
        notes: req.notes,
    };
    let saga = state
        .appointment_handler
        .create_booking_from_appointment(&confirmed_event(appointment), overrides)
        .await?;

    Ok((StatusCode::CREATED, Json(saga.into())))
}

/// POST /bookings/{id}/payment-completed: records the payment and
/// completes the saga.
#[tracing::instrument(skip(state, req))]
pub async fn payment_completed<S: SagaStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(booking_id): Path<String>,
    Json(req): Json<PaymentCompletedRequest>,
) -> Result<Json<SagaResponse>, ApiError> {
    if req.transaction_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "transactionId must not be empty".to_string(),
        ));
    }
    let saga = state
        .orchestrator
        .handle_payment_completed(&booking_id, &req.transaction_id)
        .await?;
    Ok(Json(saga.into()))
}

fn confirmed_event(appointment: AppointmentSnapshot) -> AppointmentEvent {
    let mut event =
        AppointmentEvent::new(AppointmentEventType::AppointmentConfirmed, appointment.appointment_id);
    event.event_timestamp = Some(Utc::now());
    event.appointment_date_time = appointment.appointment_date_time;
    event.property_id = appointment.property_id;
    event.property_title = appointment.property_title;
    event.requester_id = appointment.requester_id;
    event.provider_id = appointment.provider_id;
    event
}
