//! Appointment service client trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{AppointmentResponse, AppointmentSnapshot};
use parking_lot::RwLock;

use crate::{GatewayError, Result};

/// Remote lookup of a single appointment.
#[async_trait]
pub trait AppointmentClient: Send + Sync {
    async fn get_appointment_by_id(&self, appointment_id: &str) -> Result<AppointmentResponse>;
}

#[derive(Debug, Default)]
struct InMemoryAppointmentState {
    appointments: HashMap<String, AppointmentSnapshot>,
    fail_with: Option<GatewayError>,
    latency: Option<Duration>,
    calls: usize,
}

/// In-memory appointment client for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppointmentClient {
    state: Arc<RwLock<InMemoryAppointmentState>>,
}

impl InMemoryAppointmentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an appointment the client will return.
    pub fn insert(&self, appointment: AppointmentSnapshot) {
        self.state
            .write()
            .appointments
            .insert(appointment.appointment_id.clone(), appointment);
    }

    /// Makes every call fail with `Unavailable` until switched off.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().fail_with = unavailable
            .then(|| GatewayError::Unavailable("connection refused".to_string()));
    }

    /// Makes every call fail with the given error until cleared with `None`.
    pub fn set_fail_with(&self, error: Option<GatewayError>) {
        self.state.write().fail_with = error;
    }

    /// Delays each call, to simulate a slow dependency.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().latency = latency;
    }

    /// Returns how many calls reached the client.
    pub fn call_count(&self) -> usize {
        self.state.read().calls
    }
}

#[async_trait]
impl AppointmentClient for InMemoryAppointmentClient {
    async fn get_appointment_by_id(&self, appointment_id: &str) -> Result<AppointmentResponse> {
        let latency = {
            let mut state = self.state.write();
            state.calls += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state.read();
        if let Some(err) = &state.fail_with {
            return Err(err.clone());
        }
        state
            .appointments
            .get(appointment_id)
            .cloned()
            .map(AppointmentResponse::ok)
            .ok_or_else(|| GatewayError::NotFound(appointment_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::AppointmentStatus;

    #[tokio::test]
    async fn test_returns_registered_appointment() {
        let client = InMemoryAppointmentClient::new();
        client.insert(AppointmentSnapshot::new("APT-1", AppointmentStatus::Confirmed));

        let response = client.get_appointment_by_id("APT-1").await.unwrap();
        assert!(response.success);
        assert_eq!(response.appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_appointment() {
        let client = InMemoryAppointmentClient::new();
        let result = client.get_appointment_by_id("APT-404").await;
        assert_eq!(result, Err(GatewayError::NotFound("APT-404".into())));
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let client = InMemoryAppointmentClient::new();
        client.insert(AppointmentSnapshot::new("APT-1", AppointmentStatus::Pending));
        client.set_unavailable(true);
        assert!(matches!(
            client.get_appointment_by_id("APT-1").await,
            Err(GatewayError::Unavailable(_))
        ));

        client.set_unavailable(false);
        assert!(client.get_appointment_by_id("APT-1").await.is_ok());
    }
}
