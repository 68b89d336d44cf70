use std::sync::Arc;
use std::time::Duration;

use domain::{AppointmentResponse, AppointmentSnapshot, AppointmentStatus};

use crate::{
    AppointmentClient, CircuitBreaker, CircuitBreakerConfig, GatewayError, Result, RetryPolicy,
};

/// Breaker name used for the appointment service.
pub const APPOINTMENT_SERVICE: &str = "appointmentService";

pub const FALLBACK_TITLE: &str = "Appointment Temporarily Unavailable";
pub const FALLBACK_MESSAGE: &str =
    "Appointment Service temporarily unavailable. Using fallback data.";

/// Builds the placeholder answer returned when the appointment service
/// cannot be used.
pub fn fallback_response(appointment_id: &str) -> AppointmentResponse {
    AppointmentResponse {
        success: false,
        message: FALLBACK_MESSAGE.to_string(),
        appointment: AppointmentSnapshot {
            appointment_title: Some(FALLBACK_TITLE.to_string()),
            ..AppointmentSnapshot::new(appointment_id, AppointmentStatus::Pending)
        },
    }
}

/// Fault-tolerant appointment lookup.
///
/// Each attempt passes the circuit breaker and is bounded by a timeout; the
/// retry policy wraps the attempts. Lookups never fail: any error becomes
/// [`fallback_response`].
#[derive(Clone)]
pub struct AppointmentGateway {
    client: Arc<dyn AppointmentClient>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl AppointmentGateway {
    pub fn new(client: Arc<dyn AppointmentClient>) -> Self {
        Self::with_config(client, CircuitBreakerConfig::default(), RetryPolicy::default())
    }

    pub fn with_config(
        client: Arc<dyn AppointmentClient>,
        breaker_config: CircuitBreakerConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            breaker: Arc::new(CircuitBreaker::with_config(
                APPOINTMENT_SERVICE,
                breaker_config,
            )),
            retry,
            call_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Looks up an appointment, falling back to placeholder data on failure.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_appointment(&self, appointment_id: &str) -> AppointmentResponse {
        match self.try_fetch(appointment_id).await {
            Ok(response) => response,
            Err(err) => {
                let reason = match &err {
                    GatewayError::CallNotPermitted(_) => "call_not_permitted",
                    GatewayError::NotFound(_) => "not_found",
                    GatewayError::Timeout(_) => "timeout",
                    GatewayError::Unavailable(_) => "unavailable",
                };
                metrics::counter!("gateway_fallbacks_total", "reason" => reason).increment(1);
                tracing::warn!(appointment_id, error = %err, "using fallback appointment data");
                fallback_response(appointment_id)
            }
        }
    }

    async fn try_fetch(&self, appointment_id: &str) -> Result<AppointmentResponse> {
        self.retry
            .run(|_attempt| {
                self.breaker
                    .execute(|| self.call_with_timeout(appointment_id))
            })
            .await
    }

    async fn call_with_timeout(&self, appointment_id: &str) -> Result<AppointmentResponse> {
        match tokio::time::timeout(
            self.call_timeout,
            self.client.get_appointment_by_id(appointment_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }
}
