//! End-to-end behaviour of the appointment gateway across an outage.

use std::sync::Arc;
use std::time::Duration;

use domain::{AppointmentSnapshot, AppointmentStatus};
use gateway::{
    AppointmentGateway, CircuitBreakerConfig, CircuitState, InMemoryAppointmentClient, RetryPolicy,
};

fn config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        sliding_window_size: 10,
        minimum_number_of_calls: 5,
        failure_rate_threshold: 50.0,
        wait_duration_in_open_state: Duration::from_millis(30),
        permitted_calls_in_half_open: 3,
    }
}

#[tokio::test]
async fn outage_then_recovery() {
    let client = InMemoryAppointmentClient::new();
    client.insert(AppointmentSnapshot::new("APT-1", AppointmentStatus::Confirmed));
    let gateway =
        AppointmentGateway::with_config(Arc::new(client.clone()), config(), RetryPolicy::none());

    client.set_unavailable(true);
    for _ in 0..5 {
        let response = gateway.fetch_appointment("APT-1").await;
        assert!(!response.success);
    }
    assert_eq!(gateway.circuit_breaker().state(), CircuitState::Open);

    // While open, lookups are answered without touching the client.
    client.set_unavailable(false);
    let calls = client.call_count();
    assert!(!gateway.fetch_appointment("APT-1").await.success);
    assert_eq!(client.call_count(), calls);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(gateway.circuit_breaker().state(), CircuitState::HalfOpen);

    for _ in 0..3 {
        assert!(gateway.fetch_appointment("APT-1").await.success);
    }
    assert_eq!(gateway.circuit_breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn failed_probe_reopens_circuit() {
    let client = InMemoryAppointmentClient::new();
    let gateway =
        AppointmentGateway::with_config(Arc::new(client.clone()), config(), RetryPolicy::none());

    gateway.circuit_breaker().force_open();
    tokio::time::sleep(Duration::from_millis(60)).await;

    client.set_unavailable(true);
    gateway.fetch_appointment("APT-1").await;
    assert_eq!(gateway.circuit_breaker().state(), CircuitState::Open);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn reset_closes_circuit() {
    let client = InMemoryAppointmentClient::new();
    client.insert(AppointmentSnapshot::new("APT-1", AppointmentStatus::Confirmed));
    let gateway =
        AppointmentGateway::with_config(Arc::new(client.clone()), config(), RetryPolicy::none());

    gateway.circuit_breaker().force_open();
    gateway.circuit_breaker().reset();

    assert!(gateway.fetch_appointment("APT-1").await.success);
    let metrics = gateway.circuit_breaker().metrics();
    assert_eq!(metrics.state, CircuitState::Closed);
    assert_eq!(metrics.successful_calls, 1);
}
