//! Count-based circuit breaker.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::{GatewayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes considered while CLOSED.
    pub sliding_window_size: usize,
    /// Outcomes required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,
    /// Failure percentage at or above which the circuit opens.
    pub failure_rate_threshold: f32,
    pub wait_duration_in_open_state: Duration,
    /// Probes admitted while HALF_OPEN; that many successes close the circuit.
    pub permitted_calls_in_half_open: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            failure_rate_threshold: 50.0,
            wait_duration_in_open_state: Duration::from_secs(10),
            permitted_calls_in_half_open: 3,
        }
    }
}

/// Point-in-time view of a breaker, for operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerMetrics {
    pub name: String,
    pub state: CircuitState,
    /// Failure percentage of the buffered calls, absent until the minimum
    /// number of calls has been recorded.
    pub failure_rate: Option<f32>,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    pub successful_calls: usize,
    pub not_permitted_calls: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Bumped on every transition so late outcomes from an earlier state are dropped.
    generation: u64,
    outcomes: VecDeque<Outcome>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
    not_permitted_calls: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            outcomes: VecDeque::new(),
            opened_at: None,
            half_open_in_flight: 0,
            half_open_successes: 0,
            not_permitted_calls: 0,
        }
    }

    fn failed_calls(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| **o == Outcome::Failure)
            .count()
    }

    fn failure_rate(&self, minimum_number_of_calls: usize) -> Option<f32> {
        let buffered = self.outcomes.len();
        if buffered == 0 || buffered < minimum_number_of_calls {
            return None;
        }
        Some(self.failed_calls() as f32 * 100.0 / buffered as f32)
    }
}

/// Protects a remote dependency from being called while it is unhealthy.
///
/// State and the outcome window live under a single lock, so each outcome
/// is evaluated against a consistent view. OPEN turns into HALF_OPEN on the
/// first access after the cooldown; there is no background timer.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Admission ticket for a single call.
///
/// Settle it with [`Permit::on_success`] or [`Permit::on_failure`]. A permit
/// dropped unsettled frees its HALF_OPEN slot without recording an outcome.
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    pub fn on_success(mut self) {
        self.settled = true;
        self.breaker.record(self.generation, Outcome::Success);
    }

    pub fn on_failure(mut self) {
        self.settled = true;
        self.breaker.record(self.generation, Outcome::Failure);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.generation);
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Asks for permission to make one call.
    pub fn try_acquire(&self) -> Result<Permit<'_>> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);

        let admitted = match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.permitted_calls_in_half_open {
                    inner.half_open_in_flight += 1;
                    true
                } else {
                    false
                }
            }
        };

        if !admitted {
            inner.not_permitted_calls += 1;
            metrics::counter!("circuit_breaker_calls_not_permitted_total", "name" => self.name.clone())
                .increment(1);
            warn!(circuit = %self.name, state = %inner.state, "call not permitted");
            return Err(GatewayError::CallNotPermitted(self.name.clone()));
        }

        Ok(Permit {
            breaker: self,
            generation: inner.generation,
            settled: false,
        })
    }

    /// Runs `call` if the circuit admits it, recording the outcome.
    ///
    /// `call` is never invoked when the circuit refuses the call. Errors that
    /// are not dependency failures (see [`GatewayError::is_dependency_failure`])
    /// are recorded as successes.
    pub async fn execute<F, Fut, T>(&self, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = self.try_acquire()?;
        match call().await {
            Ok(value) => {
                permit.on_success();
                Ok(value)
            }
            Err(err) => {
                if err.is_dependency_failure() {
                    error!(circuit = %self.name, error = %err, "call failed");
                    permit.on_failure();
                } else {
                    permit.on_success();
                }
                Err(err)
            }
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        let failed_calls = inner.failed_calls();
        CircuitBreakerMetrics {
            name: self.name.clone(),
            state: inner.state,
            failure_rate: inner.failure_rate(self.config.minimum_number_of_calls),
            buffered_calls: inner.outcomes.len(),
            failed_calls,
            successful_calls: inner.outcomes.len() - failed_calls,
            not_permitted_calls: inner.not_permitted_calls,
        }
    }

    /// Forces the circuit CLOSED and clears all recorded calls.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
        inner.outcomes.clear();
        inner.not_permitted_calls = 0;
        warn!(circuit = %self.name, "circuit breaker reset");
    }

    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Open);
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open
            && inner
                .opened_at
                .is_some_and(|at| at.elapsed() >= self.config.wait_duration_in_open_state)
        {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn record(&self, generation: u64, outcome: Outcome) {
        let mut inner = self.inner.lock();
        if generation != inner.generation {
            debug!(circuit = %self.name, ?outcome, "ignoring outcome from previous state");
            return;
        }

        inner.outcomes.push_back(outcome);
        while inner.outcomes.len() > self.config.sliding_window_size {
            inner.outcomes.pop_front();
        }

        match inner.state {
            CircuitState::Closed => {
                if let Some(rate) = inner.failure_rate(self.config.minimum_number_of_calls)
                    && rate >= self.config.failure_rate_threshold
                {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                match outcome {
                    Outcome::Failure => self.transition(&mut inner, CircuitState::Open),
                    Outcome::Success => {
                        inner.half_open_successes += 1;
                        if inner.half_open_successes >= self.config.permitted_calls_in_half_open {
                            self.transition(&mut inner, CircuitState::Closed);
                        }
                    }
                }
            }
            CircuitState::Open => {}
        }
    }

    fn release(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if generation == inner.generation && inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.outcomes.clear();
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        inner.opened_at = (to == CircuitState::Open).then(Instant::now);

        if from != to {
            metrics::counter!(
                "circuit_breaker_transitions_total",
                "name" => self.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            warn!(circuit = %self.name, %from, %to, "circuit breaker state transition");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            failure_rate_threshold: 50.0,
            wait_duration_in_open_state: Duration::from_millis(20),
            permitted_calls_in_half_open: 2,
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker
            .execute(|| async { Err::<(), _>(GatewayError::Unavailable("down".into())) })
            .await;
    }

    async fn succeed(breaker: &CircuitBreaker) {
        let _ = breaker.execute(|| async { Ok(()) }).await;
    }

    #[tokio::test]
    async fn test_stays_closed_below_minimum_calls() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        for _ in 0..4 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.metrics().failure_rate, None);
    }

    #[tokio::test]
    async fn test_opens_at_failure_rate_threshold() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        succeed(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_stays_closed_below_threshold() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        for _ in 0..3 {
            succeed(&breaker).await;
        }
        fail(&breaker).await;
        fail(&breaker).await;

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failure_rate, Some(40.0));
        assert_eq!(metrics.buffered_calls, 5);
        assert_eq!(metrics.failed_calls, 2);
        assert_eq!(metrics.successful_calls, 3);
    }

    #[tokio::test]
    async fn test_window_evicts_oldest_outcomes() {
        let config = CircuitBreakerConfig {
            sliding_window_size: 4,
            minimum_number_of_calls: 4,
            ..fast_config()
        };
        let breaker = CircuitBreaker::with_config("test", config);
        fail(&breaker).await;
        for _ in 0..4 {
            succeed(&breaker).await;
        }
        let metrics = breaker.metrics();
        assert_eq!(metrics.buffered_calls, 4);
        assert_eq!(metrics.failed_calls, 0);
    }

    #[tokio::test]
    async fn test_open_circuit_does_not_invoke_dependency() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        breaker.force_open();

        let calls = AtomicUsize::new(0);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(GatewayError::CallNotPermitted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.metrics().not_permitted_calls, 1);
    }

    #[tokio::test]
    async fn test_half_open_after_wait_duration() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        breaker.force_open();
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_half_open_limits_concurrent_probes() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first = breaker.try_acquire().unwrap();
        let _second = breaker.try_acquire().unwrap();
        assert!(matches!(
            breaker.try_acquire(),
            Err(GatewayError::CallNotPermitted(_))
        ));

        // A dropped probe frees its slot.
        drop(first);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_half_open_closes_after_successful_probes() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(50)).await;

        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(50)).await;

        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_outcome_from_previous_state_is_ignored() {
        let config = CircuitBreakerConfig {
            permitted_calls_in_half_open: 1,
            ..fast_config()
        };
        let breaker = CircuitBreaker::with_config("test", config);
        let stale = breaker.try_acquire().unwrap();

        breaker.force_open();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        stale.on_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_not_found_is_not_a_failure() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        for _ in 0..5 {
            let _ = breaker
                .execute(|| async { Err::<(), _>(GatewayError::NotFound("APT-1".into())) })
                .await;
        }
        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.failed_calls, 0);
    }

    #[tokio::test]
    async fn test_reset() {
        let breaker = CircuitBreaker::with_config("test", fast_config());
        breaker.force_open();
        let _ = breaker.try_acquire();
        breaker.reset();

        let metrics = breaker.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.not_permitted_calls, 0);
        assert_eq!(metrics.buffered_calls, 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
    }
}
