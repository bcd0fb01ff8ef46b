//! Circuit breaker pattern implementation
//!
//! Stops calls to a failing dependency for a cooldown period. Every state
//! transition happens under the breaker's own mutex, so concurrent callers on
//! one key never exceed the half-open probe budget. Unrelated keys never
//! share a lock.

use crate::error::ConfigError;
use agentcore_error::{ErrorCategory, Fault};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Circuit is closed - requests flow normally
    Closed,
    /// Circuit is open - requests are rejected
    Open,
    /// Circuit is half-open - probing whether the dependency recovered
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening circuit
    pub failure_threshold: u32,
    /// Time to wait in Open before admitting probes
    pub recovery_timeout: Duration,
    /// Probes admitted while half-open
    pub half_open_max_calls: u32,
    /// Successful probes needed to close (capped at `half_open_max_calls`)
    pub success_threshold: u32,
    /// Categories that never count as failures
    pub ignored_categories: BTreeSet<ErrorCategory>,
    /// Name for logging
    pub name: String,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            success_threshold: 1,
            ignored_categories: BTreeSet::new(),
            name: "default".to_string(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the half-open probe budget
    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls;
        self
    }

    /// Set success threshold for half-open state
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Never count faults of `category` against the breaker
    pub fn ignoring(mut self, category: ErrorCategory) -> Self {
        self.ignored_categories.insert(category);
        self
    }

    /// Rejects thresholds that would make the breaker meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: format!("{}.failure_threshold", self.name),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.half_open_max_calls == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: format!("{}.half_open_max_calls", self.name),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn closing_successes(&self) -> u32 {
        self.success_threshold.clamp(1, self.half_open_max_calls.max(1))
    }
}

/// Error when circuit is open
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circuit '{name}' is open, retry after {retry_after:?}")]
pub struct CircuitOpenError {
    /// Name of the circuit breaker
    pub name: String,
    /// Time until the circuit may admit a probe
    pub retry_after: Duration,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    half_open_admitted: u32,
    half_open_successes: u32,
    /// Bumped on every transition into HalfOpen so late results from an
    /// earlier probe round are ignored.
    probe_round: u64,
    opened_at: Option<Instant>,
    last_failure: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            half_open_admitted: 0,
            half_open_successes: 0,
            probe_round: 0,
            opened_at: None,
            last_failure: None,
        }
    }
}

/// Circuit breaker for one operation key
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    rejected_calls: AtomicU64,
}

/// Admission ticket for one call; report the outcome through it.
///
/// Dropping a permit without an outcome (e.g. the call was cancelled)
/// releases its half-open probe slot.
#[derive(Debug)]
#[must_use = "report the call outcome with success() or failure()"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe_round: Option<u64>,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this call is a half-open probe
    pub fn is_probe(&self) -> bool {
        self.probe_round.is_some()
    }

    /// Report a successful call
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.probe_round);
    }

    /// Report a failed call of the given category
    pub fn failure(mut self, category: ErrorCategory) {
        self.settled = true;
        if self.breaker.config.ignored_categories.contains(&category) {
            self.breaker.release_probe(self.probe_round);
        } else {
            self.breaker.on_failure(self.probe_round);
        }
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release_probe(self.probe_round);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with config
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState::new()),
            rejected_calls: AtomicU64::new(0),
        }
    }

    /// Create with default config and name
    pub fn with_name(name: impl Into<String>) -> Self {
        Self::new(CircuitBreakerConfig::new(name))
    }

    /// The breaker's configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get current state (without triggering the lazy Open -> HalfOpen move)
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Ask to make a call.
    ///
    /// An Open circuit whose recovery timeout has elapsed moves to HalfOpen
    /// here, on the first call after the timeout.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, CircuitOpenError> {
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner
                .opened_at
                .map(|at| at.elapsed())
                .unwrap_or(self.config.recovery_timeout);
            if elapsed < self.config.recovery_timeout {
                drop(inner);
                return Err(self.reject(self.config.recovery_timeout - elapsed));
            }
            inner.state = CircuitState::HalfOpen;
            inner.half_open_admitted = 0;
            inner.half_open_successes = 0;
            inner.probe_round += 1;
            tracing::info!(circuit = %self.config.name, "Circuit half-open, admitting probes");
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(self.permit(None)),
            CircuitState::HalfOpen if inner.half_open_admitted < self.config.half_open_max_calls => {
                inner.half_open_admitted += 1;
                let round = inner.probe_round;
                Ok(self.permit(Some(round)))
            }
            _ => {
                drop(inner);
                Err(self.reject(Duration::ZERO))
            }
        }
    }

    fn permit(&self, probe_round: Option<u64>) -> CallPermit<'_> {
        CallPermit {
            breaker: self,
            probe_round,
            settled: false,
        }
    }

    fn reject(&self, retry_after: Duration) -> CircuitOpenError {
        self.rejected_calls.fetch_add(1, Ordering::Relaxed);
        CircuitOpenError {
            name: self.config.name.clone(),
            retry_after,
        }
    }

    /// Record a successful call made outside a permit
    pub fn record_success(&self) {
        let round = self.current_probe_round();
        self.on_success(round);
    }

    /// Record a failed call made outside a permit
    pub fn record_failure(&self) {
        let round = self.current_probe_round();
        self.on_failure(round);
    }

    fn current_probe_round(&self) -> Option<u64> {
        let inner = self.inner.lock();
        (inner.state == CircuitState::HalfOpen).then_some(inner.probe_round)
    }

    fn on_success(&self, probe_round: Option<u64>) {
        let mut inner = self.inner.lock();
        match (inner.state, probe_round) {
            (CircuitState::HalfOpen, Some(round)) if round == inner.probe_round => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.closing_successes() {
                    Self::close(&mut inner);
                    tracing::info!(
                        circuit = %self.config.name,
                        "Circuit closed after successful recovery"
                    );
                }
            }
            (CircuitState::Closed, _) => {
                inner.failure_count = 0;
            }
            _ => {}
        }
    }

    fn on_failure(&self, probe_round: Option<u64>) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.last_failure = Some(now);

        match (inner.state, probe_round) {
            (CircuitState::Closed, _) => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    Self::open(&mut inner, now);
                    tracing::warn!(
                        circuit = %self.config.name,
                        failures = inner.failure_count,
                        "Circuit opened due to failures"
                    );
                }
            }
            (CircuitState::HalfOpen, Some(round)) if round == inner.probe_round => {
                inner.failure_count += 1;
                Self::open(&mut inner, now);
                tracing::warn!(
                    circuit = %self.config.name,
                    "Circuit reopened after half-open failure"
                );
            }
            (CircuitState::Open, _) => {
                inner.failure_count += 1;
            }
            _ => {}
        }
    }

    fn release_probe(&self, probe_round: Option<u64>) {
        let Some(round) = probe_round else {
            return;
        };
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe_round == round {
            inner.half_open_admitted = inner.half_open_admitted.saturating_sub(1);
        }
    }

    fn open(inner: &mut BreakerState, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.half_open_admitted = 0;
        inner.half_open_successes = 0;
    }

    fn close(inner: &mut BreakerState) {
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.failure_count = 0;
        inner.half_open_admitted = 0;
        inner.half_open_successes = 0;
    }

    /// Execute a function with circuit breaker protection.
    ///
    /// Every `Err` counts as a failure of the given category.
    pub async fn execute<F, Fut, T>(
        &self,
        category: ErrorCategory,
        f: F,
    ) -> Result<T, CircuitBreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Fault>>,
    {
        let permit = self.try_acquire()?;
        match f().await {
            Ok(result) => {
                permit.success();
                Ok(result)
            }
            Err(e) => {
                permit.failure(category);
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    /// Get metrics
    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock();
        CircuitMetrics {
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_in_flight: inner
                .half_open_admitted
                .saturating_sub(inner.half_open_successes),
            half_open_successes: inner.half_open_successes,
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            open_for: inner.opened_at.map(|at| at.elapsed()),
            since_last_failure: inner.last_failure.map(|at| at.elapsed()),
        }
    }

    /// Force close the circuit (for testing/admin)
    pub fn force_close(&self) {
        Self::close(&mut self.inner.lock());
    }

    /// Force open the circuit (for testing/admin)
    pub fn force_open(&self) {
        Self::open(&mut self.inner.lock(), Instant::now());
    }
}

/// Error type for [`CircuitBreaker::execute`]
#[derive(Error, Debug)]
pub enum CircuitBreakerError {
    /// Circuit is open
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),
    /// Inner operation error
    #[error(transparent)]
    Inner(Fault),
}

/// Circuit breaker metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitMetrics {
    /// Current state
    pub state: CircuitState,
    /// Current failure count
    pub failure_count: u32,
    /// Probes admitted but not yet succeeded
    pub half_open_in_flight: u32,
    /// Successful probes in the current half-open round
    pub half_open_successes: u32,
    /// Calls rejected without being invoked
    pub rejected_calls: u64,
    /// Time since the circuit last opened, while open or half-open
    pub open_for: Option<Duration>,
    /// Time since the last recorded failure
    pub since_last_failure: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, max_probes: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new("external-dependency:test")
                .with_failure_threshold(threshold)
                .with_recovery_timeout(Duration::from_secs(30))
                .with_half_open_max_calls(max_probes),
        )
    }

    #[tokio::test]
    async fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::with_name("test");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_circuit_opens_after_failures() {
        let cb = breaker(3, 1);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_rejects_when_open() {
        let cb = breaker(3, 1);
        cb.force_open();

        tokio::time::advance(Duration::from_secs(10)).await;
        let err = cb.try_acquire().unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(20));
        assert_eq!(cb.metrics().rejected_calls, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = breaker(3, 1);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();

        assert_eq!(cb.metrics().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_after_timeout() {
        let cb = breaker(3, 1);
        for _ in 0..3 {
            cb.try_acquire().unwrap().failure(ErrorCategory::ExternalDependency);
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(30)).await;
        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        probe.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_budget() {
        let cb = breaker(1, 2);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(30)).await;

        let first = cb.try_acquire().unwrap();
        let second = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_err());
        assert_eq!(cb.metrics().half_open_in_flight, 2);

        drop(first);
        let third = cb.try_acquire().unwrap();
        assert!(third.is_probe());
        second.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        third.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_reopens_on_failure() {
        let cb = breaker(1, 2);
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(30)).await;

        let probe = cb.try_acquire().unwrap();
        let late = cb.try_acquire().unwrap();
        probe.failure(ErrorCategory::Timeout);
        assert_eq!(cb.state(), CircuitState::Open);

        // result of a probe from the finished round changes nothing
        late.success();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_required_when_configured() {
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new("strict")
                .with_failure_threshold(1)
                .with_recovery_timeout(Duration::from_secs(1))
                .with_half_open_max_calls(2)
                .with_success_threshold(2),
        );
        cb.record_failure();
        tokio::time::advance(Duration::from_secs(1)).await;

        cb.try_acquire().unwrap().success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.try_acquire().unwrap().success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_ignored_categories_do_not_trip() {
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new("lenient")
                .with_failure_threshold(1)
                .ignoring(ErrorCategory::Validation),
        );
        cb.try_acquire().unwrap().failure(ErrorCategory::Validation);
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.try_acquire().unwrap().failure(ErrorCategory::ExternalDependency);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let cb = CircuitBreaker::with_name("test");

        let result = cb
            .execute(ErrorCategory::ExternalDependency, || async { Ok::<_, Fault>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_execute_failure_counted() {
        let cb = breaker(2, 1);

        let _ = cb
            .execute(ErrorCategory::ExternalDependency, || async {
                Err::<i32, _>(Fault::external("down"))
            })
            .await;
        assert_eq!(cb.metrics().failure_count, 1);

        let _ = cb
            .execute(ErrorCategory::ExternalDependency, || async {
                Err::<i32, _>(Fault::external("down"))
            })
            .await;
        assert_eq!(cb.state(), CircuitState::Open);

        let rejected = cb
            .execute(ErrorCategory::ExternalDependency, || async { Ok::<_, Fault>(1) })
            .await;
        assert!(matches!(rejected, Err(CircuitBreakerError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn test_force_close() {
        let cb = CircuitBreaker::with_name("test");
        cb.force_open();
        assert_eq!(cb.state(), CircuitState::Open);

        cb.force_close();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_config_validation() {
        assert!(CircuitBreakerConfig::new("x").validate().is_ok());
        assert!(CircuitBreakerConfig::new("x")
            .with_failure_threshold(0)
            .validate()
            .is_err());
        assert!(CircuitBreakerConfig::new("x")
            .with_half_open_max_calls(0)
            .validate()
            .is_err());
    }
}
