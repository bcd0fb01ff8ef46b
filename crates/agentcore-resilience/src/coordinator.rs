//! The resilience coordinator
//!
//! [`ResilienceCoordinator::execute`] runs a fallible operation under the
//! retry policy and circuit breaker registered for its operation key,
//! records every fault, evaluates alert thresholds, and hands exhausted
//! failures to category handlers.
//!
//! Registries are read-mostly: policies, handlers and classifiers sit
//! behind `RwLock`s, breakers in a `DashMap` so lookups for different keys
//! never contend. Each breaker serializes only its own transitions.

use crate::alert::{AlertCallback, AlertMonitor, AlertThreshold};
use crate::backoff::RetryPolicy;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError};
use crate::config::ResilienceConfig;
use crate::error::{CancelReason, ConfigError, ResilienceError};
use crate::health::{BreakerHealth, HealthReport};
use crate::sink::{emit_isolated, EventSink, StructuredRecord, TracingSink};
use crate::stats::{ErrorEvent, ErrorStatistics, ErrorStatsStore, DEFAULT_HISTORY_CAPACITY};
use crate::timeout::{with_timeout, CancelToken, Deadline};
use agentcore_error::{Classifier, ClassifierChain, ErrorCategory, Fault};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Type-erased value a handler substitutes for a failed result.
///
/// It must hold the operation's success type, otherwise it is discarded
/// and the failure propagates.
pub struct Recovery(Box<dyn Any + Send>);

impl Recovery {
    /// Wrap a substitute value
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    /// Take the value back out if it is a `T`
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        self.0.downcast::<T>().map(|value| *value).map_err(Self)
    }
}

impl fmt::Debug for Recovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Recovery(..)")
    }
}

/// What a category handler is told about the failure
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    /// Operation key
    pub key: &'a str,
    /// Category of the final fault
    pub category: ErrorCategory,
    /// Attempts that actually invoked the operation
    pub attempts: u32,
    /// The final fault (a circuit-open fault when the breaker rejected)
    pub fault: &'a Fault,
    /// The circuit breaker rejected the call
    pub circuit_open: bool,
}

/// Graceful-degradation hook for one category
pub trait ErrorHandler: Send + Sync {
    /// Return a substitute result, or `None` to let the failure propagate
    fn handle(&self, ctx: &FailureContext<'_>) -> Option<Recovery>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&FailureContext<'_>) -> Option<Recovery> + Send + Sync,
{
    fn handle(&self, ctx: &FailureContext<'_>) -> Option<Recovery> {
        self(ctx)
    }
}

/// Per-call settings for [`ResilienceCoordinator::execute_with`]
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Category used when no classifier recognizes a fault
    pub category_hint: Option<ErrorCategory>,
    /// Policy used instead of the registered one, as-is
    pub policy_override: Option<RetryPolicy>,
    /// Caller cancellation
    pub cancel: Option<CancelToken>,
    /// Deadline for the whole execution
    pub deadline: Option<Deadline>,
    /// Limit on each attempt; exceeding it is a Timeout fault
    pub attempt_timeout: Option<Duration>,
}

impl ExecuteOptions {
    /// Options with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the category hint
    pub fn with_category_hint(mut self, category: ErrorCategory) -> Self {
        self.category_hint = Some(category);
        self
    }

    /// Use `policy` for this call only
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy_override = Some(policy);
        self
    }

    /// Observe `token`
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Stop at `deadline`
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Limit each attempt to `limit`
    pub fn with_attempt_timeout(mut self, limit: Duration) -> Self {
        self.attempt_timeout = Some(limit);
        self
    }
}

/// Runs fallible operations with retries, circuit breaking and alerting
pub struct ResilienceCoordinator {
    classifiers: RwLock<ClassifierChain>,
    default_policy: RwLock<Arc<RetryPolicy>>,
    policies: RwLock<HashMap<String, Arc<RetryPolicy>>>,
    default_breaker: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    handlers: RwLock<HashMap<ErrorCategory, Arc<dyn ErrorHandler>>>,
    alerts: AlertMonitor,
    store: ErrorStatsStore,
    sink: Arc<dyn EventSink>,
    shutdown: CancelToken,
}

impl Default for ResilienceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResilienceCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilienceCoordinator")
            .field("classifiers", &*self.classifiers.read())
            .field("policies", &self.policies.read().len())
            .field("breakers", &self.breakers.len())
            .field("handlers", &self.handlers.read().len())
            .field("alerts", &self.alerts)
            .field("history_capacity", &self.store.capacity())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl ResilienceCoordinator {
    /// Coordinator with default policy, default breakers, the built-in
    /// classifiers and a [`TracingSink`]
    pub fn new() -> Self {
        Self {
            classifiers: RwLock::new(ClassifierChain::default()),
            default_policy: RwLock::new(Arc::new(RetryPolicy::default())),
            policies: RwLock::new(HashMap::new()),
            default_breaker: CircuitBreakerConfig::default(),
            breakers: DashMap::new(),
            handlers: RwLock::new(HashMap::new()),
            alerts: AlertMonitor::new(),
            store: ErrorStatsStore::new(DEFAULT_HISTORY_CAPACITY),
            sink: Arc::new(TracingSink),
            shutdown: CancelToken::new(),
        }
    }

    /// Build from validated configuration
    pub fn from_config(config: &ResilienceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let max_age = config.history_max_age_ms.map(Duration::from_millis);
        let coordinator = Self::new().with_history(config.history_capacity, max_age);

        if let Some(policy) = &config.default_policy {
            coordinator.set_default_policy(policy.to_policy()?)?;
        }
        for (key, policy) in &config.policies {
            coordinator.register_retry_policy(key, policy.to_policy()?)?;
        }
        for (key, breaker) in &config.circuit_breakers {
            coordinator.register_circuit_breaker(key, breaker.to_config(key)?)?;
        }
        for threshold in &config.alert_thresholds {
            coordinator.register_alert_threshold(threshold.to_threshold()?)?;
        }
        tracing::info!(
            policies = config.policies.len(),
            breakers = config.circuit_breakers.len(),
            thresholds = config.alert_thresholds.len(),
            "Resilience coordinator configured"
        );
        Ok(coordinator)
    }

    /// Forward records to `sink` instead of `tracing`
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Keep at most `capacity` events, optionally evicting by age
    pub fn with_history(mut self, capacity: usize, max_age: Option<Duration>) -> Self {
        let store = ErrorStatsStore::new(capacity);
        self.store = match max_age {
            Some(age) => store.with_max_age(age),
            None => store,
        };
        self
    }

    /// Template for breakers created lazily for unregistered keys
    pub fn with_default_breaker(mut self, config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.default_breaker = config;
        Ok(self)
    }

    /// Policy for keys without their own
    pub fn set_default_policy(&self, policy: RetryPolicy) -> Result<(), ConfigError> {
        policy.validate()?;
        *self.default_policy.write() = Arc::new(policy);
        Ok(())
    }

    /// Register (or replace) the retry policy for `key`.
    ///
    /// Executions already running keep the policy they started with.
    pub fn register_retry_policy(&self, key: &str, policy: RetryPolicy) -> Result<(), ConfigError> {
        policy.validate()?;
        tracing::debug!(operation = key, max_retries = policy.max_retries, strategy = ?policy.strategy, "Registered retry policy");
        self.policies.write().insert(key.to_string(), Arc::new(policy));
        Ok(())
    }

    /// Register (or replace, with fresh state) the circuit breaker for `key`
    pub fn register_circuit_breaker(
        &self,
        key: &str,
        mut config: CircuitBreakerConfig,
    ) -> Result<(), ConfigError> {
        config.validate()?;
        config.name = key.to_string();
        tracing::debug!(
            operation = key,
            failure_threshold = config.failure_threshold,
            recovery_timeout_ms = config.recovery_timeout.as_millis() as u64,
            "Registered circuit breaker"
        );
        self.breakers
            .insert(key.to_string(), Arc::new(CircuitBreaker::new(config)));
        Ok(())
    }

    /// Add an alert threshold
    pub fn register_alert_threshold(&self, threshold: AlertThreshold) -> Result<(), ConfigError> {
        self.alerts.register_threshold(threshold)
    }

    /// Add an alert callback, run after those already registered
    pub fn register_alert_callback<C>(&self, callback: C)
    where
        C: AlertCallback + 'static,
    {
        self.alerts.register_callback(Arc::new(callback));
    }

    /// Register (or replace) the handler for faults of `category`
    pub fn register_error_handler<H>(&self, category: ErrorCategory, handler: H)
    where
        H: ErrorHandler + 'static,
    {
        tracing::debug!(category = %category, "Registered error handler");
        self.handlers.write().insert(category, Arc::new(handler));
    }

    /// Add a classifier that runs before all others
    pub fn register_classifier<C>(&self, classifier: C)
    where
        C: Classifier + 'static,
    {
        self.classifiers.write().push_front(Arc::new(classifier));
    }

    /// Category the coordinator assigns to `fault`
    pub fn classify(&self, fault: &Fault, hint: Option<ErrorCategory>) -> ErrorCategory {
        self.classifiers.read().classify_with_hint(fault, hint)
    }

    /// Policy in effect for `key`
    pub fn retry_policy(&self, key: &str) -> Arc<RetryPolicy> {
        match self.policies.read().get(key) {
            Some(policy) => Arc::clone(policy),
            None => Arc::clone(&self.default_policy.read()),
        }
    }

    /// Breaker for `key`, if one exists yet
    pub fn circuit_breaker(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|b| Arc::clone(b.value()))
    }

    fn breaker_for(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(key) {
            return Arc::clone(breaker.value());
        }
        let entry = self.breakers.entry(key.to_string()).or_insert_with(|| {
            let mut config = self.default_breaker.clone();
            config.name = key.to_string();
            Arc::new(CircuitBreaker::new(config))
        });
        Arc::clone(entry.value())
    }

    /// Counters and breakdowns; unchanged between executions
    pub fn get_statistics(&self) -> ErrorStatistics {
        self.store.statistics()
    }

    /// Faults in the last 60 seconds, measured from now
    pub fn current_error_rate(&self) -> u64 {
        self.store.current_error_rate()
    }

    /// Up to `limit` recent events, most recent first
    pub fn get_recent_errors(&self, limit: usize) -> Vec<ErrorEvent> {
        self.store.recent(limit)
    }

    /// Clear history, counters and alert debounce state
    pub fn reset_statistics(&self) {
        self.store.reset();
        self.alerts.reset();
        tracing::info!("Error statistics reset");
    }

    /// Health of every breaker
    pub fn health_report(&self) -> HealthReport {
        let breakers = self
            .breakers
            .iter()
            .map(|entry| BreakerHealth::of(entry.value()))
            .collect();
        HealthReport::new(breakers)
    }

    /// Abort waiting retries and refuse new executions
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("Resilience coordinator shutting down");
        }
        self.shutdown.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) was called
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run `op` under the policy and breaker registered for `key`
    pub async fn execute<T, F, Fut>(&self, key: &str, op: F) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Fault>>,
        T: 'static,
    {
        self.execute_with(key, ExecuteOptions::default(), op).await
    }

    /// [`execute`](Self::execute) with per-call options
    pub async fn execute_with<T, F, Fut>(
        &self,
        key: &str,
        options: ExecuteOptions,
        mut op: F,
    ) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Fault>>,
        T: 'static,
    {
        if self.is_shut_down() {
            return Err(ResilienceError::Shutdown);
        }

        let policy = match &options.policy_override {
            Some(policy) => {
                policy.validate()?;
                Arc::new(policy.clone())
            }
            None => self.retry_policy(key),
        };
        let breaker = self.breaker_for(key);
        let hint = options
            .category_hint
            .or_else(|| ErrorCategory::from_operation_key(key));

        let mut attempt: u32 = 1;
        let mut last_failure: Option<ErrorEvent> = None;

        loop {
            if let Some(reason) = self.stop_reason(&options) {
                return Err(self.give_up_cancelled(key, attempt - 1, reason));
            }

            let permit = match breaker.try_acquire() {
                Ok(permit) => permit,
                Err(open) => return self.reject_open_circuit(key, attempt - 1, open),
            };

            let attempt_future = async {
                match options.attempt_timeout {
                    Some(limit) => with_timeout(limit, key, op()).await,
                    None => op().await,
                }
            };
            let outcome = match self.interruptible(attempt_future, &options).await {
                Ok(outcome) => outcome,
                Err(reason) => {
                    drop(permit);
                    return Err(self.give_up_cancelled(key, attempt, reason));
                }
            };

            let fault = match outcome {
                Ok(value) => {
                    permit.success();
                    if let Some(failed) = last_failure {
                        self.store.mark_recovered(failed.id);
                        self.store.record_recovery();
                        emit_isolated(&*self.sink, &StructuredRecord::recovery(&failed, attempt));
                    }
                    return Ok(value);
                }
                Err(fault) => fault,
            };

            let category = self.classify(&fault, hint);
            let mut event = ErrorEvent::new(key, category, &fault, attempt);
            self.record_event(&mut event);
            permit.failure(category);

            let delay = if policy.is_retryable(category) {
                policy.next_delay(attempt)
            } else {
                None
            };
            let Some(delay) = delay else {
                self.store.record_failed_recovery();
                tracing::error!(
                    operation = key,
                    category = %category,
                    attempts = attempt,
                    retryable = policy.is_retryable(category),
                    error = %fault,
                    "Operation failed, not retrying"
                );
                let ctx = FailureContext {
                    key,
                    category,
                    attempts: attempt,
                    fault: &fault,
                    circuit_open: false,
                };
                if let Some(value) = self.try_handler::<T>(&ctx) {
                    return Ok(value);
                }
                return Err(ResilienceError::Failed {
                    key: key.to_string(),
                    category,
                    attempts: attempt,
                    fault,
                });
            };

            self.store.record_retry();
            tracing::warn!(
                operation = key,
                category = %category,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %fault,
                "Attempt failed, retrying"
            );
            last_failure = Some(event);

            if let Err(reason) = self
                .interruptible(tokio::time::sleep(delay), &options)
                .await
            {
                return Err(self.give_up_cancelled(key, attempt, reason));
            }
            attempt += 1;
        }
    }

    fn stop_reason(&self, options: &ExecuteOptions) -> Option<CancelReason> {
        if self.shutdown.is_cancelled() {
            Some(CancelReason::Shutdown)
        } else if options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            Some(CancelReason::Cancelled)
        } else if options.deadline.as_ref().is_some_and(Deadline::is_expired) {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Race `fut` against shutdown, the caller's token and the deadline
    async fn interruptible<O>(
        &self,
        fut: impl Future<Output = O>,
        options: &ExecuteOptions,
    ) -> Result<O, CancelReason> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(CancelReason::Shutdown),
            _ = cancelled(options.cancel.as_ref()) => Err(CancelReason::Cancelled),
            _ = expired(options.deadline.as_ref()) => Err(CancelReason::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    fn record_event(&self, event: &mut ErrorEvent) {
        event.occurred_at = self.store.record(event.clone());
        emit_isolated(&*self.sink, &StructuredRecord::error(event));
        for alert in self.alerts.evaluate(event, &self.store) {
            emit_isolated(
                &*self.sink,
                &StructuredRecord::alert(&alert, &event.operation, event.attempt),
            );
        }
    }

    fn reject_open_circuit<T: 'static>(
        &self,
        key: &str,
        attempts: u32,
        open: CircuitOpenError,
    ) -> Result<T, ResilienceError> {
        let fault = Fault::external(open.to_string())
            .with_detail("retry_after_ms", open.retry_after.as_millis().to_string());
        let mut event = ErrorEvent::new(key, ErrorCategory::ExternalDependency, &fault, attempts);
        self.record_event(&mut event);
        self.store.record_failed_recovery();
        tracing::warn!(operation = key, retry_after_ms = open.retry_after.as_millis() as u64, "Circuit open, call rejected");

        let ctx = FailureContext {
            key,
            category: ErrorCategory::ExternalDependency,
            attempts,
            fault: &fault,
            circuit_open: true,
        };
        match self.try_handler::<T>(&ctx) {
            Some(value) => Ok(value),
            None => Err(ResilienceError::CircuitOpen(open)),
        }
    }

    fn give_up_cancelled(&self, key: &str, attempts: u32, reason: CancelReason) -> ResilienceError {
        let fault = Fault::timeout(format!("Operation '{key}' {reason}"));
        let mut event = ErrorEvent::new(key, ErrorCategory::Timeout, &fault, attempts);
        self.record_event(&mut event);
        self.store.record_failed_recovery();
        tracing::warn!(operation = key, attempts, reason = %reason, "Execution stopped");
        ResilienceError::Cancelled {
            key: key.to_string(),
            attempts,
            reason,
        }
    }

    fn try_handler<T: 'static>(&self, ctx: &FailureContext<'_>) -> Option<T> {
        let handler = self.handlers.read().get(&ctx.category).cloned()?;
        let recovery = match catch_unwind(AssertUnwindSafe(|| handler.handle(ctx))) {
            Ok(recovery) => recovery?,
            Err(_) => {
                tracing::error!(operation = ctx.key, category = %ctx.category, "Error handler panicked");
                return None;
            }
        };
        match recovery.downcast::<T>() {
            Ok(value) => {
                self.store.record_degraded_recovery();
                tracing::info!(operation = ctx.key, category = %ctx.category, "Error handler supplied a fallback result");
                Some(value)
            }
            Err(_) => {
                tracing::error!(
                    operation = ctx.key,
                    category = %ctx.category,
                    expected = std::any::type_name::<T>(),
                    "Error handler returned a value of the wrong type"
                );
                None
            }
        }
    }
}

async fn cancelled(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn expired(deadline: Option<&Deadline>) {
    match deadline {
        Some(deadline) => deadline.expired().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;

    #[test]
    fn test_recovery_downcast() {
        let recovery = Recovery::new(String::from("cached"));
        assert_eq!(recovery.downcast::<String>().unwrap(), "cached");

        let recovery = Recovery::new(7u8);
        assert!(recovery.downcast::<String>().is_err());
    }

    #[test]
    fn test_registration_rejects_bad_config() {
        let coordinator = ResilienceCoordinator::new();
        assert!(coordinator
            .register_retry_policy("k", RetryPolicy::new().with_backoff_factor(0.9))
            .is_err());
        assert!(coordinator
            .register_circuit_breaker("k", CircuitBreakerConfig::default().with_failure_threshold(0))
            .is_err());
        assert!(coordinator
            .register_alert_threshold(AlertThreshold::new(ErrorCategory::Timeout, 0, Duration::from_secs(1)))
            .is_err());
    }

    #[test]
    fn test_policy_lookup_falls_back_to_default() {
        let coordinator = ResilienceCoordinator::new();
        coordinator
            .register_retry_policy("timeout:search", RetryPolicy::no_retry())
            .unwrap();
        assert_eq!(coordinator.retry_policy("timeout:search").max_retries, 0);
        assert_eq!(coordinator.retry_policy("other").max_retries, 3);

        coordinator
            .set_default_policy(RetryPolicy::new().with_max_retries(1))
            .unwrap();
        assert_eq!(coordinator.retry_policy("other").max_retries, 1);
    }

    #[test]
    fn test_breakers_created_once_per_key() {
        let coordinator = ResilienceCoordinator::new();
        assert!(coordinator.circuit_breaker("k").is_none());
        let first = coordinator.breaker_for("k");
        let second = coordinator.breaker_for("k");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.config().name, "k");
        assert_eq!(first.config().failure_threshold, 5);
    }

    #[test]
    fn test_classify_uses_hint_then_internal() {
        let coordinator = ResilienceCoordinator::new();
        let fault = Fault::new("opaque");
        assert_eq!(coordinator.classify(&fault, None), ErrorCategory::Internal);
        assert_eq!(
            coordinator.classify(&fault, Some(ErrorCategory::RateLimit)),
            ErrorCategory::RateLimit
        );

        coordinator.register_classifier(|f: &Fault| {
            f.message().contains("opaque").then_some(ErrorCategory::Configuration)
        });
        assert_eq!(coordinator.classify(&fault, None), ErrorCategory::Configuration);
    }

    #[tokio::test]
    async fn test_success_records_nothing() {
        let coordinator = ResilienceCoordinator::new();
        let value = coordinator
            .execute("internal:noop", || async { Ok::<_, Fault>(5) })
            .await
            .unwrap();
        assert_eq!(value, 5);
        assert_eq!(coordinator.get_statistics(), ErrorStatistics::default());
        assert_eq!(
            coordinator.circuit_breaker("internal:noop").unwrap().state(),
            CircuitState::Closed
        );
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_work() {
        let coordinator = ResilienceCoordinator::new();
        coordinator.shutdown();
        assert!(coordinator.is_shut_down());
        let result = coordinator
            .execute("internal:noop", || async { Ok::<_, Fault>(()) })
            .await;
        assert!(matches!(result, Err(ResilienceError::Shutdown)));
    }

    #[tokio::test]
    async fn test_wrong_handler_type_propagates_fault() {
        let coordinator = ResilienceCoordinator::new();
        coordinator.register_error_handler(ErrorCategory::Validation, |_: &FailureContext<'_>| {
            Some(Recovery::new("not a number"))
        });
        let result: Result<u32, _> = coordinator
            .execute("validation:parse", || async { Err(Fault::validation("bad input")) })
            .await;
        assert!(matches!(result, Err(ResilienceError::Failed { .. })));
        assert_eq!(coordinator.get_statistics().degraded_recoveries, 0);
    }

    #[test]
    fn test_from_config() {
        let config = ResilienceConfig::from_json_str(
            r#"{
                "history_capacity": 10,
                "policies": { "external-dependency:lookup": { "max_retries": 2, "strategy": "fixed", "base_delay_ms": 10 } },
                "circuit_breakers": { "external-dependency:lookup": { "failure_threshold": 3 } },
                "alert_thresholds": [ { "category": "timeout", "count_threshold": 2, "window_ms": 1000 } ]
            }"#,
        )
        .unwrap();
        let coordinator = ResilienceCoordinator::from_config(&config).unwrap();
        assert_eq!(coordinator.retry_policy("external-dependency:lookup").max_retries, 2);
        let breaker = coordinator.circuit_breaker("external-dependency:lookup").unwrap();
        assert_eq!(breaker.config().failure_threshold, 3);
        assert_eq!(breaker.config().name, "external-dependency:lookup");
        assert_eq!(coordinator.alerts.thresholds().len(), 1);
        assert_eq!(coordinator.store.capacity(), 10);
    }
}
