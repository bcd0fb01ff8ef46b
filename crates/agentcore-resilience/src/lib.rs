//! # AgentCore Resilience
//!
//! Resilience coordinator for AgentCore calls to external APIs, indexes and
//! tools.
//!
//! - **Retry Policies**: Exponential, linear, fixed or immediate backoff with a hard bound
//! - **Circuit Breaker**: Per-operation breakers that stop calls to a failing dependency
//! - **Alerting**: Sliding-window thresholds per error category, debounced
//! - **Statistics**: Bounded event history with cumulative counters
//! - **Coordinator**: One `execute` call that ties all of the above together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agentcore_error::Fault;
//! use agentcore_resilience::{ResilienceCoordinator, RetryPolicy, RetryStrategy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = ResilienceCoordinator::new();
//! coordinator.register_retry_policy(
//!     "external-dependency:model-index",
//!     RetryPolicy::new()
//!         .with_max_retries(2)
//!         .with_strategy(RetryStrategy::Fixed)
//!         .with_base_delay(Duration::from_millis(10)),
//! )?;
//!
//! let hits = coordinator
//!     .execute("external-dependency:model-index", || async {
//!         // Your index query here
//!         Ok::<_, Fault>(vec!["Level 1", "Level 2"])
//!     })
//!     .await?;
//! assert_eq!(hits.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Circuit Breaker
//!
//! ```rust
//! use agentcore_resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new("external-dependency:graph")
//!     .with_failure_threshold(3)                      // Open after 3 failures
//!     .with_recovery_timeout(Duration::from_secs(30)) // Probe again after 30s
//!     .with_half_open_max_calls(2);                   // At most 2 probes
//!
//! let cb = CircuitBreaker::new(config);
//! assert_eq!(cb.state(), CircuitState::Closed);
//! ```
//!
//! ## Retry Policies
//!
//! ```rust
//! use agentcore_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .with_base_delay(Duration::from_millis(100))
//!     .with_max_delay(Duration::from_secs(1));
//!
//! for delay in policy.delays() {
//!     println!("Wait {:?} before retry", delay);
//! }
//! assert_eq!(policy.next_delay(4), None);
//! ```
//!
//! ## Alerts
//!
//! ```rust
//! use agentcore_error::{BoxError, ErrorCategory};
//! use agentcore_resilience::{Alert, AlertSeverity, AlertThreshold, ResilienceCoordinator};
//! use std::time::Duration;
//!
//! let coordinator = ResilienceCoordinator::new();
//! coordinator
//!     .register_alert_threshold(
//!         AlertThreshold::new(ErrorCategory::ExternalDependency, 5, Duration::from_secs(300))
//!             .with_severity(AlertSeverity::High),
//!     )
//!     .unwrap();
//! coordinator.register_alert_callback(|alert: &Alert| -> Result<(), BoxError> {
//!     eprintln!("{}: {}", alert.severity, alert.message);
//!     Ok(())
//! });
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod backoff;
pub mod circuit_breaker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod sink;
pub mod stats;
pub mod timeout;

// Re-export main types
pub use alert::{Alert, AlertCallback, AlertMonitor, AlertSeverity, AlertThreshold};

pub use backoff::{RetryDelays, RetryPolicy, RetryStrategy};

pub use circuit_breaker::{
    CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitMetrics,
    CircuitOpenError, CircuitState,
};

pub use config::{AlertThresholdConfig, CircuitBreakerSettings, ResilienceConfig, RetryPolicyConfig};

pub use coordinator::{ErrorHandler, ExecuteOptions, FailureContext, Recovery, ResilienceCoordinator};

pub use error::{CancelReason, ConfigError, ResilienceError};

pub use health::{BreakerHealth, HealthReport, HealthStatus};

pub use sink::{EventSink, MemorySink, RecordKind, StructuredRecord, TracingSink};

pub use stats::{ErrorEvent, ErrorStatistics, ErrorStatsStore, DEFAULT_HISTORY_CAPACITY};

pub use timeout::{with_timeout, CancelToken, Deadline};
