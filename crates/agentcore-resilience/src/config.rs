//! Configuration
//!
//! JSON-loadable settings for a [`ResilienceCoordinator`](crate::ResilienceCoordinator).
//! Durations are integer milliseconds; negative delays are clamped to zero.

use crate::alert::{AlertSeverity, AlertThreshold};
use crate::backoff::{RetryPolicy, RetryStrategy};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::stats::DEFAULT_HISTORY_CAPACITY;
use agentcore_error::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Coordinator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Events kept in the history
    pub history_capacity: usize,
    /// Evict events older than this
    pub history_max_age_ms: Option<u64>,
    /// Policy for keys without their own
    pub default_policy: Option<RetryPolicyConfig>,
    /// Per-key retry policies
    pub policies: BTreeMap<String, RetryPolicyConfig>,
    /// Per-key circuit breakers
    pub circuit_breakers: BTreeMap<String, CircuitBreakerSettings>,
    /// Alert thresholds
    pub alert_thresholds: Vec<AlertThresholdConfig>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_max_age_ms: None,
            default_policy: None,
            policies: BTreeMap::new(),
            circuit_breakers: BTreeMap::new(),
            alert_thresholds: Vec::new(),
        }
    }
}

impl ResilienceConfig {
    /// Parse from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Write as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every entry without building anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(policy) = &self.default_policy {
            policy.to_policy()?;
        }
        for policy in self.policies.values() {
            policy.to_policy()?;
        }
        for (key, breaker) in &self.circuit_breakers {
            breaker.to_config(key)?;
        }
        for threshold in &self.alert_thresholds {
            threshold.to_threshold()?;
        }
        Ok(())
    }
}

fn millis(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0).unsigned_abs())
}

fn parse_categories(names: &[String]) -> Result<Vec<ErrorCategory>, ConfigError> {
    names
        .iter()
        .map(|name| name.parse::<ErrorCategory>().map_err(ConfigError::from))
        .collect()
}

/// Retry policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay growth strategy
    pub strategy: RetryStrategy,
    /// First retry delay
    pub base_delay_ms: i64,
    /// Exponential multiplier
    pub backoff_factor: f64,
    /// Delay cap
    pub max_delay_ms: i64,
    /// Retryable category names; category defaults when absent
    pub retryable_categories: Option<Vec<String>>,
    /// Randomize delays
    pub jitter: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            strategy: policy.strategy,
            base_delay_ms: 1_000,
            backoff_factor: policy.backoff_factor,
            max_delay_ms: 60_000,
            retryable_categories: None,
            jitter: policy.jitter,
        }
    }
}

impl RetryPolicyConfig {
    /// Build and validate the policy
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let mut policy = RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_strategy(self.strategy)
            .with_base_delay(millis(self.base_delay_ms))
            .with_backoff_factor(self.backoff_factor)
            .with_max_delay(millis(self.max_delay_ms))
            .with_jitter(self.jitter);
        if let Some(names) = &self.retryable_categories {
            policy = policy.with_retryable_categories(parse_categories(names)?);
        }
        policy.validate()?;
        Ok(policy)
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Failures before opening
    pub failure_threshold: u32,
    /// Cooldown before probing
    pub recovery_timeout_ms: u64,
    /// Probes admitted while half-open
    pub half_open_max_calls: u32,
    /// Probe successes needed to close
    pub success_threshold: u32,
    /// Category names that never trip the breaker
    pub ignored_categories: Vec<String>,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let config = CircuitBreakerConfig::default();
        Self {
            failure_threshold: config.failure_threshold,
            recovery_timeout_ms: 60_000,
            half_open_max_calls: config.half_open_max_calls,
            success_threshold: config.success_threshold,
            ignored_categories: Vec::new(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Build and validate the breaker config for `key`
    pub fn to_config(&self, key: &str) -> Result<CircuitBreakerConfig, ConfigError> {
        let mut config = CircuitBreakerConfig::new(key)
            .with_failure_threshold(self.failure_threshold)
            .with_recovery_timeout(Duration::from_millis(self.recovery_timeout_ms))
            .with_half_open_max_calls(self.half_open_max_calls)
            .with_success_threshold(self.success_threshold);
        for category in parse_categories(&self.ignored_categories)? {
            config = config.ignoring(category);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Alert threshold settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholdConfig {
    /// Category name
    pub category: String,
    /// Faults needed inside the window
    pub count_threshold: u32,
    /// Window length
    pub window_ms: u64,
    /// Alert severity
    #[serde(default)]
    pub severity: AlertSeverity,
}

impl AlertThresholdConfig {
    /// Build and validate the threshold
    pub fn to_threshold(&self) -> Result<AlertThreshold, ConfigError> {
        let threshold = AlertThreshold::new(
            self.category.parse()?,
            self.count_threshold,
            Duration::from_millis(self.window_ms),
        )
        .with_severity(self.severity);
        threshold.validate()?;
        Ok(threshold)
    }
}
