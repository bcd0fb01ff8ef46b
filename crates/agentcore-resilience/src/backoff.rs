//! Retry policies and delay schedules
//!
//! A [`RetryPolicy`] decides whether a failed attempt is retried and how long
//! to wait first. Delays follow one of four strategies and are always capped
//! by `max_delay`, so the total retry budget is bounded by
//! `max_retries * max_delay`.

use crate::error::ConfigError;
use agentcore_error::ErrorCategory;
use rand::Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// `base_delay * backoff_factor^(attempt-1)`
    Exponential,
    /// `base_delay * attempt`
    Linear,
    /// Always `base_delay`
    Fixed,
    /// No wait at all
    Immediate,
}

/// Retry policy for one operation key
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Delay growth strategy
    pub strategy: RetryStrategy,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential growth (must be >= 1.0)
    pub backoff_factor: f64,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Categories that may be retried
    pub retryable_categories: BTreeSet<ErrorCategory>,
    /// Scale each delay by a random factor in [0.5, 1.0]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: RetryStrategy::Exponential,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
            retryable_categories: ErrorCategory::ALL
                .iter()
                .copied()
                .filter(ErrorCategory::is_retryable_by_default)
                .collect(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self::default().with_max_retries(0)
    }

    /// Recommended policy for faults of the given category
    pub fn recommended_for(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::RateLimit => Self::default()
                .with_base_delay(Duration::from_secs(5))
                .with_max_delay(Duration::from_secs(120))
                .with_jitter(true),
            ErrorCategory::Timeout => Self::default()
                .with_max_retries(2)
                .with_strategy(RetryStrategy::Linear)
                .with_max_delay(Duration::from_secs(10)),
            ErrorCategory::ExternalDependency => Self::default(),
            _ => Self::no_retry(),
        }
    }

    /// Set maximum retries
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set strategy
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set backoff factor
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Replace the retryable categories
    pub fn with_retryable_categories(
        mut self,
        categories: impl IntoIterator<Item = ErrorCategory>,
    ) -> Self {
        self.retryable_categories = categories.into_iter().collect();
        self
    }

    /// Add one retryable category
    pub fn with_retryable(mut self, category: ErrorCategory) -> Self {
        self.retryable_categories.insert(category);
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Rejects policies whose delays would shrink between attempts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(self.backoff_factor));
        }
        Ok(())
    }

    /// Whether faults of `category` may be retried under this policy
    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        self.retryable_categories.contains(&category)
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based), or `None`
    /// once the retry budget is exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }

        let base = self.base_delay_for(attempt);
        if self.jitter && !base.is_zero() {
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            return Some(base.mul_f64(factor));
        }
        Some(base)
    }

    /// Deterministic (jitter-free) delay for `attempt`
    fn base_delay_for(&self, attempt: u32) -> Duration {
        let raw = match self.strategy {
            RetryStrategy::Immediate => return Duration::ZERO,
            RetryStrategy::Fixed => self.base_delay,
            RetryStrategy::Linear => self
                .base_delay
                .checked_mul(attempt)
                .unwrap_or(self.max_delay),
            RetryStrategy::Exponential => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
                if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
                    self.max_delay
                } else if secs <= 0.0 {
                    Duration::ZERO
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        };
        raw.min(self.max_delay)
    }

    /// Iterates the delays of every retry this policy allows
    pub fn delays(&self) -> RetryDelays<'_> {
        RetryDelays {
            policy: self,
            attempt: 0,
        }
    }
}

/// Iterator over a policy's delay schedule
#[derive(Debug, Clone)]
pub struct RetryDelays<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
}

impl RetryDelays<'_> {
    /// Retries not yet yielded
    pub fn remaining(&self) -> u32 {
        self.policy.max_retries.saturating_sub(self.attempt)
    }
}

impl Iterator for RetryDelays<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let attempt = self.attempt.checked_add(1)?;
        let delay = self.policy.next_delay(attempt)?;
        self.attempt = attempt;
        Some(delay)
    }
}
