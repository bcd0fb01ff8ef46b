//! Threshold alerting over sliding windows
//!
//! After each recorded [`ErrorEvent`] the monitor counts events of the same
//! category inside every matching threshold's window. Crossing a threshold
//! builds an [`Alert`] and hands it to each callback, in registration order.
//!
//! A threshold that fired is muted until its window has moved past the
//! event that fired it, so a burst produces one alert instead of one per
//! event.

use crate::error::ConfigError;
use crate::stats::{ErrorEvent, ErrorStatsStore};
use agentcore_error::{BoxError, ErrorCategory};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Alert severity
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Needs attention soon
    #[default]
    Medium,
    /// Needs attention now
    High,
    /// Service-affecting
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Fire when `count_threshold` faults of `category` land within `window`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertThreshold {
    /// Category watched
    pub category: ErrorCategory,
    /// Faults needed inside the window
    pub count_threshold: u32,
    /// Sliding window length
    pub window: Duration,
    /// Severity of the resulting alert
    pub severity: AlertSeverity,
}

impl AlertThreshold {
    /// Threshold with [`AlertSeverity::Medium`]
    pub fn new(category: ErrorCategory, count_threshold: u32, window: Duration) -> Self {
        Self {
            category,
            count_threshold,
            window,
            severity: AlertSeverity::default(),
        }
    }

    /// Set severity
    pub fn with_severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Rejects thresholds that fire on nothing or never roll
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count_threshold == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: format!("alert.{}.count_threshold", self.category),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.window.is_zero() {
            return Err(ConfigError::InvalidThreshold {
                name: format!("alert.{}.window", self.category),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// A crossed threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    /// Category that crossed
    pub category: ErrorCategory,
    /// Severity from the threshold
    pub severity: AlertSeverity,
    /// Human-readable summary
    pub message: String,
    /// Faults counted inside the window
    pub observed_count: u32,
    /// The threshold crossed
    pub threshold: u32,
    /// Window length
    pub window: Duration,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
    /// Earliest fault counted
    pub first_occurrence: Option<DateTime<Utc>>,
    /// The fault that crossed the threshold
    pub event_id: Uuid,
}

/// Receives alerts; errors and panics are logged and swallowed
pub trait AlertCallback: Send + Sync {
    /// Handle one alert
    fn on_alert(&self, alert: &Alert) -> Result<(), BoxError>;
}

impl<F> AlertCallback for F
where
    F: Fn(&Alert) -> Result<(), BoxError> + Send + Sync,
{
    fn on_alert(&self, alert: &Alert) -> Result<(), BoxError> {
        self(alert)
    }
}

#[derive(Debug)]
struct ThresholdSlot {
    threshold: AlertThreshold,
    last_fired: Mutex<Option<Instant>>,
}

/// Registered thresholds and callbacks
#[derive(Default)]
pub struct AlertMonitor {
    thresholds: RwLock<Vec<Arc<ThresholdSlot>>>,
    callbacks: RwLock<Vec<Arc<dyn AlertCallback>>>,
}

impl fmt::Debug for AlertMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertMonitor")
            .field("thresholds", &self.thresholds.read().len())
            .field("callbacks", &self.callbacks.read().len())
            .finish()
    }
}

impl AlertMonitor {
    /// Monitor with no thresholds or callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a threshold; several may watch one category
    pub fn register_threshold(&self, threshold: AlertThreshold) -> Result<(), ConfigError> {
        threshold.validate()?;
        tracing::debug!(
            category = %threshold.category,
            count = threshold.count_threshold,
            window_ms = threshold.window.as_millis() as u64,
            "Registered alert threshold"
        );
        self.thresholds.write().push(Arc::new(ThresholdSlot {
            threshold,
            last_fired: Mutex::new(None),
        }));
        Ok(())
    }

    /// Add a callback, run after those already registered
    pub fn register_callback(&self, callback: Arc<dyn AlertCallback>) {
        self.callbacks.write().push(callback);
    }

    /// Registered thresholds
    pub fn thresholds(&self) -> Vec<AlertThreshold> {
        self.thresholds
            .read()
            .iter()
            .map(|slot| slot.threshold.clone())
            .collect()
    }

    /// Evaluate every threshold for `event`'s category and dispatch the
    /// alerts that fire. Returns them for forwarding.
    pub fn evaluate(&self, event: &ErrorEvent, store: &ErrorStatsStore) -> Vec<Alert> {
        let slots: Vec<_> = self
            .thresholds
            .read()
            .iter()
            .filter(|slot| slot.threshold.category == event.category)
            .cloned()
            .collect();

        let mut fired = Vec::new();
        for slot in slots {
            if let Some(alert) = Self::check(&slot, event, store) {
                self.dispatch(&alert);
                fired.push(alert);
            }
        }
        fired
    }

    fn check(slot: &ThresholdSlot, event: &ErrorEvent, store: &ErrorStatsStore) -> Option<Alert> {
        let threshold = &slot.threshold;
        let mut last_fired = slot.last_fired.lock();

        if let Some(previous) = *last_fired {
            match previous.checked_add(threshold.window) {
                Some(until) if event.occurred_at >= until => {}
                _ => return None,
            }
        }

        let (observed, first_occurrence) =
            store.window_count(threshold.category, event.occurred_at, threshold.window);
        if observed < threshold.count_threshold {
            return None;
        }
        *last_fired = Some(event.occurred_at);

        Some(Alert {
            category: threshold.category,
            severity: threshold.severity,
            message: format!(
                "{} {} errors within {:?} (threshold {})",
                observed, threshold.category, threshold.window, threshold.count_threshold
            ),
            observed_count: observed,
            threshold: threshold.count_threshold,
            window: threshold.window,
            timestamp: Utc::now(),
            first_occurrence,
            event_id: event.id,
        })
    }

    /// Run every callback; failures never reach the caller
    pub fn dispatch(&self, alert: &Alert) {
        let callbacks: Vec<_> = self.callbacks.read().iter().cloned().collect();
        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback.on_alert(alert))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(callback = index, category = %alert.category, error = %e, "Alert callback failed");
                }
                Err(_) => {
                    tracing::error!(callback = index, category = %alert.category, "Alert callback panicked");
                }
            }
        }
    }

    /// Forget when each threshold last fired
    pub fn reset(&self) {
        for slot in self.thresholds.read().iter() {
            *slot.last_fired.lock() = None;
        }
    }
}
