//! Error statistics store
//!
//! A bounded history of recent [`ErrorEvent`]s plus cumulative counters.
//! Counters survive eviction; only [`ErrorStatsStore::reset`] clears them.

use agentcore_error::{ErrorCategory, Fault};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Default number of events kept in the history
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// One recorded fault
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    /// Trace id
    pub id: Uuid,
    /// Wall-clock time of the fault
    pub timestamp: DateTime<Utc>,
    /// Monotonic time of the fault, used for windows
    #[serde(skip)]
    pub occurred_at: Instant,
    /// Operation key
    pub operation: String,
    /// Classified category
    pub category: ErrorCategory,
    /// Fault message
    pub message: String,
    /// Structured fault details
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
    /// 1-based attempt that failed (0 when the call was never made)
    pub attempt: u32,
    /// A later attempt of the same execution succeeded
    pub recovered: bool,
}

impl ErrorEvent {
    /// Event for `fault`, stamped now
    pub fn new(
        operation: impl Into<String>,
        category: ErrorCategory,
        fault: &Fault,
        attempt: u32,
    ) -> Self {
        let mut details = fault.details().clone();
        if let Some(status) = fault.status() {
            details.insert("status".to_string(), status.to_string());
        }
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            occurred_at: Instant::now(),
            operation: operation.into(),
            category,
            message: fault.message().to_string(),
            details,
            attempt,
            recovered: false,
        }
    }
}

/// Aggregate view over the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorStatistics {
    /// Faults recorded since the last reset
    pub total_errors: u64,
    /// Faults in the 60 seconds before the latest fault. Only refreshed when
    /// a fault is recorded; see [`ErrorStatsStore::current_error_rate`].
    pub error_rate_per_minute: u64,
    /// Faults per category
    pub per_category: BTreeMap<ErrorCategory, u64>,
    /// Faults per operation key
    pub per_operation: BTreeMap<String, u64>,
    /// Executions that succeeded after at least one fault
    pub successful_recoveries: u64,
    /// Executions that gave up (exhausted or non-retryable)
    pub failed_recoveries: u64,
    /// Retries scheduled
    pub retry_attempts: u64,
    /// Failed executions a category handler substituted a value for
    pub degraded_recoveries: u64,
    /// Time of the latest fault
    pub last_error_at: Option<DateTime<Utc>>,
}

impl ErrorStatistics {
    /// Faults recorded for `category`
    pub fn category_count(&self, category: ErrorCategory) -> u64 {
        self.per_category.get(&category).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    events: VecDeque<ErrorEvent>,
    stats: ErrorStatistics,
}

/// Bounded event history with counters
#[derive(Debug)]
pub struct ErrorStatsStore {
    capacity: usize,
    max_age: Option<Duration>,
    inner: Mutex<StoreInner>,
}

impl Default for ErrorStatsStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ErrorStatsStore {
    /// Store keeping at most `capacity` events (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            max_age: None,
            inner: Mutex::new(StoreInner {
                events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
                stats: ErrorStatistics::default(),
            }),
        }
    }

    /// Also evict events older than `max_age`
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Maximum events kept
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently kept
    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    /// No events kept
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an event, evicting by capacity and age.
    ///
    /// Returns the monotonic time the event was filed under. It is never
    /// earlier than the newest kept event, so the history stays ordered even
    /// when events are stamped on other threads before the lock is taken.
    pub fn record(&self, mut event: ErrorEvent) -> Instant {
        let mut inner = self.inner.lock();
        if let Some(newest) = inner.events.back() {
            event.occurred_at = event.occurred_at.max(newest.occurred_at);
        }
        let now = event.occurred_at;

        if let Some(cutoff) = self.max_age.and_then(|age| now.checked_sub(age)) {
            while inner.events.front().is_some_and(|e| e.occurred_at < cutoff) {
                inner.events.pop_front();
            }
        }
        while inner.events.len() >= self.capacity {
            inner.events.pop_front();
        }

        let stats = &mut inner.stats;
        stats.total_errors += 1;
        *stats.per_category.entry(event.category).or_insert(0) += 1;
        *stats.per_operation.entry(event.operation.clone()).or_insert(0) += 1;
        stats.last_error_at = Some(event.timestamp);

        inner.events.push_back(event);

        let rate = match now.checked_sub(RATE_WINDOW) {
            Some(since) => inner
                .events
                .iter()
                .rev()
                .take_while(|e| e.occurred_at >= since)
                .count(),
            None => inner.events.len(),
        };
        inner.stats.error_rate_per_minute = rate as u64;
        now
    }

    /// Kept faults in the last 60 seconds, measured from now
    pub fn current_error_rate(&self) -> u64 {
        let inner = self.inner.lock();
        let Some(since) = Instant::now().checked_sub(RATE_WINDOW) else {
            return inner.events.len() as u64;
        };
        inner
            .events
            .iter()
            .rev()
            .take_while(|e| e.occurred_at >= since)
            .count() as u64
    }

    /// Flag a kept event as recovered; false if it was already evicted
    pub fn mark_recovered(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock();
        match inner.events.iter_mut().rev().find(|e| e.id == id) {
            Some(event) => {
                event.recovered = true;
                true
            }
            None => false,
        }
    }

    /// Count a scheduled retry
    pub fn record_retry(&self) {
        self.inner.lock().stats.retry_attempts += 1;
    }

    /// Count an execution that succeeded after faults
    pub fn record_recovery(&self) {
        self.inner.lock().stats.successful_recoveries += 1;
    }

    /// Count an execution that gave up
    pub fn record_failed_recovery(&self) {
        self.inner.lock().stats.failed_recoveries += 1;
    }

    /// Count a handler substitution
    pub fn record_degraded_recovery(&self) {
        self.inner.lock().stats.degraded_recoveries += 1;
    }

    /// Events of `category` in the `window` ending at `at`, and the time of
    /// the earliest of them
    pub fn window_count(
        &self,
        category: ErrorCategory,
        at: Instant,
        window: Duration,
    ) -> (u32, Option<DateTime<Utc>>) {
        let inner = self.inner.lock();
        let since = at.checked_sub(window);
        let mut count = 0u32;
        let mut first = None;
        for event in inner.events.iter().rev() {
            if since.is_some_and(|since| event.occurred_at < since) {
                break;
            }
            if event.category == category && event.occurred_at <= at {
                count = count.saturating_add(1);
                first = Some(event.timestamp);
            }
        }
        (count, first)
    }

    /// Snapshot of the counters
    pub fn statistics(&self) -> ErrorStatistics {
        self.inner.lock().stats.clone()
    }

    /// Up to `limit` kept events, most recent first
    pub fn recent(&self, limit: usize) -> Vec<ErrorEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Clear history and counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.events.clear();
        inner.stats = ErrorStatistics::default();
    }
}
