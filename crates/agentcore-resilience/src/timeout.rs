//! Deadlines, per-attempt timeouts and cancellation
//!
//! Everything here runs on `tokio::time`, so a paused test clock drives it.

use agentcore_error::Fault;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

/// Execute a future with a timeout.
///
/// Expiry becomes a Timeout fault naming the operation.
pub async fn with_timeout<T>(
    duration: Duration,
    operation: &str,
    future: impl Future<Output = Result<T, Fault>>,
) -> Result<T, Fault> {
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Fault::timeout(format!(
            "Operation '{}' timed out after {:?}",
            operation, duration
        ))
        .with_detail("timeout_ms", duration.as_millis().to_string())),
    }
}

/// Deadline tracking for a whole execution, retries included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Create a deadline `timeout` from now
    pub fn new(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }

    /// Check if deadline has passed
    pub fn is_expired(&self) -> bool {
        self.start.elapsed() >= self.timeout
    }

    /// Get remaining time
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.start.elapsed())
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Check if enough time remains for an operation
    pub fn has_time_for(&self, operation_estimate: Duration) -> bool {
        self.remaining() >= operation_estimate
    }

    /// The instant the deadline passes, if representable
    pub fn expires_at(&self) -> Option<Instant> {
        self.start.checked_add(self.timeout)
    }

    /// Resolves once the deadline has passed
    pub async fn expired(&self) {
        match self.expires_at() {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

/// Cooperative cancellation signal shared between a caller and `execute`.
///
/// Clones observe the same signal. Cancelling is permanent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that has not been cancelled
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation to every clone
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
