//! # AgentCore Testing Infrastructure
//!
//! Testing utilities for the AgentCore resilience stack:
//! - Edge case faults with their expected categories
//! - Property-based testing strategies
//! - Scripted flaky operations
//! - Call recorders for callbacks and sinks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentcore_testing::*;
//!
//! // Fails twice with a 503, then returns 42
//! let flaky = FlakyOperation::new(2, |_| Fault::external("503").with_status(503), 42);
//! let value = coordinator.execute("external-dependency:lookup", || flaky.call()).await?;
//! assert_eq!(flaky.calls(), 3);
//!
//! // Property-based testing
//! proptest! {
//!     #[test]
//!     fn test_delays_bounded(retries in max_retries(), base in base_delay_ms()) {
//!         // ...
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use agentcore_error::{ErrorCategory, Fault};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

// ============================================================================
// Edge Case Faults
// ============================================================================

/// Faults covering every classification path
pub struct EdgeCaseFaults;

impl EdgeCaseFaults {
    /// Faults paired with the category the default chain assigns them
    pub fn classified() -> Vec<(Fault, ErrorCategory)> {
        vec![
            // Explicit tags
            (Fault::validation("urn must not be empty"), ErrorCategory::Validation),
            (Fault::rate_limited("slow down"), ErrorCategory::RateLimit),
            // HTTP status
            (Fault::new("request failed").with_status(401), ErrorCategory::Authentication),
            (Fault::new("request failed").with_status(403), ErrorCategory::Authorization),
            (Fault::new("request failed").with_status(404), ErrorCategory::NotFound),
            (Fault::new("request failed").with_status(429), ErrorCategory::RateLimit),
            (Fault::new("request failed").with_status(503), ErrorCategory::ExternalDependency),
            (Fault::new("request failed").with_status(504), ErrorCategory::Timeout),
            // Source type
            (
                Fault::new("socket").with_source(io::Error::new(io::ErrorKind::TimedOut, "t")),
                ErrorCategory::Timeout,
            ),
            (
                Fault::new("socket")
                    .with_source(io::Error::new(io::ErrorKind::ConnectionRefused, "r")),
                ErrorCategory::ExternalDependency,
            ),
            // Keywords
            (Fault::new("Token expired for user"), ErrorCategory::Authentication),
            (Fault::new("Too Many Requests"), ErrorCategory::RateLimit),
            (Fault::new("missing environment variable APS_CLIENT_ID"), ErrorCategory::Configuration),
            (Fault::new("model does not exist"), ErrorCategory::NotFound),
            // Nothing matches
            (Fault::new("index out of bounds"), ErrorCategory::Internal),
        ]
    }

    /// HTTP statuses that never classify as a failure
    pub fn unclassified_statuses() -> Vec<u16> {
        vec![100, 200, 204, 301, 304, 418]
    }
}

// ============================================================================
// Property-Based Testing Strategies
// ============================================================================

/// Any error category
pub fn any_category() -> impl Strategy<Value = ErrorCategory> {
    prop::sample::select(ErrorCategory::ALL.to_vec())
}

/// Categories retried by default
pub fn retryable_category() -> impl Strategy<Value = ErrorCategory> {
    any_category().prop_filter("retryable by default", ErrorCategory::is_retryable_by_default)
}

/// Categories never retried by default
pub fn non_retryable_category() -> impl Strategy<Value = ErrorCategory> {
    any_category().prop_filter("not retryable by default", |c| !c.is_retryable_by_default())
}

/// Retry counts
pub fn max_retries() -> impl Strategy<Value = u32> {
    0u32..=12
}

/// Base delays in milliseconds
pub fn base_delay_ms() -> impl Strategy<Value = u64> {
    0u64..=5_000
}

/// Valid (non-shrinking) backoff factors
pub fn backoff_factor() -> impl Strategy<Value = f64> {
    1.0f64..=4.0
}

/// HTTP statuses the status classifier recognises
pub fn failure_status() -> impl Strategy<Value = u16> {
    prop_oneof![
        prop::sample::select(vec![400u16, 401, 403, 404, 408, 410, 422, 429]),
        500u16..=599,
    ]
}

// ============================================================================
// Scripted Operations
// ============================================================================

type FaultFactory = Arc<dyn Fn(u32) -> Fault + Send + Sync>;

/// Operation that fails a fixed number of times, then succeeds
#[derive(Clone)]
pub struct FlakyOperation<T> {
    failures: u32,
    fault: FaultFactory,
    value: T,
    calls: Arc<AtomicU32>,
}

impl<T: Clone> FlakyOperation<T> {
    /// Fail `failures` times with `fault(call_number)`, then return `value`
    pub fn new<F>(failures: u32, fault: F, value: T) -> Self
    where
        F: Fn(u32) -> Fault + Send + Sync + 'static,
    {
        Self {
            failures,
            fault: Arc::new(fault),
            value,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Never succeeds
    pub fn always_failing<F>(fault: F, value: T) -> Self
    where
        F: Fn(u32) -> Fault + Send + Sync + 'static,
    {
        Self::new(u32::MAX, fault, value)
    }

    /// Invoke once
    pub async fn call(&self) -> Result<T, Fault> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            Err((self.fault)(n))
        } else {
            Ok(self.value.clone())
        }
    }

    /// Invocations so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Recorders
// ============================================================================

/// Thread-safe list of everything passed to a callback
#[derive(Debug)]
pub struct CallRecorder<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for CallRecorder<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> Default for CallRecorder<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> CallRecorder<T> {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a copy of `item`
    pub fn record(&self, item: &T) {
        self.items.lock().push(item.clone());
    }

    /// Everything recorded, in order
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }

    /// Number of recorded items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Nothing recorded yet
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_error::{ClassifierChain, HttpStatusClassifier};

    #[test]
    fn test_edge_case_faults_classify_as_labelled() {
        let chain = ClassifierChain::default();
        for (fault, expected) in EdgeCaseFaults::classified() {
            assert_eq!(chain.classify(&fault), expected, "fault: {}", fault);
        }
    }

    #[test]
    fn test_unclassified_statuses() {
        for status in EdgeCaseFaults::unclassified_statuses() {
            assert_eq!(HttpStatusClassifier::category_for_status(status), None);
        }
    }

    #[tokio::test]
    async fn test_flaky_operation_script() {
        let flaky = FlakyOperation::new(2, |n| Fault::external(format!("failure {n}")), "ok");
        assert_eq!(flaky.call().await.unwrap_err().message(), "failure 1");
        assert_eq!(flaky.call().await.unwrap_err().message(), "failure 2");
        assert_eq!(flaky.call().await.unwrap(), "ok");
        assert_eq!(flaky.calls(), 3);

        let clone = flaky.clone();
        clone.call().await.unwrap();
        assert_eq!(flaky.calls(), 4);
    }

    #[test]
    fn test_recorder_shared_between_clones() {
        let recorder = CallRecorder::new();
        let other = recorder.clone();
        other.record(&"alert");
        assert_eq!(recorder.items(), vec!["alert"]);
        assert_eq!(recorder.len(), 1);
    }

    proptest! {
        #[test]
        fn test_failure_statuses_always_classified(status in failure_status()) {
            prop_assert!(HttpStatusClassifier::category_for_status(status).is_some());
        }

        #[test]
        fn test_category_filters(r in retryable_category(), n in non_retryable_category()) {
            prop_assert!(r.is_retryable_by_default());
            prop_assert!(!n.is_retryable_by_default());
        }
    }
}
