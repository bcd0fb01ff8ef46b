//! Property-based tests for retry schedules, breakers and classification

use agentcore_error::{ClassifierChain, ErrorCategory, Fault, HttpStatusClassifier};
use agentcore_resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ErrorEvent, ErrorStatsStore, RetryPolicy,
    RetryStrategy,
};
use agentcore_testing::*;
use proptest::prelude::*;
use std::time::Duration;

fn any_strategy() -> impl Strategy<Value = RetryStrategy> {
    prop_oneof![
        Just(RetryStrategy::Exponential),
        Just(RetryStrategy::Linear),
        Just(RetryStrategy::Fixed),
        Just(RetryStrategy::Immediate),
    ]
}

// ============================================================================
// Retry Schedules
// ============================================================================

proptest! {
    #[test]
    fn test_exponential_delays_monotonic_and_bounded(
        retries in max_retries(),
        base in base_delay_ms(),
        factor in backoff_factor(),
        cap in 0u64..=60_000,
    ) {
        let policy = RetryPolicy::new()
            .with_max_retries(retries)
            .with_base_delay(Duration::from_millis(base))
            .with_backoff_factor(factor)
            .with_max_delay(Duration::from_millis(cap));

        let delays: Vec<_> = policy.delays().collect();
        prop_assert_eq!(delays.len() as u32, retries);
        for pair in delays.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for delay in &delays {
            prop_assert!(*delay <= policy.max_delay);
        }
    }

    #[test]
    fn test_no_delay_past_budget(
        retries in max_retries(),
        strategy in any_strategy(),
        jitter in any::<bool>(),
        base in base_delay_ms(),
    ) {
        let policy = RetryPolicy::new()
            .with_max_retries(retries)
            .with_strategy(strategy)
            .with_base_delay(Duration::from_millis(base))
            .with_jitter(jitter);

        prop_assert_eq!(policy.next_delay(0), None);
        prop_assert_eq!(policy.next_delay(retries + 1), None);
        prop_assert_eq!(policy.max_attempts(), retries + 1);
        for attempt in 1..=retries {
            prop_assert!(policy.next_delay(attempt).is_some());
        }
    }

    #[test]
    fn test_jitter_never_exceeds_plain_delay(
        retries in 1u32..=12,
        base in base_delay_ms(),
        attempt_seed in any::<u32>(),
    ) {
        let plain = RetryPolicy::new()
            .with_max_retries(retries)
            .with_base_delay(Duration::from_millis(base));
        let jittered = plain.clone().with_jitter(true);
        let attempt = attempt_seed % retries + 1;

        let full = plain.next_delay(attempt).unwrap();
        let delay = jittered.next_delay(attempt).unwrap();
        // float conversion may be off by a nanosecond
        let slack = Duration::from_micros(1);
        prop_assert!(delay <= full + slack);
        prop_assert!(delay + slack >= full / 2);
    }

    #[test]
    fn test_default_retryable_set(category in any_category()) {
        let policy = RetryPolicy::default();
        prop_assert_eq!(policy.is_retryable(category), category.is_retryable_by_default());
        prop_assert_eq!(RetryPolicy::no_retry().next_delay(1), None);
    }
}

// ============================================================================
// Classification
// ============================================================================

proptest! {
    #[test]
    fn test_tagged_faults_keep_their_category(category in any_category(), msg in ".{0,40}") {
        let fault = Fault::categorized(category, msg).with_status(500);
        prop_assert_eq!(ClassifierChain::default().classify(&fault), category);
    }

    #[test]
    fn test_status_wins_over_hint(status in failure_status(), hint in any_category()) {
        let fault = Fault::new("request failed").with_status(status);
        let expected = HttpStatusClassifier::category_for_status(status).unwrap();
        prop_assert_eq!(
            ClassifierChain::default().classify_with_hint(&fault, Some(hint)),
            expected
        );
    }

    #[test]
    fn test_category_names_parse_back(category in any_category()) {
        prop_assert_eq!(category.as_str().parse::<ErrorCategory>().unwrap(), category);
        let key = format!("{}:anything", category.as_str());
        prop_assert_eq!(ErrorCategory::from_operation_key(&key), Some(category));
    }
}

// ============================================================================
// Circuit Breaker
// ============================================================================

proptest! {
    #[test]
    fn test_opens_exactly_at_threshold(threshold in 1u32..=20) {
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new("prop").with_failure_threshold(threshold),
        );
        for _ in 1..threshold {
            cb.record_failure();
            prop_assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure();
        prop_assert_eq!(cb.state(), CircuitState::Open);
        prop_assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_success_resets_failure_run(threshold in 2u32..=20, run in 1u32..=19) {
        let run = run.min(threshold - 1);
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new("prop").with_failure_threshold(threshold),
        );
        for _ in 0..run {
            cb.record_failure();
        }
        cb.record_success();
        prop_assert_eq!(cb.metrics().failure_count, 0);
        for _ in 1..threshold {
            cb.record_failure();
        }
        prop_assert_eq!(cb.state(), CircuitState::Closed);
    }
}

// ============================================================================
// Statistics Store
// ============================================================================

proptest! {
    #[test]
    fn test_history_bounded_counters_cumulative(
        capacity in 1usize..=50,
        categories in prop::collection::vec(any_category(), 0..120),
    ) {
        let store = ErrorStatsStore::new(capacity);
        for (i, category) in categories.iter().enumerate() {
            let fault = Fault::categorized(*category, format!("fault {i}"));
            store.record(ErrorEvent::new("prop:op", *category, &fault, 1));
        }

        prop_assert!(store.len() <= capacity);
        let stats = store.statistics();
        prop_assert_eq!(stats.total_errors as usize, categories.len());
        let per_category: u64 = stats.per_category.values().sum();
        prop_assert_eq!(per_category as usize, categories.len());
        prop_assert_eq!(store.statistics(), stats);
    }
}
