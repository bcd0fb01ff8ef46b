//! Breaker health reporting
//!
//! Maps every circuit breaker to a [`HealthStatus`] and rolls them up into
//! one [`HealthReport`].

use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is degraded but functional
    Degraded,
    /// Service is unhealthy
    Unhealthy,
    /// Health status is unknown
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl From<CircuitState> for HealthStatus {
    fn from(state: CircuitState) -> Self {
        match state {
            CircuitState::Closed => Self::Healthy,
            CircuitState::HalfOpen => Self::Degraded,
            CircuitState::Open => Self::Unhealthy,
        }
    }
}

/// Health of one breaker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerHealth {
    /// Operation key
    pub name: String,
    /// Status derived from the state
    pub status: HealthStatus,
    /// Breaker state
    pub state: CircuitState,
    /// Current failure count
    pub failure_count: u32,
    /// Calls rejected so far
    pub rejected_calls: u64,
    /// Time since the circuit opened
    pub open_for: Option<Duration>,
}

impl BreakerHealth {
    /// Snapshot of `breaker`
    pub fn of(breaker: &CircuitBreaker) -> Self {
        let metrics = breaker.metrics();
        Self {
            name: breaker.config().name.clone(),
            status: metrics.state.into(),
            state: metrics.state,
            failure_count: metrics.failure_count,
            rejected_calls: metrics.rejected_calls,
            open_for: metrics.open_for,
        }
    }
}

/// Health report for all breakers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Worst status of any breaker; Unknown when there are none
    pub overall: HealthStatus,
    /// Individual breaker reports, sorted by name
    pub breakers: Vec<BreakerHealth>,
    /// When report was generated
    pub generated_at: DateTime<Utc>,
}

impl HealthReport {
    /// Roll up breaker snapshots
    pub fn new(mut breakers: Vec<BreakerHealth>) -> Self {
        breakers.sort_by(|a, b| a.name.cmp(&b.name));

        let overall = if breakers.is_empty() {
            HealthStatus::Unknown
        } else if breakers.iter().any(|b| b.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if breakers.iter().any(|b| b.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        Self {
            overall,
            breakers,
            generated_at: Utc::now(),
        }
    }

    /// Check if all breakers are healthy
    pub fn is_healthy(&self) -> bool {
        self.overall == HealthStatus::Healthy
    }

    /// Report for one breaker
    pub fn breaker(&self, name: &str) -> Option<&BreakerHealth> {
        self.breakers.iter().find(|b| b.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;

    #[test]
    fn test_status_from_state() {
        assert_eq!(HealthStatus::from(CircuitState::Closed), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from(CircuitState::HalfOpen), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from(CircuitState::Open), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_empty_report_is_unknown() {
        let report = HealthReport::new(Vec::new());
        assert_eq!(report.overall, HealthStatus::Unknown);
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn test_overall_is_worst() {
        let ok = CircuitBreaker::with_name("b-ok");
        let down = CircuitBreaker::new(CircuitBreakerConfig::new("a-down"));
        down.force_open();

        let report = HealthReport::new(vec![BreakerHealth::of(&ok), BreakerHealth::of(&down)]);
        assert_eq!(report.overall, HealthStatus::Unhealthy);
        assert_eq!(report.breakers[0].name, "a-down");
        assert!(report.breaker("a-down").unwrap().open_for.is_some());
        assert_eq!(report.breaker("b-ok").unwrap().status, HealthStatus::Healthy);

        down.force_close();
        let report = HealthReport::new(vec![BreakerHealth::of(&ok), BreakerHealth::of(&down)]);
        assert!(report.is_healthy());
    }

    #[test]
    fn test_health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(HealthStatus::Degraded.to_string(), "degraded");
        assert_eq!(HealthStatus::Unhealthy.to_string(), "unhealthy");
        assert_eq!(HealthStatus::Unknown.to_string(), "unknown");
    }
}
