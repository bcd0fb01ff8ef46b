//! Error types returned by the coordinator and its registries

use crate::circuit_breaker::CircuitOpenError;
use agentcore_error::{ErrorCategory, Fault};
use std::fmt;
use thiserror::Error;

/// Rejected registration or configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Backoff factor below 1.0 (or not a number)
    #[error("Invalid backoff factor {0}: must be a finite value >= 1.0")]
    InvalidBackoffFactor(f64),

    /// Threshold that can never (or always) trip
    #[error("Invalid threshold for {name}: {reason}")]
    InvalidThreshold {
        /// Which setting
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Unknown category name in a config file
    #[error(transparent)]
    UnknownCategory(#[from] agentcore_error::UnknownCategory),

    /// Config file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why an execution stopped before its retry budget ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancel token fired
    Cancelled,
    /// The caller's deadline passed
    DeadlineExceeded,
    /// The coordinator is shutting down
    Shutdown,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled by caller"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Shutdown => write!(f, "coordinator shutting down"),
        }
    }
}

/// Final outcome of a failed [`execute`](crate::ResilienceCoordinator::execute)
#[derive(Error, Debug)]
pub enum ResilienceError {
    /// The operation failed and was not (or no longer) retried
    #[error("Operation '{key}' failed after {attempts} attempt(s) [{category}]: {fault}")]
    Failed {
        /// Operation key
        key: String,
        /// Classified category of the last fault
        category: ErrorCategory,
        /// Attempts made
        attempts: u32,
        /// The last fault
        #[source]
        fault: Fault,
    },

    /// The circuit for the key is open; the operation was not invoked
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Cancellation or deadline stopped the execution
    #[error("Operation '{key}' stopped after {attempts} attempt(s): {reason}")]
    Cancelled {
        /// Operation key
        key: String,
        /// Attempts started
        attempts: u32,
        /// What stopped it
        reason: CancelReason,
    },

    /// The coordinator has been shut down
    #[error("Resilience coordinator is shut down")]
    Shutdown,

    /// The per-call retry policy was rejected; the operation was not invoked
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(#[from] ConfigError),
}

impl ResilienceError {
    /// Category used for statistics and alerting
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Failed { category, .. } => *category,
            Self::CircuitOpen(_) => ErrorCategory::ExternalDependency,
            Self::Cancelled { .. } | Self::Shutdown => ErrorCategory::Timeout,
            Self::InvalidPolicy(_) => ErrorCategory::Configuration,
        }
    }

    /// The underlying fault, when the operation itself failed
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Failed { fault, .. } => Some(fault),
            _ => None,
        }
    }

    /// Converts into a fault tagged with its category
    pub fn into_fault(self) -> Fault {
        let category = self.category();
        match self {
            Self::Failed { fault, .. } => fault.with_category(category),
            other => Fault::categorized(category, other.to_string()),
        }
    }

    /// Attempts made before giving up (0 when never invoked)
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Failed { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
            Self::CircuitOpen(_) | Self::Shutdown | Self::InvalidPolicy(_) => 0,
        }
    }

    /// Whether the circuit rejected the call
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }
}
