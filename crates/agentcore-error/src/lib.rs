//! # AgentCore Error
//!
//! This crate provides the closed error taxonomy shared by every AgentCore
//! component that calls out to an external API, an index, or a tool.
//!
//! ## Overview
//!
//! - [`ErrorCategory`] - The fixed set of fault categories
//! - [`Fault`] - The error every wrapped operation fails with
//! - [`Classifier`] / [`ClassifierChain`] - Maps a fault to exactly one category
//!
//! ## Example
//!
//! ```
//! use agentcore_error::{ClassifierChain, ErrorCategory, Fault};
//!
//! let chain = ClassifierChain::default();
//!
//! let fault = Fault::new("upstream returned 503").with_status(503);
//! assert_eq!(chain.classify(&fault), ErrorCategory::ExternalDependency);
//!
//! let fault = Fault::validation("urn must not be empty");
//! assert_eq!(chain.classify(&fault), ErrorCategory::Validation);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod classify;

pub use classify::{
    Classifier, ClassifierChain, HttpStatusClassifier, KeywordClassifier, SourceTypeClassifier,
    TaggedClassifier,
};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Boxed error used at trait-object boundaries (callbacks, fault sources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The closed set of fault categories.
///
/// Every recorded fault maps to exactly one category. The category drives
/// retry eligibility and alert bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ErrorCategory {
    /// The request itself is malformed
    Validation,
    /// Missing, invalid or expired credentials
    Authentication,
    /// Credentials are valid but lack permission
    Authorization,
    /// The requested resource does not exist
    NotFound,
    /// An upstream API, index or service failed
    ExternalDependency,
    /// The host is misconfigured
    Configuration,
    /// Anything unclassified
    Internal,
    /// The operation or a wait timed out or was cancelled
    Timeout,
    /// The upstream throttled the request
    RateLimit,
}

impl ErrorCategory {
    /// All categories, in declaration order
    pub const ALL: [ErrorCategory; 9] = [
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::Authorization,
        ErrorCategory::NotFound,
        ErrorCategory::ExternalDependency,
        ErrorCategory::Configuration,
        ErrorCategory::Internal,
        ErrorCategory::Timeout,
        ErrorCategory::RateLimit,
    ];

    /// Kebab-case name, also used as the operation key prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::NotFound => "not-found",
            Self::ExternalDependency => "external-dependency",
            Self::Configuration => "configuration",
            Self::Internal => "internal",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate-limit",
        }
    }

    /// Wire error code reported to API consumers
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::Authentication => "AUTHENTICATION_ERROR",
            Self::Authorization => "AUTHORIZATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::ExternalDependency => "EXTERNAL_SERVICE_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::RateLimit => "RATE_LIMIT_ERROR",
        }
    }

    /// Whether faults of this category are transient by default.
    ///
    /// Only external dependency failures, timeouts and rate limiting are
    /// retried unless a policy says otherwise.
    pub fn is_retryable_by_default(&self) -> bool {
        matches!(
            self,
            Self::ExternalDependency | Self::Timeout | Self::RateLimit
        )
    }

    /// Extracts the category prefix of an operation key such as
    /// `"external-dependency:model-index"`.
    pub fn from_operation_key(key: &str) -> Option<Self> {
        let (prefix, _) = key.split_once(':')?;
        prefix.parse().ok()
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown error category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for ErrorCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        ErrorCategory::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A failure raised by a wrapped operation.
///
/// A fault is a message plus optional hints for classification: an explicit
/// category tag, an HTTP status, and the underlying source error.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Fault {
    message: String,
    category: Option<ErrorCategory>,
    status: Option<u16>,
    details: BTreeMap<String, String>,
    #[source]
    source: Option<BoxError>,
}

impl Fault {
    /// Creates an untagged fault; classification decides its category
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: None,
            status: None,
            details: BTreeMap::new(),
            source: None,
        }
    }

    /// Creates a fault explicitly tagged with a category
    pub fn categorized(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self::new(message).with_category(category)
    }

    /// Validation fault
    pub fn validation(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::Validation, message)
    }

    /// Authentication fault
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::Authentication, message)
    }

    /// Authorization fault
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::Authorization, message)
    }

    /// Not-found fault
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::NotFound, message)
    }

    /// External dependency fault
    pub fn external(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::ExternalDependency, message)
    }

    /// Configuration fault
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::Configuration, message)
    }

    /// Internal fault
    pub fn internal(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::Internal, message)
    }

    /// Timeout fault
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::Timeout, message)
    }

    /// Rate-limit fault
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::categorized(ErrorCategory::RateLimit, message)
    }

    /// Wraps a foreign error, keeping it as the source
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(error.to_string()).with_source(error)
    }

    /// Tags the fault with an explicit category
    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Attaches the HTTP status returned by an upstream
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Adds a structured detail
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Attaches the underlying error
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// The human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Explicit category tag, if any
    pub fn category(&self) -> Option<ErrorCategory> {
        self.category
    }

    /// HTTP status, if any
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Structured details
    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }

    /// The underlying error, if any
    pub fn source_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Fault::from_error(err)
    }
}

impl From<tokio::time::error::Elapsed> for Fault {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Fault::timeout(err.to_string()).with_source(err)
    }
}

/// Convenient Result type using [`Fault`]
pub type Result<T> = std::result::Result<T, Fault>;

/// Extension trait for turning foreign errors into faults with context
pub trait ErrorContext<T> {
    /// Adds context to an error
    fn context(self, ctx: impl Into<String>) -> Result<T>;

    /// Adds context using a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Fault::new(format!("{}: {}", ctx.into(), e)).with_source(e))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| Fault::new(format!("{}: {}", f(), e)).with_source(e))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| Fault::not_found(ctx))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| Fault::not_found(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in ErrorCategory::ALL {
            assert_eq!(category.as_str().parse::<ErrorCategory>(), Ok(category));
        }
        assert_eq!(
            "EXTERNAL_DEPENDENCY".parse::<ErrorCategory>(),
            Ok(ErrorCategory::ExternalDependency)
        );
        assert!("bogus".parse::<ErrorCategory>().is_err());
    }

    #[test]
    fn test_category_from_operation_key() {
        assert_eq!(
            ErrorCategory::from_operation_key("external-dependency:model-index"),
            Some(ErrorCategory::ExternalDependency)
        );
        assert_eq!(
            ErrorCategory::from_operation_key("rate-limit:graphql"),
            Some(ErrorCategory::RateLimit)
        );
        assert_eq!(ErrorCategory::from_operation_key("model-index"), None);
        assert_eq!(ErrorCategory::from_operation_key("aec:lookup"), None);
    }

    #[test]
    fn test_default_retryability() {
        let retryable: Vec<_> = ErrorCategory::ALL
            .iter()
            .filter(|c| c.is_retryable_by_default())
            .copied()
            .collect();
        assert_eq!(
            retryable,
            vec![
                ErrorCategory::ExternalDependency,
                ErrorCategory::Timeout,
                ErrorCategory::RateLimit
            ]
        );
    }

    #[test]
    fn test_fault_display_and_details() {
        let fault = Fault::external("property service unavailable")
            .with_status(503)
            .with_detail("urn", "dXJuOmFkc2sud2lwcHJvZA");
        assert_eq!(fault.to_string(), "property service unavailable");
        assert_eq!(fault.category(), Some(ErrorCategory::ExternalDependency));
        assert_eq!(fault.status(), Some(503));
        assert_eq!(fault.details().get("urn").map(String::as_str), Some("dXJuOmFkc2sud2lwcHJvZA"));
    }

    #[test]
    fn test_fault_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let fault = Fault::from(io);
        assert!(fault.source().is_some());
        assert_eq!(fault.category(), None);
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file missing",
        ));

        let with_ctx = result.context("Failed to load config");
        let err = with_ctx.unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
        assert!(err.source_error().is_some());
    }

    #[test]
    fn test_option_context_is_not_found() {
        let missing: Option<u32> = None;
        let err = missing.with_context(|| "no model derivative".to_string()).unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::NotFound));
    }
}
