//! Fault classification
//!
//! Maps a [`Fault`] to exactly one [`ErrorCategory`] through an ordered chain
//! of classifiers. The chain is total: when nothing matches it falls back to
//! the caller's hint and finally to [`ErrorCategory::Internal`].

use crate::{ErrorCategory, Fault};
use std::error::Error;
use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;

/// A single classification rule
pub trait Classifier: Send + Sync {
    /// Returns the category if this rule recognises the fault
    fn classify(&self, fault: &Fault) -> Option<ErrorCategory>;

    /// Name for logging
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Classifier for F
where
    F: Fn(&Fault) -> Option<ErrorCategory> + Send + Sync,
{
    fn classify(&self, fault: &Fault) -> Option<ErrorCategory> {
        self(fault)
    }
}

/// Honors the category a fault was explicitly tagged with
#[derive(Debug, Clone, Default)]
pub struct TaggedClassifier;

impl Classifier for TaggedClassifier {
    fn classify(&self, fault: &Fault) -> Option<ErrorCategory> {
        fault.category()
    }

    fn name(&self) -> &str {
        "tagged"
    }
}

/// Classifies by the HTTP status an upstream returned
#[derive(Debug, Clone, Default)]
pub struct HttpStatusClassifier;

impl HttpStatusClassifier {
    /// Category for an HTTP status code, if it denotes a failure
    pub fn category_for_status(status: u16) -> Option<ErrorCategory> {
        match status {
            400 | 422 => Some(ErrorCategory::Validation),
            401 => Some(ErrorCategory::Authentication),
            403 => Some(ErrorCategory::Authorization),
            404 | 410 => Some(ErrorCategory::NotFound),
            408 | 504 => Some(ErrorCategory::Timeout),
            429 => Some(ErrorCategory::RateLimit),
            500..=599 => Some(ErrorCategory::ExternalDependency),
            _ => None,
        }
    }
}

impl Classifier for HttpStatusClassifier {
    fn classify(&self, fault: &Fault) -> Option<ErrorCategory> {
        fault.status().and_then(Self::category_for_status)
    }

    fn name(&self) -> &str {
        "http-status"
    }
}

/// Classifies by the concrete type of the fault's source chain
#[derive(Debug, Clone, Default)]
pub struct SourceTypeClassifier;

impl SourceTypeClassifier {
    fn category_for_io(kind: ErrorKind) -> Option<ErrorCategory> {
        match kind {
            ErrorKind::TimedOut => Some(ErrorCategory::Timeout),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::AddrNotAvailable
            | ErrorKind::UnexpectedEof => Some(ErrorCategory::ExternalDependency),
            ErrorKind::NotFound => Some(ErrorCategory::NotFound),
            ErrorKind::PermissionDenied => Some(ErrorCategory::Authorization),
            ErrorKind::InvalidInput | ErrorKind::InvalidData => Some(ErrorCategory::Validation),
            _ => None,
        }
    }
}

impl Classifier for SourceTypeClassifier {
    fn classify(&self, fault: &Fault) -> Option<ErrorCategory> {
        let mut current: Option<&(dyn Error + 'static)> =
            fault.source_error().map(|e| e as &(dyn Error + 'static));

        while let Some(err) = current {
            if let Some(io) = err.downcast_ref::<std::io::Error>() {
                if let Some(category) = Self::category_for_io(io.kind()) {
                    return Some(category);
                }
            }
            if err.is::<tokio::time::error::Elapsed>() {
                return Some(ErrorCategory::Timeout);
            }
            current = err.source();
        }
        None
    }

    fn name(&self) -> &str {
        "source-type"
    }
}

/// Classifies by well-known phrases in the fault message
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier;

const KEYWORDS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Authentication,
        &[
            "unauthorized",
            "unauthenticated",
            "invalid token",
            "expired token",
            "token expired",
            "authentication",
        ],
    ),
    (
        ErrorCategory::Authorization,
        &["forbidden", "permission denied", "access denied", "not authorized"],
    ),
    (
        ErrorCategory::RateLimit,
        &["rate limit", "too many requests", "quota", "throttl"],
    ),
    (
        ErrorCategory::Timeout,
        &["timeout", "timed out", "deadline exceeded"],
    ),
    (
        ErrorCategory::ExternalDependency,
        &[
            "connection",
            "service unavailable",
            "bad gateway",
            "upstream",
            "network",
            "dns",
            "temporary failure",
        ],
    ),
    (
        ErrorCategory::Configuration,
        &["config", "setting", "environment variable"],
    ),
    (
        ErrorCategory::NotFound,
        &["not found", "no such", "does not exist"],
    ),
    (
        ErrorCategory::Validation,
        &["invalid", "validation", "malformed", "must not be", "required field"],
    ),
];

impl Classifier for KeywordClassifier {
    fn classify(&self, fault: &Fault) -> Option<ErrorCategory> {
        let msg = fault.message().to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| msg.contains(w)))
            .map(|(category, _)| *category)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Ordered chain of classifiers; the first match wins
#[derive(Clone)]
pub struct ClassifierChain {
    classifiers: Vec<Arc<dyn Classifier>>,
}

impl Default for ClassifierChain {
    /// Tagged, HTTP status, source type, then keywords
    fn default() -> Self {
        Self {
            classifiers: vec![
                Arc::new(TaggedClassifier),
                Arc::new(HttpStatusClassifier),
                Arc::new(SourceTypeClassifier),
                Arc::new(KeywordClassifier),
            ],
        }
    }
}

impl fmt::Debug for ClassifierChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.classifiers.iter().map(|c| c.name()))
            .finish()
    }
}

impl ClassifierChain {
    /// Creates an empty chain (everything classifies as the fallback)
    pub fn empty() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }

    /// Appends a classifier with the lowest precedence
    pub fn push(&mut self, classifier: Arc<dyn Classifier>) {
        self.classifiers.push(classifier);
    }

    /// Inserts a classifier with the highest precedence
    pub fn push_front(&mut self, classifier: Arc<dyn Classifier>) {
        self.classifiers.insert(0, classifier);
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, classifier: impl Classifier + 'static) -> Self {
        self.push(Arc::new(classifier));
        self
    }

    /// Number of classifiers in the chain
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    /// Whether the chain has no classifiers
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    /// Classifies a fault, falling back to [`ErrorCategory::Internal`]
    pub fn classify(&self, fault: &Fault) -> ErrorCategory {
        self.classify_with_hint(fault, None)
    }

    /// Classifies a fault, falling back to `hint` and then to Internal
    pub fn classify_with_hint(&self, fault: &Fault, hint: Option<ErrorCategory>) -> ErrorCategory {
        self.classifiers
            .iter()
            .find_map(|c| c.classify(fault))
            .or(hint)
            .unwrap_or(ErrorCategory::Internal)
    }
}
