//! Error types for reconciliation

use crate::types::CompositeKey;
use std::sync::LazyLock;

use regex::Regex;

/// Boxed error carried as a source
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A desired resource rejected before diffing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}: {reason}")]
pub struct ValidationError {
    pub key: CompositeKey,
    pub reason: String,
}

impl ValidationError {
    pub fn new(key: CompositeKey, reason: impl Into<String>) -> Self {
        Self {
            key,
            reason: reason.into(),
        }
    }
}

/// Failures that abort a reconciliation pass
///
/// Per-item apply failures never surface here; they are counted in the
/// summary instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Current server state could not be read
    #[error("failed to fetch {kind} from server: {source}")]
    FetchState {
        kind: &'static str,
        #[source]
        source: BoxError,
    },

    /// Schema templates could not be read
    #[error("failed to fetch {kind} schema: {source}")]
    FetchSchema {
        kind: &'static str,
        #[source]
        source: BoxError,
    },

    /// Lookups the adapter needs before diffing could not be loaded
    #[error("failed to prepare {kind} lookups: {source}")]
    Prepare {
        kind: &'static str,
        #[source]
        source: BoxError,
    },

    /// The tag list could not be read
    #[error("failed to load tags: {source}")]
    TagLookup {
        #[source]
        source: BoxError,
    },

    /// A referenced tag could not be created
    #[error("failed to create tag '{label}': {source}")]
    TagCreation {
        label: String,
        #[source]
        source: BoxError,
    },
}

impl SyncError {
    /// Whether the failure came from resolving tag dependencies
    pub fn is_dependency_error(&self) -> bool {
        matches!(self, Self::TagLookup { .. } | Self::TagCreation { .. })
    }
}

static IN_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(in use|is used by|being used|referenced by|currently used)\b")
        .expect("in-use pattern is valid")
});

/// Whether a backend error message says the resource is still referenced
pub fn is_in_use_message(message: &str) -> bool {
    IN_USE.is_match(message)
}
