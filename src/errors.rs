use thiserror::Error;

/// Error type that captures common ledger failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("transaction not found: {0}")]
    NotFound(String),
    #[error("store error ({kind:?}): {message}")]
    Store {
        kind: StoreErrorKind,
        message: String,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Classifies persistence failures so read paths can decide how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The backend rejected a query because a compound sort index is missing.
    IndexMissing,
    /// Network or backend failure with no more specific classification.
    Unavailable,
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        LedgerError::NotFound(id.into())
    }

    pub fn index_missing(message: impl Into<String>) -> Self {
        LedgerError::Store {
            kind: StoreErrorKind::IndexMissing,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        LedgerError::Store {
            kind: StoreErrorKind::Unavailable,
            message: message.into(),
        }
    }

    /// True for persistence failures, the class that gets one automatic retry
    /// on read paths.
    pub fn is_store_error(&self) -> bool {
        matches!(self, LedgerError::Store { .. })
    }
}
