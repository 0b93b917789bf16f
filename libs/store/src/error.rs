//! Error types for store operations.

use thiserror::Error;

/// Errors returned by the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist. On the reconciler fetch path this is
    /// success, not an error: the object was deleted between enqueue
    /// and fetch.
    #[error("object not found: {0}")]
    NotFound(String),

    /// An object with the same key already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// Compare-and-swap rejected a stale write. Always retryable; the
    /// next reconciliation recomputes from fresh state.
    #[error("version conflict: store has {expected}, write carried {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// Internal store failure.
    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Whether the error is the benign not-found case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error is the benign already-exists case.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
