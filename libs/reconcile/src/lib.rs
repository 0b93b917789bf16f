//! # drift-reconcile
//!
//! Reconciliation loop primitives for level-triggered controllers.
//!
//! Key concepts:
//!
//! - **Level-triggered**: a reconciliation is a pure function of the
//!   newest observable state, never of the event that triggered it, so
//!   redundant runs are always safe.
//! - **Keys, not payloads**: queues carry object keys; the reconciler
//!   re-fetches on every run.
//! - **Coalescing**: duplicate enqueues of an in-flight key collapse
//!   into a single re-run.
//!
//! # Invariants
//!
//! - At most one reconciliation per key runs at a time
//! - Handlers are idempotent with respect to phase
//! - Errors requeue with exponential backoff; no error is swallowed

mod backoff;
mod controller;
mod hash;
mod queue;

pub use backoff::Backoff;
pub use controller::{Controller, ControllerConfig};
pub use hash::SpecHash;
pub use queue::WorkQueue;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use drift_api::ObjectKey;
use drift_store::StoreError;

/// Errors surfaced by a reconciliation handler.
///
/// Everything here is retryable: the driver requeues the key with
/// backoff and the next run recomputes from fresh state. NotFound on
/// fetch and AlreadyExists on child creation never reach this type;
/// they are folded into the success paths.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The resource's spec cannot be acted on (e.g. malformed
    /// schedule). Retried on the standard backoff; the user fixing the
    /// spec triggers an immediate re-run anyway.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    /// A concurrent writer won the compare-and-swap race.
    #[error("conflict: store has version {expected}, write carried {actual}")]
    Conflict { expected: u64, actual: u64 },

    /// An external side-effecting call failed.
    #[error("external call failed: {0}")]
    External(String),

    /// The store failed in a way other than a version conflict.
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { expected, actual } => Self::Conflict { expected, actual },
            other => Self::Store(other.to_string()),
        }
    }
}

/// Outcome of a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    /// When set, re-run for this key after the given delay.
    pub requeue_after: Option<Duration>,
}

impl Action {
    /// Done: nothing further to do until the next change event.
    pub fn done() -> Self {
        Self {
            requeue_after: None,
        }
    }

    /// Re-run after the given delay.
    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }
}

/// A per-key reconciliation handler.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Controller name, for logging.
    fn name(&self) -> &str;

    /// Drive the object identified by `key` one step toward its
    /// desired state. Must be safe to invoke any number of times.
    async fn reconcile(&self, key: ObjectKey) -> Result<Action, ReconcileError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_constructors() {
        assert_eq!(Action::done().requeue_after, None);
        assert_eq!(
            Action::requeue_after(Duration::from_secs(3)).requeue_after,
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_conflict_maps_from_store_error() {
        let err: ReconcileError = StoreError::Conflict {
            expected: 7,
            actual: 5,
        }
        .into();
        assert!(matches!(
            err,
            ReconcileError::Conflict {
                expected: 7,
                actual: 5
            }
        ));
    }
}
