//! # drift-store
//!
//! Store, cache, and event-sink collaborators for the drift control
//! plane, specified at their interface boundary:
//!
//! - [`Store`]: exclusive source of truth; compare-and-swap writes and
//!   a broadcast stream of change events
//! - [`ObjectCache`]: read path for reconcilers; never blocks on the
//!   store write path
//! - [`EventRecorder`]: fire-and-forget human-observable notifications
//!
//! The in-memory implementations ([`MemoryStore`], [`Cache`],
//! [`MemoryRecorder`]) back the dev-mode binary and the test suites.

mod cache;
mod error;
mod recorder;
mod store;

pub use cache::*;
pub use error::StoreError;
pub use recorder::*;
pub use store::*;
