//! # drift-api
//!
//! Resource type definitions for the drift control plane.
//!
//! ## Design Principles
//!
//! - Spec is written only by the resource's owner; Status only by the
//!   controller that reconciles the kind
//! - Resource versions are monotonic and drive optimistic concurrency
//! - Change detection is plain structural equality on a clone, never
//!   runtime type inspection
//! - Phase transitions are monotonic: a resource never moves backward

mod key;
mod machine;
mod meta;
mod phase;
mod pod;
mod taskrun;

pub use key::*;
pub use machine::*;
pub use meta::*;
pub use phase::*;
pub use pod::*;
pub use taskrun::*;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A reconcilable API object.
///
/// Structural equality (`PartialEq`) is the change-detection contract:
/// the engine clones the cached object, mutates the clone, and persists
/// only when clone != original.
pub trait Object:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// API kind, used in owner references and event object refs.
    const KIND: &'static str;

    /// Object metadata.
    fn metadata(&self) -> &ObjectMeta;

    /// Mutable object metadata.
    fn metadata_mut(&mut self) -> &mut ObjectMeta;
}
