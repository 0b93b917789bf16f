//! Object metadata shared by every resource kind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity and bookkeeping fields carried by every API object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Namespace the object lives in.
    pub namespace: String,

    /// Object name, unique within (kind, namespace).
    pub name: String,

    /// Stable identity assigned by the store on create.
    #[serde(default)]
    pub uid: Option<Uuid>,

    /// Optimistic-concurrency token, bumped by the store on every write.
    #[serde(default)]
    pub resource_version: u64,

    /// Set by the store on create.
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,

    /// Set by the store when a delete is requested while finalizers
    /// remain; the object is only physically removed once the
    /// finalizer list empties.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    /// Delete-blocking markers owned by controllers.
    #[serde(default)]
    pub finalizers: Vec<String>,

    /// Labels for lookup and selection.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Back-references to the objects that own this one.
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Metadata for a new, not-yet-persisted object.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether a deletion has been requested.
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Whether the given finalizer token is present.
    pub fn has_finalizer(&self, token: &str) -> bool {
        self.finalizers.iter().any(|f| f == token)
    }

    /// Add a finalizer token. Idempotent.
    pub fn add_finalizer(&mut self, token: &str) {
        if !self.has_finalizer(token) {
            self.finalizers.push(token.to_string());
        }
    }

    /// Remove a finalizer token. Removing an absent token is a no-op.
    pub fn remove_finalizer(&mut self, token: &str) {
        self.finalizers.retain(|f| f != token);
    }

    /// The controlling owner reference, if any.
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }
}

/// Back-link from a child resource to the parent that created it.
///
/// Used for garbage collection and for routing the child's change
/// events back to the parent's reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerReference {
    /// Parent API kind.
    pub kind: String,

    /// Parent name (same namespace as the child).
    pub name: String,

    /// Parent UID.
    pub uid: Option<Uuid>,

    /// True when the owner is the managing controller.
    pub controller: bool,
}

impl OwnerReference {
    /// Build a controlling owner reference to the given parent.
    pub fn controller_of(kind: &str, meta: &ObjectMeta) -> Self {
        Self {
            kind: kind.to_string(),
            name: meta.name.clone(),
            uid: meta.uid,
            controller: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalizer_add_is_idempotent() {
        let mut meta = ObjectMeta::new("default", "vm-1");
        meta.add_finalizer("drift.io/protect");
        meta.add_finalizer("drift.io/protect");
        assert_eq!(meta.finalizers.len(), 1);
        assert!(meta.has_finalizer("drift.io/protect"));
    }

    #[test]
    fn test_remove_absent_finalizer_is_noop() {
        let mut meta = ObjectMeta::new("default", "vm-1");
        meta.remove_finalizer("drift.io/protect");
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn test_controller_owner() {
        let parent = ObjectMeta::new("default", "example-at");
        let mut child = ObjectMeta::new("default", "example-at-pod");
        child
            .owner_references
            .push(OwnerReference::controller_of("TaskRun", &parent));

        let owner = child.controller_owner().unwrap();
        assert_eq!(owner.kind, "TaskRun");
        assert_eq!(owner.name, "example-at");
    }
}
