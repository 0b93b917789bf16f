//! Namespaced object identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Object, ObjectMeta};

/// Namespaced key identifying one object of a kind.
///
/// Work queues, caches, and reconcilers all operate on keys, never on
/// payloads: by the time a reconciliation runs, the payload that
/// triggered it may be stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of the given metadata.
    pub fn of_meta(meta: &ObjectMeta) -> Self {
        Self::new(meta.namespace.clone(), meta.name.clone())
    }

    /// Key of the given object.
    pub fn of<T: Object>(obj: &T) -> Self {
        Self::of_meta(obj.metadata())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_namespace_slash_name() {
        let key = ObjectKey::new("default", "example-at");
        assert_eq!(key.to_string(), "default/example-at");
    }
}
