//! Source-of-truth store interface and in-memory implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use drift_api::{Object, ObjectKey};

use crate::StoreError;

/// Change event delivered on a store subscription.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
}

impl<T: Object> WatchEvent<T> {
    /// The object carried by the event.
    pub fn object(&self) -> &T {
        match self {
            Self::Added(o) | Self::Modified(o) | Self::Deleted(o) => o,
        }
    }

    /// Key of the object carried by the event.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::of(self.object())
    }
}

/// Exclusive source of truth for one resource kind.
///
/// All writes use optimistic concurrency: `update` compares the
/// object's resource version against the stored one and rejects stale
/// writes with [`StoreError::Conflict`], never merging.
#[async_trait]
pub trait Store<T: Object>: Send + Sync {
    /// Fetch by key.
    async fn get(&self, key: &ObjectKey) -> Result<T, StoreError>;

    /// Create a new object, assigning identity and version 1.
    async fn create(&self, obj: T) -> Result<T, StoreError>;

    /// Compare-and-swap update keyed on the object's resource version.
    async fn update(&self, obj: T) -> Result<T, StoreError>;

    /// Request deletion. While finalizers remain this only stamps the
    /// deletion timestamp; the object is physically removed once an
    /// update empties the finalizer list.
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;

    /// List all objects.
    async fn list(&self) -> Result<Vec<T>, StoreError>;

    /// Subscribe to change events.
    fn subscribe(&self) -> broadcast::Receiver<WatchEvent<T>>;
}

/// In-memory store with broadcast watch, for dev mode and tests.
pub struct MemoryStore<T: Object> {
    objects: RwLock<HashMap<ObjectKey, T>>,
    version: AtomicU64,
    events: broadcast::Sender<WatchEvent<T>>,
}

impl<T: Object> MemoryStore<T> {
    /// An empty store.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            objects: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            events,
        }
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, event: WatchEvent<T>) {
        // No receivers is fine: watch is fire-and-forget.
        let _ = self.events.send(event);
    }

    fn locked(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<ObjectKey, T>>, StoreError> {
        self.objects
            .write()
            .map_err(|e| StoreError::Internal(format!("store lock poisoned: {e}")))
    }
}

impl<T: Object> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Object> Store<T> for MemoryStore<T> {
    async fn get(&self, key: &ObjectKey) -> Result<T, StoreError> {
        let objects = self
            .objects
            .read()
            .map_err(|e| StoreError::Internal(format!("store lock poisoned: {e}")))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn create(&self, mut obj: T) -> Result<T, StoreError> {
        let key = ObjectKey::of(&obj);
        let mut objects = self.locked()?;
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        let meta = obj.metadata_mut();
        meta.uid = Some(Uuid::new_v4());
        meta.resource_version = self.next_version();
        meta.creation_timestamp = Some(Utc::now());

        objects.insert(key.clone(), obj.clone());
        drop(objects);

        debug!(kind = T::KIND, key = %key, "Object created");
        self.publish(WatchEvent::Added(obj.clone()));
        Ok(obj)
    }

    async fn update(&self, mut obj: T) -> Result<T, StoreError> {
        let key = ObjectKey::of(&obj);
        let mut objects = self.locked()?;
        let current = objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let expected = current.metadata().resource_version;
        let actual = obj.metadata().resource_version;
        if expected != actual {
            return Err(StoreError::Conflict { expected, actual });
        }

        obj.metadata_mut().resource_version = self.next_version();

        // Cooperative deletion completes once the finalizer list of a
        // deleting object empties.
        let meta = obj.metadata();
        if meta.is_deleting() && meta.finalizers.is_empty() {
            objects.remove(&key);
            drop(objects);
            debug!(kind = T::KIND, key = %key, "Object finalized and removed");
            self.publish(WatchEvent::Deleted(obj.clone()));
            return Ok(obj);
        }

        objects.insert(key.clone(), obj.clone());
        drop(objects);
        self.publish(WatchEvent::Modified(obj.clone()));
        Ok(obj)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let mut objects = self.locked()?;
        let Some(current) = objects.get_mut(key) else {
            return Err(StoreError::NotFound(key.to_string()));
        };

        if current.metadata().finalizers.is_empty() {
            let gone = objects
                .remove(key)
                .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
            drop(objects);
            debug!(kind = T::KIND, key = %key, "Object deleted");
            self.publish(WatchEvent::Deleted(gone));
            return Ok(());
        }

        // Finalizers present: stamp the deletion timestamp and wait for
        // controllers to release the object.
        if current.metadata().deletion_timestamp.is_none() {
            current.metadata_mut().deletion_timestamp = Some(Utc::now());
            current.metadata_mut().resource_version = self.next_version();
            let updated = current.clone();
            drop(objects);
            debug!(kind = T::KIND, key = %key, "Deletion requested, finalizers pending");
            self.publish(WatchEvent::Modified(updated));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<T>, StoreError> {
        let objects = self
            .objects
            .read()
            .map_err(|e| StoreError::Internal(format!("store lock poisoned: {e}")))?;
        Ok(objects.values().cloned().collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<WatchEvent<T>> {
        self.events.subscribe()
    }
}
