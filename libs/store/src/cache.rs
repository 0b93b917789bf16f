//! Read-path cache fed by the store's watch stream.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use drift_api::{Object, ObjectKey};

use crate::{Store, StoreError, WatchEvent};

/// Read interface used by reconcilers.
///
/// Staleness is bounded by subscription lag, not by reconciler design:
/// the engine re-fetches on every run and treats the fetched object as
/// the newest known state.
#[async_trait]
pub trait ObjectCache<T: Object>: Send + Sync {
    /// Fetch by key. `None` means the object does not exist, which the
    /// engine treats as success.
    async fn get_by_key(&self, key: &ObjectKey) -> Result<Option<T>, StoreError>;
}

/// Local cache populated asynchronously from a store subscription.
///
/// Reads are served from the local map and never touch the store.
#[derive(Clone)]
pub struct Cache<T: Object> {
    objects: Arc<RwLock<HashMap<ObjectKey, T>>>,
}

impl<T: Object> Cache<T> {
    /// An empty cache. Call [`Cache::run`] to keep it synced.
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drain the store's watch stream into the local map until
    /// shutdown is signaled.
    pub async fn run(&self, store: Arc<dyn Store<T>>, mut shutdown: watch::Receiver<bool>) {
        let mut rx = store.subscribe();

        // Prime from a full list so reads are useful before the first
        // event arrives.
        self.resync(store.as_ref()).await;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => self.apply(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(kind = T::KIND, missed, "Cache lagged behind watch, resyncing");
                        self.resync(store.as_ref()).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(kind = T::KIND, "Watch stream closed, cache stopping");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(kind = T::KIND, "Cache shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn apply(&self, event: WatchEvent<T>) {
        let Ok(mut objects) = self.objects.write() else {
            warn!(kind = T::KIND, "Cache lock poisoned, dropping event");
            return;
        };
        match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                objects.insert(ObjectKey::of(&obj), obj);
            }
            WatchEvent::Deleted(obj) => {
                objects.remove(&ObjectKey::of(&obj));
            }
        }
    }

    async fn resync(&self, store: &dyn Store<T>) {
        match store.list().await {
            Ok(all) => {
                let Ok(mut objects) = self.objects.write() else {
                    warn!(kind = T::KIND, "Cache lock poisoned, skipping resync");
                    return;
                };
                objects.clear();
                for obj in all {
                    objects.insert(ObjectKey::of(&obj), obj);
                }
            }
            Err(e) => warn!(kind = T::KIND, error = %e, "Cache resync failed"),
        }
    }
}

impl<T: Object> Default for Cache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Object> ObjectCache<T> for Cache<T> {
    async fn get_by_key(&self, key: &ObjectKey) -> Result<Option<T>, StoreError> {
        let objects = self
            .objects
            .read()
            .map_err(|e| StoreError::Internal(format!("cache lock poisoned: {e}")))?;
        Ok(objects.get(key).cloned())
    }
}

/// Read-through cache view of an in-memory store.
///
/// The broadcast-fed [`Cache`] is eventually consistent; tests and the
/// engine's internal child lookups want read-your-writes, which an
/// in-memory store already provides.
#[async_trait]
impl<T: Object> ObjectCache<T> for crate::MemoryStore<T> {
    async fn get_by_key(&self, key: &ObjectKey) -> Result<Option<T>, StoreError> {
        match Store::get(self, key).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use drift_api::{TaskRun, TaskRunSpec};

    #[tokio::test]
    async fn test_cache_follows_store() {
        let store: Arc<MemoryStore<TaskRun>> = Arc::new(MemoryStore::new());
        let cache = Cache::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let runner = cache.clone();
        let store_for_cache: Arc<dyn Store<TaskRun>> = store.clone();
        let handle = tokio::spawn(async move {
            runner.run(store_for_cache, shutdown_rx).await;
        });

        let created = store
            .create(TaskRun::new("default", "a", TaskRunSpec::default()))
            .await
            .unwrap();
        let key = ObjectKey::of(&created);

        // The cache applies the event asynchronously.
        let mut found = None;
        for _ in 0..50 {
            if let Some(obj) = cache.get_by_key(&key).await.unwrap() {
                found = Some(obj);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(found.unwrap().metadata.name, "a");

        store.delete(&key).await.unwrap();
        for _ in 0..50 {
            if cache.get_by_key(&key).await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(cache.get_by_key(&key).await.unwrap().is_none());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
