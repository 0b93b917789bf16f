//! Controller driver: a bounded worker pool over the work queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use drift_api::{Object, ObjectKey};
use drift_store::WatchEvent;

use crate::{Backoff, Reconciler, WorkQueue};

/// Driver configuration with documented defaults.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Number of concurrent reconciliations across distinct keys.
    /// Default 1.
    pub workers: usize,

    /// First retry delay after a failure. Default 500ms.
    pub backoff_base: Duration,

    /// Retry delay cap. Default 60s.
    pub backoff_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Drives a [`Reconciler`] from a deduplicating work queue.
///
/// Change notifications enqueue keys; workers drain them, at most one
/// in-flight reconciliation per key. A slow reconciliation stalls only
/// its own worker slot, never event delivery.
pub struct Controller<R: Reconciler> {
    reconciler: Arc<R>,
    queue: Arc<WorkQueue>,
    backoff: Arc<Backoff>,
    config: ControllerConfig,
}

impl<R: Reconciler> Controller<R> {
    /// A controller for the given reconciler.
    pub fn new(reconciler: R, config: ControllerConfig) -> Self {
        let backoff = Arc::new(Backoff::new(config.backoff_base, config.backoff_max));
        Self {
            reconciler: Arc::new(reconciler),
            queue: WorkQueue::new(),
            backoff,
            config,
        }
    }

    /// The controller's queue, for enqueuing keys directly.
    pub fn queue(&self) -> Arc<WorkQueue> {
        Arc::clone(&self.queue)
    }

    /// Forward watch events for the reconciled kind: every event
    /// enqueues the object's own key.
    pub fn watch<T: Object>(
        &self,
        mut rx: broadcast::Receiver<WatchEvent<T>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = self.queue();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(event) => queue.add(event.key()),
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // Level-triggered handlers re-fetch, so a
                            // missed notification only delays work.
                            warn!(kind = T::KIND, missed, "Watch forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Forward watch events for an owned child kind: each event
    /// enqueues the *parent's* key from the child's controlling owner
    /// reference, re-triggering the parent's reconciliation.
    pub fn watch_owned<T: Object>(
        &self,
        mut rx: broadcast::Receiver<WatchEvent<T>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = self.queue();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(event) => {
                            let meta = event.object().metadata();
                            if let Some(owner) = meta.controller_owner() {
                                queue.add(ObjectKey::new(
                                    meta.namespace.clone(),
                                    owner.name.clone(),
                                ));
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(kind = T::KIND, missed, "Owned-watch forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Run workers until shutdown. In-flight reconciliations finish
    /// naturally; there is no mid-reconciliation cancellation.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            controller = self.reconciler.name(),
            workers = self.config.workers,
            "Starting controller"
        );

        let stopper = {
            let queue = self.queue();
            tokio::spawn(async move {
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
                queue.shut_down();
            })
        };

        let mut workers = Vec::with_capacity(self.config.workers);
        for worker_id in 0..self.config.workers {
            let reconciler = Arc::clone(&self.reconciler);
            let queue = self.queue();
            let backoff = Arc::clone(&self.backoff);
            workers.push(tokio::spawn(async move {
                while let Some(key) = queue.get().await {
                    match reconciler.reconcile(key.clone()).await {
                        Ok(action) => {
                            backoff.reset(&key);
                            if let Some(delay) = action.requeue_after {
                                debug!(
                                    controller = reconciler.name(),
                                    %key,
                                    delay_ms = delay.as_millis() as u64,
                                    "Requeueing"
                                );
                                queue.add_after(key.clone(), delay);
                            }
                        }
                        Err(e) => {
                            let delay = backoff.next_delay(&key);
                            warn!(
                                controller = reconciler.name(),
                                %key,
                                error = %e,
                                retry_in_ms = delay.as_millis() as u64,
                                "Reconciliation failed"
                            );
                            queue.add_after(key.clone(), delay);
                        }
                    }
                    queue.done(&key);
                }
                debug!(controller = reconciler.name(), worker_id, "Worker stopped");
            }));
        }

        for worker in workers {
            let _ = worker.await;
        }
        stopper.abort();
        info!(controller = self.reconciler.name(), "Controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::{Action, ReconcileError};

    /// Counts reconciliations per key; fails a key a configured number
    /// of times before succeeding.
    struct CountingReconciler {
        counts: Mutex<HashMap<ObjectKey, u32>>,
        fail_first: u32,
    }

    impl CountingReconciler {
        fn new(fail_first: u32) -> Self {
            Self {
                counts: Mutex::new(HashMap::new()),
                fail_first,
            }
        }

        fn count(&self, key: &ObjectKey) -> u32 {
            self.counts
                .lock()
                .unwrap()
                .get(key)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl Reconciler for Arc<CountingReconciler> {
        fn name(&self) -> &str {
            "counting"
        }

        async fn reconcile(&self, key: ObjectKey) -> Result<Action, ReconcileError> {
            let attempt = {
                let mut counts = self.counts.lock().unwrap();
                let count = counts.entry(key).or_insert(0);
                *count += 1;
                *count
            };
            if attempt <= self.fail_first {
                return Err(ReconcileError::External("backend down".to_string()));
            }
            Ok(Action::done())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_retry_with_backoff_until_success() {
        let inner = Arc::new(CountingReconciler::new(2));
        let controller = Controller::new(Arc::clone(&inner), ControllerConfig::default());
        let queue = controller.queue();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn({
            let shutdown_rx = shutdown_rx.clone();
            async move { controller.run(shutdown_rx).await }
        });

        let key = ObjectKey::new("default", "a");
        queue.add(key.clone());

        // Two failures at 500ms and 1s backoff, then success.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(inner.count(&key), 3);

        // No further attempts after success.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(inner.count(&key), 3);

        shutdown_tx.send(true).unwrap();
        run.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_reconcile_independently() {
        let inner = Arc::new(CountingReconciler::new(0));
        let config = ControllerConfig {
            workers: 4,
            ..ControllerConfig::default()
        };
        let controller = Controller::new(Arc::clone(&inner), config);
        let queue = controller.queue();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = tokio::spawn({
            let shutdown_rx = shutdown_rx.clone();
            async move { controller.run(shutdown_rx).await }
        });

        for name in ["a", "b", "c", "d", "e"] {
            queue.add(ObjectKey::new("default", name));
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
        for name in ["a", "b", "c", "d", "e"] {
            assert_eq!(inner.count(&ObjectKey::new("default", name)), 1);
        }

        shutdown_tx.send(true).unwrap();
        run.await.unwrap();
    }
}
