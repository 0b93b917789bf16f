//! VirtualMachine reconciler.
//!
//! The machine itself lives in an external backend, so the record's
//! deletion is guarded by a finalizer: the finalizer is durably
//! recorded before the backend machine is created, and only removed
//! once teardown has been confirmed. Readiness is polled through
//! requeues, never by blocking a worker slot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use drift_api::{ObjectKey, Phase, VirtualMachine, VIRTUAL_MACHINE_FINALIZER};
use drift_reconcile::{Action, ReconcileError, Reconciler};
use drift_store::{EventRecorder, EventType, ObjectCache, ObjectRef, Store};

use crate::backend::{MachineBackend, MachineSpec};

pub const CONTROLLER_NAME: &str = "virtualmachine-controller";

const REASON_SYNCED: &str = "Synced";
const MESSAGE_SYNCED: &str = "VirtualMachine synced successfully";
const REASON_SYNC_FAILED: &str = "SyncFailed";

/// Reconciles VirtualMachine records against the external backend.
pub struct MachineReconciler {
    cache: Arc<dyn ObjectCache<VirtualMachine>>,
    machines: Arc<dyn Store<VirtualMachine>>,
    backend: Arc<dyn MachineBackend>,
    recorder: Arc<dyn EventRecorder>,

    /// Requeue delay while waiting for a backend machine to boot.
    poll_interval: Duration,
}

impl MachineReconciler {
    pub fn new(
        cache: Arc<dyn ObjectCache<VirtualMachine>>,
        machines: Arc<dyn Store<VirtualMachine>>,
        backend: Arc<dyn MachineBackend>,
        recorder: Arc<dyn EventRecorder>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            cache,
            machines,
            backend,
            recorder,
            poll_interval,
        }
    }

    fn warn(&self, original: &VirtualMachine, message: &str) {
        self.recorder.record(
            &ObjectRef::of(original),
            EventType::Warning,
            REASON_SYNC_FAILED,
            message,
        );
    }

    /// Deletion path: tear down the backend machine, then release the
    /// finalizer. The record must never disappear while the machine
    /// exists.
    async fn finalize(
        &self,
        original: &VirtualMachine,
        mut instance: VirtualMachine,
        key: &ObjectKey,
    ) -> Result<Action, ReconcileError> {
        info!(%key, machine = %instance.spec.machine_name, "Deletion requested, tearing down machine");

        match self.backend.delete(&instance.spec.machine_name).await {
            Ok(()) => {}
            // Already gone: teardown is confirmed complete.
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                self.warn(original, &e.to_string());
                return Err(ReconcileError::External(e.to_string()));
            }
        }

        instance
            .metadata
            .remove_finalizer(VIRTUAL_MACHINE_FINALIZER);
        // This write empties the finalizer list of a deleting object,
        // which completes the physical deletion in the store.
        self.machines.update(instance).await.map_err(|e| {
            self.warn(original, &e.to_string());
            ReconcileError::from(e)
        })?;

        self.recorder.record(
            &ObjectRef::of(original),
            EventType::Normal,
            REASON_SYNCED,
            "machine torn down, finalizer released",
        );
        Ok(Action::done())
    }
}

#[async_trait]
impl Reconciler for MachineReconciler {
    fn name(&self) -> &str {
        CONTROLLER_NAME
    }

    async fn reconcile(&self, key: ObjectKey) -> Result<Action, ReconcileError> {
        let Some(original) = self.cache.get_by_key(&key).await? else {
            debug!(%key, "VirtualMachine gone, nothing to do");
            return Ok(Action::done());
        };

        let mut instance = original.clone();

        if instance.metadata.is_deleting() {
            if instance.metadata.has_finalizer(VIRTUAL_MACHINE_FINALIZER) {
                return self.finalize(&original, instance, &key).await;
            }
            // Another actor already released our finalizer; the store
            // will finish the deletion on its own.
            return Ok(Action::done());
        }

        if !instance.metadata.has_finalizer(VIRTUAL_MACHINE_FINALIZER) {
            // The finalizer must be durably recorded before any owned
            // side effect exists, so cleanup is always possible.
            info!(%key, "Adding finalizer");
            instance.metadata.add_finalizer(VIRTUAL_MACHINE_FINALIZER);
            self.machines.update(instance).await.map_err(|e| {
                self.warn(&original, &e.to_string());
                ReconcileError::from(e)
            })?;
            return Ok(Action::requeue_after(Duration::ZERO));
        }

        let phase = instance.status.phase.clone().unwrap_or(Phase::Pending);
        instance.status.phase = Some(phase.clone());

        match phase {
            Phase::Pending => {
                let spec = MachineSpec {
                    name: instance.spec.machine_name.clone(),
                    memory: instance.spec.memory.clone(),
                };
                match self.backend.create(&spec).await {
                    Ok(()) => info!(%key, machine = %spec.name, "Machine creation requested"),
                    // Present already, e.g. a retry after a crash
                    // between create and status write.
                    Err(e) if e.is_already_exists() => {
                        debug!(%key, machine = %spec.name, "Machine already present")
                    }
                    Err(e) => {
                        self.warn(&original, &e.to_string());
                        return Err(ReconcileError::External(e.to_string()));
                    }
                }
                instance.status.phase = Some(Phase::Running);
            }
            Phase::Running => {
                match self.backend.get(&instance.spec.machine_name).await {
                    Ok(Some(state)) if state.ready => {
                        info!(%key, machine = %instance.spec.machine_name, "Machine ready");
                        instance.status.phase = Some(Phase::Done);
                    }
                    // Not booted yet (or creation still propagating):
                    // poll through a requeue instead of blocking the
                    // worker slot.
                    Ok(_) => return Ok(Action::requeue_after(self.poll_interval)),
                    Err(e) => {
                        self.warn(&original, &e.to_string());
                        return Err(ReconcileError::External(e.to_string()));
                    }
                }
            }
            Phase::Done => {
                debug!(%key, "Phase DONE, terminal");
                return Ok(Action::done());
            }
            Phase::Unknown(raw) => {
                info!(%key, phase = %raw, "Unrecognized phase, no-op");
                return Ok(Action::done());
            }
        }

        if instance != original {
            self.machines.update(instance).await.map_err(|e| {
                self.warn(&original, &e.to_string());
                ReconcileError::from(e)
            })?;
        }

        self.recorder.record(
            &ObjectRef::of(&original),
            EventType::Normal,
            REASON_SYNCED,
            MESSAGE_SYNCED,
        );
        Ok(Action::done())
    }
}
