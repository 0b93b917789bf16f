//! TaskRun reconciler.
//!
//! Drives the `PENDING -> RUNNING -> DONE` phase machine: waits out the
//! schedule, then launches exactly one owned pod and parks in `DONE`.
//! Every step is a total function of the newest fetched state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use drift_api::{ObjectKey, Phase, TaskRun};
use drift_reconcile::{Action, ReconcileError, Reconciler};
use drift_store::{EventRecorder, EventType, ObjectCache, ObjectRef, Store};

use crate::schedule::{time_until, Clock};
use crate::workload::pod_for_task;

pub const CONTROLLER_NAME: &str = "taskrun-controller";

const REASON_SYNCED: &str = "Synced";
const MESSAGE_SYNCED: &str = "TaskRun synced successfully";
const REASON_SYNC_FAILED: &str = "SyncFailed";

/// Reconciles TaskRun resources against their owned pods.
pub struct TaskRunReconciler {
    cache: Arc<dyn ObjectCache<TaskRun>>,
    tasks: Arc<dyn Store<TaskRun>>,
    pods: Arc<dyn Store<drift_api::Pod>>,
    recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn Clock>,
}

impl TaskRunReconciler {
    pub fn new(
        cache: Arc<dyn ObjectCache<TaskRun>>,
        tasks: Arc<dyn Store<TaskRun>>,
        pods: Arc<dyn Store<drift_api::Pod>>,
        recorder: Arc<dyn EventRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            tasks,
            pods,
            recorder,
            clock,
        }
    }

    fn warn(&self, original: &TaskRun, message: &str) {
        self.recorder.record(
            &ObjectRef::of(original),
            EventType::Warning,
            REASON_SYNC_FAILED,
            message,
        );
    }
}

#[async_trait]
impl Reconciler for TaskRunReconciler {
    fn name(&self) -> &str {
        CONTROLLER_NAME
    }

    async fn reconcile(&self, key: ObjectKey) -> Result<Action, ReconcileError> {
        // The object may have changed or vanished since enqueue; the
        // fetched state is the only state this run may act on.
        let Some(original) = self.cache.get_by_key(&key).await? else {
            debug!(%key, "TaskRun gone, nothing to do");
            return Ok(Action::done());
        };

        // The cached object may be shared; mutate only the clone.
        let mut instance = original.clone();

        let phase = instance.status.phase.clone().unwrap_or(Phase::Pending);
        instance.status.phase = Some(phase.clone());

        let mut action = Action::done();
        match phase {
            Phase::Pending => {
                debug!(%key, schedule = %instance.spec.schedule, "Phase PENDING, checking schedule");
                let remaining = time_until(&instance.spec.schedule, self.clock.now())
                    .map_err(|e| {
                        self.warn(&original, &e.to_string());
                        ReconcileError::InvalidSpec(e.to_string())
                    })?;

                if remaining > chrono::Duration::zero() {
                    // Not due yet: no side effect, come back exactly
                    // when the schedule fires. The write-back below
                    // still records the defaulted phase.
                    let delay = remaining
                        .to_std()
                        .map_err(|e| ReconcileError::InvalidSpec(e.to_string()))?;
                    action = Action::requeue_after(delay);
                } else {
                    info!(%key, command = %instance.spec.command, "Schedule due, moving to RUNNING");
                    instance.status.phase = Some(Phase::Running);
                }
            }
            Phase::Running => {
                debug!(%key, "Phase RUNNING, ensuring pod");
                let desired = pod_for_task(&instance);
                let pod_key = ObjectKey::of(&desired);

                match self.pods.get(&pod_key).await {
                    Ok(_) => {
                        // Child present; its own status changes will
                        // re-trigger us through the owner reference.
                        return Ok(Action::done());
                    }
                    Err(e) if e.is_not_found() => match self.pods.create(desired).await {
                        Ok(pod) => {
                            info!(%key, pod = %pod.metadata.name, "Pod launched");
                            instance.status.phase = Some(Phase::Done);
                        }
                        Err(e) if e.is_already_exists() => {
                            // Lost a create race; same as child present.
                            return Ok(Action::done());
                        }
                        Err(e) => {
                            self.warn(&original, &e.to_string());
                            return Err(ReconcileError::External(e.to_string()));
                        }
                    },
                    Err(e) => {
                        self.warn(&original, &e.to_string());
                        return Err(e.into());
                    }
                }
            }
            Phase::Done => {
                debug!(%key, "Phase DONE, terminal");
                return Ok(Action::done());
            }
            Phase::Unknown(raw) => {
                // Do not mask possible data corruption as progress.
                info!(%key, phase = %raw, "Unrecognized phase, no-op");
                return Ok(Action::done());
            }
        }

        // A phase change alone counts as a structural difference.
        if instance != original {
            self.tasks.update(instance).await.map_err(|e| {
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
        Ok(action)
    }
}
