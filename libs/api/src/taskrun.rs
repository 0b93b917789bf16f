//! TaskRun: a command executed once at a scheduled time.

use serde::{Deserialize, Serialize};

use crate::{Object, ObjectMeta, Phase};

/// A one-shot task executed at an absolute UTC time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: TaskRunSpec,
    #[serde(default)]
    pub status: TaskRunStatus,
}

/// Desired state, written only by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRunSpec {
    /// Absolute UTC execution time, `YYYY-MM-DDTHH:MM:SSZ`.
    pub schedule: String,

    /// Command to run, whitespace-separated.
    pub command: String,
}

/// Observed state, written only by the TaskRun reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRunStatus {
    /// `None` until the first reconciliation defaults it to `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl TaskRun {
    /// A new TaskRun with the given identity and spec.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: TaskRunSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: TaskRunStatus::default(),
        }
    }
}

impl Object for TaskRun {
    const KIND: &'static str = "TaskRun";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_equality_detects_status_change() {
        let task = TaskRun::new(
            "default",
            "example-at",
            TaskRunSpec {
                schedule: "2099-01-01T00:00:00Z".to_string(),
                command: "echo hi".to_string(),
            },
        );

        let mut clone = task.clone();
        assert_eq!(task, clone);

        clone.status.phase = Some(Phase::Pending);
        assert_ne!(task, clone);
    }

    #[test]
    fn test_status_phase_absent_from_wire_when_unset() {
        let task = TaskRun::new("default", "t", TaskRunSpec::default());
        let json = serde_json::to_value(&task).unwrap();
        assert!(json["status"].get("phase").is_none());
    }
}
