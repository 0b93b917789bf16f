//! Child workload synthesis for TaskRun resources.

use std::collections::BTreeMap;

use drift_api::{Object, ObjectMeta, OwnerReference, Pod, PodSpec, RestartPolicy, TaskRun};
use drift_reconcile::SpecHash;

/// Label carrying the hash of the parent spec the pod was synthesized
/// from.
pub const SPEC_HASH_LABEL: &str = "drift.io/spec-hash";

/// Deterministic child name for a TaskRun.
pub fn pod_name(task_name: &str) -> String {
    format!("{task_name}-pod")
}

/// Synthesize the desired one-shot pod for a TaskRun.
///
/// Deterministic: the same parent state always yields an identical
/// pod, so the engine's idempotency check is existence-only.
pub fn pod_for_task(task: &TaskRun) -> Pod {
    // Spec fields are plain strings; serialization cannot fail.
    let spec_hash = SpecHash::of(&task.spec)
        .unwrap_or_else(|_| SpecHash::from_json(&serde_json::Value::Null));

    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), task.metadata.name.clone());
    labels.insert(SPEC_HASH_LABEL.to_string(), spec_hash.to_string());

    let mut metadata = ObjectMeta::new(task.metadata.namespace.clone(), pod_name(&task.metadata.name));
    metadata.labels = labels;
    metadata
        .owner_references
        .push(OwnerReference::controller_of(TaskRun::KIND, &task.metadata));

    Pod {
        metadata,
        spec: PodSpec {
            image: "busybox".to_string(),
            command: task.spec.command.split_whitespace().map(String::from).collect(),
            restart_policy: RestartPolicy::OnFailure,
        },
        status: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_api::TaskRunSpec;

    fn example() -> TaskRun {
        let mut task = TaskRun::new(
            "default",
            "example-at",
            TaskRunSpec {
                schedule: "2099-01-01T00:00:00Z".to_string(),
                command: "echo hi".to_string(),
            },
        );
        task.metadata.uid = Some(uuid_for_tests());
        task
    }

    fn uuid_for_tests() -> uuid::Uuid {
        uuid::Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0)
    }

    #[test]
    fn test_name_and_namespace_derive_from_parent() {
        let pod = pod_for_task(&example());
        assert_eq!(pod.metadata.name, "example-at-pod");
        assert_eq!(pod.metadata.namespace, "default");
    }

    #[test]
    fn test_owner_reference_points_at_parent() {
        let task = example();
        let pod = pod_for_task(&task);

        let owner = pod.metadata.controller_owner().unwrap();
        assert_eq!(owner.kind, "TaskRun");
        assert_eq!(owner.name, "example-at");
        assert_eq!(owner.uid, task.metadata.uid);
    }

    #[test]
    fn test_command_is_whitespace_split() {
        let pod = pod_for_task(&example());
        assert_eq!(pod.spec.command, vec!["echo", "hi"]);
        assert_eq!(pod.spec.restart_policy, RestartPolicy::OnFailure);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let task = example();
        assert_eq!(pod_for_task(&task), pod_for_task(&task));
    }

    #[test]
    fn test_spec_hash_label_tracks_spec_changes() {
        let task = example();
        let mut changed = task.clone();
        changed.spec.command = "echo bye".to_string();

        let hash = |p: &Pod| p.metadata.labels.get(SPEC_HASH_LABEL).cloned().unwrap();
        assert_ne!(hash(&pod_for_task(&task)), hash(&pod_for_task(&changed)));
    }
}
