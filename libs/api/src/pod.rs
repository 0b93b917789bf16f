//! Pod: a one-shot child workload owned by a TaskRun.

use serde::{Deserialize, Serialize};

use crate::{Object, ObjectMeta, Phase};

/// A one-shot workload created as a side effect of a TaskRun entering
/// its running phase. Carries an owner reference back to the parent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Container image to run.
    pub image: String,

    /// Command and arguments.
    pub command: Vec<String>,

    /// Restart policy applied by the workload runtime.
    #[serde(default)]
    pub restart_policy: RestartPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

/// Restart policy for a pod's containers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RestartPolicy {
    Always,
    #[default]
    OnFailure,
    Never,
}

impl Object for Pod {
    const KIND: &'static str = "Pod";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
