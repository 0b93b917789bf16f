//! VirtualMachine: a record backed by an externally managed machine.

use serde::{Deserialize, Serialize};

use crate::{Object, ObjectMeta, Phase};

/// Finalizer token that defers physical deletion of a VirtualMachine
/// record until the backend machine has been torn down.
pub const VIRTUAL_MACHINE_FINALIZER: &str = "drift.io/virtualmachine-protection";

/// A virtual machine provisioned through an external backend.
///
/// The record in the store is the desired state; the machine itself
/// lives outside the store, so deletion is guarded by
/// [`VIRTUAL_MACHINE_FINALIZER`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VirtualMachineSpec,
    #[serde(default)]
    pub status: VirtualMachineStatus,
}

/// Desired state, written only by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineSpec {
    /// Name the backend knows the machine by.
    pub machine_name: String,

    /// Memory request, e.g. `"1Gi"`.
    pub memory: String,
}

/// Observed state, written only by the VirtualMachine reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl VirtualMachine {
    /// A new VirtualMachine with the given identity and spec.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: VirtualMachineSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: VirtualMachineStatus::default(),
        }
    }
}

impl Object for VirtualMachine {
    const KIND: &'static str = "VirtualMachine";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
