//! VirtualMachine read endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use drift_api::ObjectKey;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Projection of a VirtualMachine's spec and status.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct MachineResponse {
    pub namespace: String,
    pub name: String,
    pub machine_name: String,
    pub memory: String,

    /// Current phase, absent until first reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Whether a deletion is pending on finalizers.
    pub deleting: bool,
}

/// GET /v1/namespaces/{namespace}/virtualmachines/{name}
pub async fn get_machine(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<MachineResponse>, ApiError> {
    let key = ObjectKey::new(namespace, name);
    let vm = state
        .machines()
        .get_by_key(&key)
        .await
        .map_err(|e| ApiError::internal("virtualmachine_read_failed", e.to_string()))?
        .ok_or_else(|| {
            ApiError::not_found("virtualmachine_not_found", format!("no VirtualMachine {key}"))
        })?;

    Ok(Json(MachineResponse {
        namespace: vm.metadata.namespace.clone(),
        name: vm.metadata.name.clone(),
        machine_name: vm.spec.machine_name,
        memory: vm.spec.memory,
        phase: vm.status.phase.map(|p| p.to_string()),
        deleting: vm.metadata.deletion_timestamp.is_some(),
    }))
}
