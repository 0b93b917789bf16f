//! TaskRun read endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use drift_api::ObjectKey;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Projection of a TaskRun's spec and status.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct TaskRunResponse {
    pub namespace: String,
    pub name: String,
    pub schedule: String,
    pub command: String,

    /// Current phase, absent until first reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// GET /v1/namespaces/{namespace}/taskruns/{name}
pub async fn get_taskrun(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<TaskRunResponse>, ApiError> {
    let key = ObjectKey::new(namespace, name);
    let task = state
        .task_runs()
        .get_by_key(&key)
        .await
        .map_err(|e| ApiError::internal("taskrun_read_failed", e.to_string()))?
        .ok_or_else(|| ApiError::not_found("taskrun_not_found", format!("no TaskRun {key}")))?;

    Ok(Json(TaskRunResponse {
        namespace: task.metadata.namespace,
        name: task.metadata.name,
        schedule: task.spec.schedule,
        command: task.spec.command,
        phase: task.status.phase.map(|p| p.to_string()),
    }))
}
