//! HTTP API handlers and routing.
//!
//! The API is a query-only projection of resource state; all writes go
//! through the store and the reconcilers.

pub mod error;
mod health;
mod v1;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        // Health endpoints
        .merge(health::routes())
        // API v1 routes
        .nest("/v1", v1::routes())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Application state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use drift_api::{TaskRun, TaskRunSpec, VirtualMachine, VirtualMachineSpec};
    use drift_store::{MemoryStore, Store};

    async fn router_with_fixtures() -> Router {
        let tasks: Arc<MemoryStore<TaskRun>> = Arc::new(MemoryStore::new());
        let vms: Arc<MemoryStore<VirtualMachine>> = Arc::new(MemoryStore::new());

        tasks
            .create(TaskRun::new(
                "default",
                "example-at",
                TaskRunSpec {
                    schedule: "2099-01-01T00:00:00Z".to_string(),
                    command: "echo hello".to_string(),
                },
            ))
            .await
            .unwrap();
        vms.create(VirtualMachine::new(
            "default",
            "vm-a",
            VirtualMachineSpec {
                machine_name: "vm-a".to_string(),
                memory: "1Gi".to_string(),
            },
        ))
        .await
        .unwrap();

        create_router(AppState::new(tasks, vms))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_reports_ok() {
        let router = router_with_fixtures().await;
        let (status, body) = get(router, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "drift-controller");
    }

    #[tokio::test]
    async fn test_get_taskrun_projects_spec_and_status() {
        let router = router_with_fixtures().await;
        let (status, body) = get(router, "/v1/namespaces/default/taskruns/example-at").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["namespace"], "default");
        assert_eq!(body["name"], "example-at");
        assert_eq!(body["schedule"], "2099-01-01T00:00:00Z");
        // Phase is absent until the reconciler first writes it.
        assert!(body.get("phase").is_none());
    }

    #[tokio::test]
    async fn test_get_virtualmachine_reports_deleting_flag() {
        let router = router_with_fixtures().await;
        let (status, body) = get(router, "/v1/namespaces/default/virtualmachines/vm-a").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["machine_name"], "vm-a");
        assert_eq!(body["deleting"], false);
    }

    #[tokio::test]
    async fn test_unknown_taskrun_is_problem_404() {
        let router = router_with_fixtures().await;
        let (status, body) = get(router, "/v1/namespaces/default/taskruns/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(body["code"], "taskrun_not_found");
    }
}
