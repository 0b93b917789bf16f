//! Versioned API routes.

mod machines;
mod taskruns;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/namespaces/{namespace}/taskruns/{name}",
            get(taskruns::get_taskrun),
        )
        .route(
            "/namespaces/{namespace}/virtualmachines/{name}",
            get(machines::get_machine),
        )
}
