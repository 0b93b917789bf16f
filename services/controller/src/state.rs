//! Application state shared across request handlers.

use std::sync::Arc;

use drift_api::{TaskRun, VirtualMachine};
use drift_store::ObjectCache;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
/// Handlers read from the caches only; they never write.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    task_runs: Arc<dyn ObjectCache<TaskRun>>,
    machines: Arc<dyn ObjectCache<VirtualMachine>>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        task_runs: Arc<dyn ObjectCache<TaskRun>>,
        machines: Arc<dyn ObjectCache<VirtualMachine>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                task_runs,
                machines,
            }),
        }
    }

    /// Read access to TaskRun objects.
    pub fn task_runs(&self) -> &dyn ObjectCache<TaskRun> {
        self.inner.task_runs.as_ref()
    }

    /// Read access to VirtualMachine objects.
    pub fn machines(&self) -> &dyn ObjectCache<VirtualMachine> {
        self.inner.machines.as_ref()
    }
}
