//! drift controller
//!
//! Central coordination service: hosts the TaskRun and VirtualMachine
//! reconcilers and the read-only query API, wired to in-memory
//! store/cache/backend collaborators.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use drift_api::{Pod, TaskRun, VirtualMachine};
use drift_controller::{
    api,
    backend::MemoryMachineBackend,
    config::Config,
    machine::MachineReconciler,
    schedule::SystemClock,
    state::AppState,
    taskrun::TaskRunReconciler,
};
use drift_reconcile::{Controller, ControllerConfig};
use drift_store::{Cache, LogRecorder, MemoryStore, Store};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to DRIFT_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting drift controller");
    info!(listen_addr = %config.listen_addr, workers = config.workers, "Configuration loaded");

    // Stores are the source of truth; caches follow their watch
    // streams.
    let task_store: Arc<MemoryStore<TaskRun>> = Arc::new(MemoryStore::new());
    let pod_store: Arc<MemoryStore<Pod>> = Arc::new(MemoryStore::new());
    let vm_store: Arc<MemoryStore<VirtualMachine>> = Arc::new(MemoryStore::new());

    let task_cache: Cache<TaskRun> = Cache::new();
    let vm_cache: Cache<VirtualMachine> = Cache::new();

    let recorder = Arc::new(LogRecorder);
    let backend = Arc::new(MemoryMachineBackend::new());

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start caches in the background
    let task_cache_handle = tokio::spawn({
        let cache = task_cache.clone();
        let store: Arc<dyn Store<TaskRun>> = task_store.clone();
        let shutdown_rx = shutdown_rx.clone();
        async move { cache.run(store, shutdown_rx).await }
    });
    let vm_cache_handle = tokio::spawn({
        let cache = vm_cache.clone();
        let store: Arc<dyn Store<VirtualMachine>> = vm_store.clone();
        let shutdown_rx = shutdown_rx.clone();
        async move { cache.run(store, shutdown_rx).await }
    });

    // TaskRun controller: watches TaskRuns and, through owner
    // references, the pods they created.
    let controller_config = ControllerConfig {
        workers: config.workers,
        ..ControllerConfig::default()
    };
    let taskrun_controller = Controller::new(
        TaskRunReconciler::new(
            Arc::new(task_cache.clone()),
            task_store.clone(),
            pod_store.clone(),
            recorder.clone(),
            Arc::new(SystemClock),
        ),
        controller_config.clone(),
    );
    let taskrun_watch = taskrun_controller.watch(task_store.subscribe(), shutdown_rx.clone());
    let pod_watch = taskrun_controller.watch_owned(pod_store.subscribe(), shutdown_rx.clone());
    let taskrun_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move { taskrun_controller.run(shutdown_rx).await }
    });

    // VirtualMachine controller
    let machine_controller = Controller::new(
        MachineReconciler::new(
            Arc::new(vm_cache.clone()),
            vm_store.clone(),
            backend,
            recorder,
            config.vm_poll_interval,
        ),
        controller_config,
    );
    let machine_watch = machine_controller.watch(vm_store.subscribe(), shutdown_rx.clone());
    let machine_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move { machine_controller.run(shutdown_rx).await }
    });

    // Build and run the server
    let state = AppState::new(Arc::new(task_cache), Arc::new(vm_cache));
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let mut shutdown_rx = shutdown_rx;
                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        if shutdown_rx.changed().await.is_err() {
                            break;
                        }
                    }
                    info!("HTTP server shutting down");
                })
                .await
        }
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    shutdown_tx.send(true)?;

    // Let in-flight reconciliations finish naturally.
    let _ = taskrun_handle.await;
    let _ = machine_handle.await;
    let _ = taskrun_watch.await;
    let _ = pod_watch.await;
    let _ = machine_watch.await;
    let _ = task_cache_handle.await;
    let _ = vm_cache_handle.await;
    if let Err(e) = server_handle.await {
        error!(error = %e, "HTTP server task failed");
    }

    info!("Shutdown complete");
    Ok(())
}
