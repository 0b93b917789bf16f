//! External machine backend collaborator.
//!
//! The backend owns the actual virtual machines; the store only holds
//! the desired-state records. Calls are blocking from the worker's
//! perspective and may fail partially, so every caller folds
//! already-exists and not-found into its idempotent branches.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors from the machine backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A machine with this name already exists. Folded into the
    /// "machine present" branch by the reconciler.
    #[error("machine already exists: {0}")]
    AlreadyExists(String),

    /// No machine with this name. On teardown this is success.
    #[error("machine not found: {0}")]
    NotFound(String),

    /// The backend call failed; retryable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Desired representation of a backend machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSpec {
    pub name: String,
    pub memory: String,
}

/// Observed state of a backend machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineState {
    /// Whether the machine has finished booting.
    pub ready: bool,
}

/// Owned-child backend for virtual machines.
#[async_trait]
pub trait MachineBackend: Send + Sync {
    /// Create a machine. Idempotency is the caller's concern: an
    /// `AlreadyExists` error means the desired machine is present.
    async fn create(&self, spec: &MachineSpec) -> Result<(), BackendError>;

    /// Observed state of a machine, `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<MachineState>, BackendError>;

    /// Tear down a machine.
    async fn delete(&self, name: &str) -> Result<(), BackendError>;
}

/// In-memory backend for dev mode and tests.
///
/// Created machines start not-ready; [`MemoryMachineBackend::mark_ready`]
/// flips them, standing in for the real backend's boot completing.
#[derive(Debug, Default)]
pub struct MemoryMachineBackend {
    machines: Mutex<HashMap<String, MachineState>>,
    unavailable: Mutex<bool>,
}

impl MemoryMachineBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going down (or back up).
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut flag) = self.unavailable.lock() {
            *flag = unavailable;
        }
    }

    /// Mark a machine as booted.
    pub fn mark_ready(&self, name: &str) {
        if let Ok(mut machines) = self.machines.lock() {
            if let Some(state) = machines.get_mut(name) {
                state.ready = true;
            }
        }
    }

    /// Whether a machine currently exists.
    pub fn exists(&self, name: &str) -> bool {
        self.machines
            .lock()
            .map(|m| m.contains_key(name))
            .unwrap_or(false)
    }

    fn check_available(&self) -> Result<(), BackendError> {
        let down = self.unavailable.lock().map(|f| *f).unwrap_or(false);
        if down {
            return Err(BackendError::Unavailable("backend down".to_string()));
        }
        Ok(())
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MachineState>>, BackendError> {
        self.machines
            .lock()
            .map_err(|e| BackendError::Unavailable(format!("backend lock poisoned: {e}")))
    }
}

#[async_trait]
impl MachineBackend for MemoryMachineBackend {
    async fn create(&self, spec: &MachineSpec) -> Result<(), BackendError> {
        self.check_available()?;
        let mut machines = self.locked()?;
        if machines.contains_key(&spec.name) {
            return Err(BackendError::AlreadyExists(spec.name.clone()));
        }
        machines.insert(spec.name.clone(), MachineState { ready: false });
        debug!(machine = %spec.name, memory = %spec.memory, "Backend machine created");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<MachineState>, BackendError> {
        self.check_available()?;
        Ok(self.locked()?.get(name).copied())
    }

    async fn delete(&self, name: &str) -> Result<(), BackendError> {
        self.check_available()?;
        let mut machines = self.locked()?;
        if machines.remove(name).is_none() {
            return Err(BackendError::NotFound(name.to_string()));
        }
        debug!(machine = %name, "Backend machine deleted");
        Ok(())
    }
}
