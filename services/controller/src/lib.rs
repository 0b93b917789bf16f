//! drift controller service.
//!
//! Hosts the level-triggered reconcilers for TaskRun and
//! VirtualMachine resources plus the read-only query API.

pub mod api;
pub mod backend;
pub mod config;
pub mod machine;
pub mod schedule;
pub mod state;
pub mod taskrun;
pub mod workload;
