//! Controller service configuration.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;

/// Service configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address. `DRIFT_LISTEN_ADDR`, default `127.0.0.1:8080`.
    pub listen_addr: SocketAddr,

    /// Log level when `RUST_LOG` is unset. `DRIFT_LOG_LEVEL`, default `info`.
    pub log_level: String,

    /// Concurrent reconciliations per controller. `DRIFT_WORKERS`, default 1.
    pub workers: usize,

    /// Poll interval while waiting for a backend machine to become
    /// ready. `DRIFT_VM_POLL_INTERVAL_SECS`, default 2.
    pub vm_poll_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("DRIFT_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = std::env::var("DRIFT_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let workers = std::env::var("DRIFT_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&w| w > 0)
            .unwrap_or(1);

        let vm_poll_interval = std::env::var("DRIFT_VM_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(2));

        Ok(Self {
            listen_addr,
            log_level,
            workers,
            vm_poll_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // Env vars are process-global; only assert the defaults that
        // nothing in the test suite sets.
        let config = Config::from_env().unwrap();
        assert!(config.workers >= 1);
        assert!(config.vm_poll_interval >= Duration::from_secs(1));
    }
}
