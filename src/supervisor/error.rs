//! Error types for backend process supervision.

use crate::registry::RegistryError;
use thiserror::Error;

/// Errors returned by supervisor operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("configuration error: {0}")]
    Configuration(#[from] RegistryError),

    #[error("server '{0}' is disabled")]
    ServerDisabled(String),

    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Why a backend could not be launched.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn backend '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("port {addr} for backend '{server}' is already in use")]
    PortInUse { server: String, addr: String },
}

/// A stop sequence that did not confirm process exit. Logged, never returned.
#[derive(Debug, Error)]
pub enum ProcessTerminationError {
    #[error("backend '{server}' (pid {pid}) survived a forced kill")]
    ForceKillFailed { server: String, pid: u32 },

    #[error("backend '{server}' (pid {pid}) did not exit within {timeout_ms}ms")]
    Timeout {
        server: String,
        pid: u32,
        timeout_ms: u64,
    },
}
