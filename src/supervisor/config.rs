//! Backend launch configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// How backend processes are launched and stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Program to execute for every backend
    pub executable: String,
    /// Arguments placed before the per-server flags
    pub args_prefix: Vec<String>,
    /// Extra environment variables for every backend
    pub env: HashMap<String, String>,
    /// When set, backend output is also appended to `<log_dir>/<name>.log`
    pub log_dir: Option<PathBuf>,
    pub graceful_stop_timeout_ms: u64,
    pub force_stop_timeout_ms: u64,
    /// Refuse to launch when something already listens on the server's port
    pub check_port_conflict: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            executable: "python3".to_string(),
            args_prefix: vec![
                "-m".to_string(),
                "vllm.entrypoints.openai.api_server".to_string(),
            ],
            env: HashMap::new(),
            log_dir: None,
            graceful_stop_timeout_ms: 10_000,
            force_stop_timeout_ms: 5_000,
            check_port_conflict: true,
        }
    }
}

impl SupervisorConfig {
    pub fn graceful_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_timeout_ms)
    }

    pub fn force_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.force_stop_timeout_ms)
    }
}
