use serde::{Deserialize, Serialize};

/// Parameters used to build the launch command of an inference backend.
///
/// Mirrors the flags an OpenAI-compatible vLLM server accepts. All values are
/// fixed at configuration load and never change while the fleet runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchParams {
    /// Maximum context length in tokens (`--max-model-len`)
    pub max_model_len: u32,
    /// Maximum concurrent sequences (`--max-num-seqs`)
    pub max_num_seqs: u32,
    /// Weight/activation dtype (`--dtype`)
    pub dtype: String,
    /// Number of GPUs the model is sharded across (`--tensor-parallel-size`)
    pub tensor_parallel_size: u32,
    /// Fraction of GPU memory the backend may claim, 0.0..=1.0
    pub gpu_memory_utilization: f64,
    /// Quantization mode (`--quantization`), omitted when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    /// Extra arguments appended verbatim after the generated flags
    pub extra_args: Vec<String>,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            max_model_len: 4096,
            max_num_seqs: 256,
            dtype: "auto".to_string(),
            tensor_parallel_size: 1,
            gpu_memory_utilization: 0.9,
            quantization: None,
            extra_args: Vec::new(),
        }
    }
}

impl LaunchParams {
    /// Render the launch parameters as command-line flags.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--max-model-len".to_string(),
            self.max_model_len.to_string(),
            "--max-num-seqs".to_string(),
            self.max_num_seqs.to_string(),
            "--dtype".to_string(),
            self.dtype.clone(),
            "--tensor-parallel-size".to_string(),
            self.tensor_parallel_size.to_string(),
            "--gpu-memory-utilization".to_string(),
            self.gpu_memory_utilization.to_string(),
        ];

        if let Some(quantization) = &self.quantization {
            args.push("--quantization".to_string());
            args.push(quantization.clone());
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// A configured inference backend.
///
/// Immutable once the registry is built. The `name` is the unique key every
/// other component uses to refer to the backend.
///
/// # Examples
///
/// ```
/// use fleetgate::registry::{LaunchParams, ServerDescriptor};
///
/// let server = ServerDescriptor {
///     name: "llama-a".to_string(),
///     host: "127.0.0.1".to_string(),
///     port: 8001,
///     model: "llama3-8b".to_string(),
///     launch: LaunchParams::default(),
///     enabled: true,
///     autostart: false,
/// };
/// assert_eq!(server.base_url(), "http://127.0.0.1:8001");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Unique server name
    pub name: String,
    /// Host the backend binds to and is probed on
    #[serde(default = "default_host")]
    pub host: String,
    /// Port the backend listens on
    pub port: u16,
    /// Model id served by this backend
    pub model: String,
    /// Launch/resource parameters
    #[serde(default)]
    pub launch: LaunchParams,
    /// Disabled servers are never probed, routed to, or monitored
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Start the process when the gateway starts
    #[serde(default)]
    pub autostart: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_enabled() -> bool {
    true
}

impl ServerDescriptor {
    /// Base URL of the backend's HTTP API.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// `host:port` socket address string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Relative weight of the hardware behind this backend.
    pub fn capacity_weight(&self) -> f64 {
        self.launch.gpu_memory_utilization * f64::from(self.launch.tensor_parallel_size)
    }
}
