//! Launch command construction.

use super::SupervisorConfig;
use crate::registry::ServerDescriptor;

/// Full argv for a backend: executable, prefix, then per-server flags.
pub fn build_command(config: &SupervisorConfig, server: &ServerDescriptor) -> Vec<String> {
    let mut argv = Vec::with_capacity(config.args_prefix.len() + 20);
    argv.push(config.executable.clone());
    argv.extend(config.args_prefix.iter().cloned());
    argv.extend([
        "--model".to_string(),
        server.model.clone(),
        "--host".to_string(),
        server.host.clone(),
        "--port".to_string(),
        server.port.to_string(),
    ]);
    argv.extend(server.launch.to_args());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LaunchParams;

    fn server() -> ServerDescriptor {
        ServerDescriptor {
            name: "llama-a".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8001,
            model: "llama3-8b".to_string(),
            launch: LaunchParams::default(),
            enabled: true,
            autostart: false,
        }
    }

    #[test]
    fn test_build_command_order() {
        let argv = build_command(&SupervisorConfig::default(), &server());
        assert_eq!(
            &argv[..9],
            &[
                "python3",
                "-m",
                "vllm.entrypoints.openai.api_server",
                "--model",
                "llama3-8b",
                "--host",
                "0.0.0.0",
                "--port",
                "8001",
            ]
        );
        assert!(argv.windows(2).any(|w| w == ["--tensor-parallel-size", "1"]));
        assert!(argv.windows(2).any(|w| w == ["--gpu-memory-utilization", "0.9"]));
        assert!(!argv.contains(&"--quantization".to_string()));
    }

    #[test]
    fn test_build_command_quantization_and_extra_args() {
        let mut server = server();
        server.launch.quantization = Some("awq".to_string());
        server.launch.extra_args = vec!["--enforce-eager".to_string()];

        let argv = build_command(&SupervisorConfig::default(), &server);

        assert!(argv.windows(2).any(|w| w == ["--quantization", "awq"]));
        assert_eq!(argv.last().map(String::as_str), Some("--enforce-eager"));
    }

    #[test]
    fn test_build_command_custom_executable() {
        let config = SupervisorConfig {
            executable: "sh".to_string(),
            args_prefix: vec!["-c".to_string(), "exec sleep 30".to_string(), "backend".to_string()],
            ..SupervisorConfig::default()
        };
        let argv = build_command(&config, &server());
        assert_eq!(&argv[..4], &["sh", "-c", "exec sleep 30", "backend"]);
    }
}
