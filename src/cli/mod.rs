//! CLI module for fleetgate
//!
//! # Commands
//!
//! - `serve` - Run the fleet controller and admin API
//! - `status` - Probe every enabled server once and print the result
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Start with the default config file
//! fleetgate serve
//!
//! # One-shot fleet health as JSON
//! fleetgate status --json
//!
//! # Generate shell completions
//! fleetgate completions bash > ~/.bash_completion.d/fleetgate
//! ```

pub mod completions;
pub mod config;
pub mod output;
pub mod serve;
pub mod status;

pub use completions::handle_completions;
pub use config::handle_config_init;
pub use status::handle_status;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// fleetgate - LLM inference fleet controller
#[derive(Parser, Debug)]
#[command(
    name = "fleetgate",
    version,
    about = "Supervise, probe, balance and monitor a fleet of LLM inference backends"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fleet controller and admin API
    Serve(ServeArgs),
    /// Probe every enabled server once
    Status(StatusArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fleetgate.toml")]
    pub config: PathBuf,

    /// Override admin API port
    #[arg(short, long, env = "FLEETGATE_PORT")]
    pub port: Option<u16>,

    /// Override admin API host
    #[arg(short = 'H', long, env = "FLEETGATE_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FLEETGATE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Disable the periodic health probe
    #[arg(long)]
    pub no_health_check: bool,

    /// Disable metric collection and alerting
    #[arg(long)]
    pub no_monitoring: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "fleetgate.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the example configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "fleetgate.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["fleetgate", "serve"]).unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("fleetgate.toml"));
                assert!(args.port.is_none());
                assert!(!args.no_health_check);
                assert!(!args.no_monitoring);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "fleetgate",
            "serve",
            "-c",
            "custom.toml",
            "-p",
            "9000",
            "-H",
            "127.0.0.1",
            "--no-monitoring",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.config, PathBuf::from("custom.toml"));
                assert_eq!(args.port, Some(9000));
                assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
                assert!(args.no_monitoring);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_status_json() {
        let cli = Cli::try_parse_from(["fleetgate", "status", "--json"]).unwrap();
        match cli.command {
            Commands::Status(args) => assert!(args.json),
            _ => panic!("Expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_config_init() {
        let cli =
            Cli::try_parse_from(["fleetgate", "config", "init", "-o", "x.toml", "--force"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Init(args)) => {
                assert_eq!(args.output, PathBuf::from("x.toml"));
                assert!(args.force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_shell() {
        assert!(Cli::try_parse_from(["fleetgate", "completions", "cmd"]).is_err());
    }
}
