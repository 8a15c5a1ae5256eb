//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::cli::ServeArgs;
use crate::config::{FleetConfig, LogFormat};
use crate::fleet::FleetController;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<FleetConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        FleetConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        FleetConfig::default()
    };

    config = config.with_env_overrides();

    // CLI overrides win
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(ref host) = args.host {
        config.gateway.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.no_health_check {
        config.health_check.enabled = false;
    }
    if args.no_monitoring {
        config.monitoring.enabled = false;
    }

    Ok(config)
}

/// Initialize tracing based on configuration
pub fn init_tracing(
    config: &crate::config::LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = crate::logging::build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

/// Wait for SIGINT or SIGTERM, then cancel the fleet.
async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    init_tracing(&config.logging)?;

    tracing::info!(servers = config.servers.len(), "Starting fleetgate");
    tracing::debug!(?config, "Loaded configuration");

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let fleet = Arc::new(FleetController::new(config)?);
    let app = create_router(Arc::new(AppState::new(Arc::clone(&fleet))));

    fleet.start().await;

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            fleet.shutdown().await;
            return Err(e.into());
        }
    };
    tracing::info!(addr = %addr, "Admin API listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fleet.cancel_token()))
        .await;

    let all_stopped = fleet.shutdown().await;
    served?;

    if !all_stopped {
        tracing::warn!("Some backend processes could not be confirmed stopped");
    }
    tracing::info!("fleetgate stopped");
    Ok(())
}
