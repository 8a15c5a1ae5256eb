//! Status command: one probe round without starting the controller.

use crate::cli::output::{format_status_json, format_status_table, ServerStatusView};
use crate::cli::StatusArgs;
use crate::config::FleetConfig;
use crate::health::{HealthProbe, HealthRecord};
use std::sync::Arc;

/// Handle `fleetgate status`
pub async fn handle_status(args: &StatusArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = FleetConfig::load(Some(&args.config))?.with_env_overrides();
    config.validate()?;

    let registry = Arc::new(config.build_registry()?);
    let probe = HealthProbe::new(Arc::clone(&registry), config.health_check.clone());
    let mut records = probe.check_all().await;

    let views: Vec<ServerStatusView> = registry
        .enabled()
        .iter()
        .map(|server| {
            let record = records
                .remove(&server.name)
                .unwrap_or_else(|| HealthRecord::unknown(&server.name));
            ServerStatusView::new(server, &record)
        })
        .collect();

    if args.json {
        Ok(format_status_json(&views)?)
    } else {
        Ok(format_status_table(&views))
    }
}
