//! Output formatting helpers for CLI commands

use crate::health::{HealthRecord, HealthStatus};
use crate::registry::ServerDescriptor;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for one server's probe result
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerStatusView {
    pub name: String,
    pub url: String,
    pub model: String,
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub message: String,
}

impl ServerStatusView {
    pub fn new(server: &ServerDescriptor, record: &HealthRecord) -> Self {
        Self {
            name: server.name.clone(),
            url: server.base_url(),
            model: server.model.clone(),
            status: record.status,
            latency_ms: record.latency_ms,
            message: record.message.clone(),
        }
    }
}

/// Format probe results as a table
pub fn format_status_table(servers: &[ServerStatusView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "URL", "Model", "Status", "Latency", "Message"]);

    for s in servers {
        let status_str = format!("{} {}", status_icon(s.status), s.status);
        let status_str = match s.status {
            HealthStatus::Up => status_str.green().to_string(),
            HealthStatus::Down => status_str.red().to_string(),
            HealthStatus::Degraded => status_str.yellow().to_string(),
            HealthStatus::Unknown => status_str.dimmed().to_string(),
        };

        table.add_row(vec![
            Cell::new(&s.name),
            Cell::new(&s.url),
            Cell::new(&s.model),
            Cell::new(status_str),
            Cell::new(format!("{}ms", s.latency_ms)),
            Cell::new(&s.message),
        ]);
    }

    let healthy = servers.iter().filter(|s| s.status.is_healthy()).count();
    format!("{}\n{}/{} servers healthy", table, healthy, servers.len())
}

/// Format probe results as JSON
pub fn format_status_json(servers: &[ServerStatusView]) -> Result<String, serde_json::Error> {
    let healthy = servers.iter().filter(|s| s.status.is_healthy()).count();
    serde_json::to_string_pretty(&json!({
        "total": servers.len(),
        "healthy": healthy,
        "servers": servers,
    }))
}

/// Get status icon for a health status
pub fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Up => "✓",
        HealthStatus::Down => "✗",
        HealthStatus::Degraded => "!",
        HealthStatus::Unknown => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(name: &str, status: HealthStatus) -> ServerStatusView {
        ServerStatusView {
            name: name.to_string(),
            url: "http://127.0.0.1:8001".to_string(),
            model: "llama3-8b".to_string(),
            status,
            latency_ms: 12,
            message: "Server is responding".to_string(),
        }
    }

    #[test]
    fn test_format_status_table_empty() {
        let output = format_status_table(&[]);
        assert!(output.contains("Name"));
        assert!(output.contains("0/0 servers healthy"));
    }

    #[test]
    fn test_format_status_table_with_data() {
        let output = format_status_table(&[view("a", HealthStatus::Up), view("b", HealthStatus::Down)]);
        assert!(output.contains("a"));
        assert!(output.contains("DOWN"));
        assert!(output.contains("1/2 servers healthy"));
    }

    #[test]
    fn test_format_status_json_valid() {
        let output = format_status_json(&[view("a", HealthStatus::Degraded)]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["total"], 1);
        assert_eq!(parsed["healthy"], 0);
        assert_eq!(parsed["servers"][0]["status"], "DEGRADED");
    }

    #[test]
    fn test_status_icons() {
        assert_eq!(status_icon(HealthStatus::Up), "✓");
        assert_eq!(status_icon(HealthStatus::Down), "✗");
        assert_eq!(status_icon(HealthStatus::Unknown), "?");
    }
}
