//! Logging configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected pretty or json)", other)),
        }
    }
}

/// `[logging]` section.
///
/// `components` maps a module under `fleetgate::` to its own level, e.g.
/// `supervisor = "debug"` or `backend = "warn"` for forwarded process output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, String>,
    /// Re-emit backend stdout/stderr lines under the `fleetgate::backend` target
    pub forward_backend_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            components: BTreeMap::new(),
            forward_backend_output: true,
        }
    }
}

impl LoggingConfig {
    /// Check the base level and every component level.
    ///
    /// Returns the offending field and a message.
    pub fn validate(&self) -> Result<(), (String, String)> {
        let check = |field: String, level: &str| {
            if LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                Ok(())
            } else {
                Err((field, format!("unknown level '{}'", level)))
            }
        };

        check("logging.level".to_string(), &self.level)?;
        for (component, level) in &self.components {
            check(format!("logging.components.{}", component), level)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.components.is_empty());
        assert!(config.forward_backend_output);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_from_toml() {
        let config: LoggingConfig = toml::from_str(
            r#"
            level = "debug"
            format = "json"
            forward_backend_output = false

            [components]
            supervisor = "trace"
            backend = "warn"
            "#,
        )
        .unwrap();

        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.forward_backend_output);
        let names: Vec<_> = config.components.keys().map(String::as_str).collect();
        assert_eq!(names, ["backend", "supervisor"]);
    }

    #[test]
    fn test_unknown_component_level_rejected() {
        let mut config = LoggingConfig::default();
        config.components.insert("routing".to_string(), "loud".to_string());

        let (field, message) = config.validate().unwrap_err();
        assert_eq!(field, "logging.components.routing");
        assert!(message.contains("loud"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
