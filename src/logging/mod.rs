//! Tracing filter construction.
//!
//! Backend stdout/stderr lines are emitted under the `fleetgate::backend`
//! target, so they can be tuned like any other component.

/// Build the `EnvFilter` directive string from [`LoggingConfig`].
///
/// The base level comes first, followed by one `fleetgate::<component>=<level>`
/// directive per configured component, sorted by component name.
///
/// # Examples
///
/// ```
/// use fleetgate::config::LoggingConfig;
/// use fleetgate::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config.components.insert("routing".to_string(), "debug".to_string());
///
/// assert_eq!(build_filter_directives(&config), "info,fleetgate::routing=debug");
/// ```
///
/// [`LoggingConfig`]: crate::config::LoggingConfig
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    config
        .components
        .iter()
        .fold(config.level.clone(), |mut filter, (component, level)| {
            filter.push_str(&format!(",fleetgate::{}={}", component, level));
            filter
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;

    #[test]
    fn test_filter_without_components() {
        let config = LoggingConfig::default();
        assert_eq!(build_filter_directives(&config), "info");
    }

    #[test]
    fn test_filter_components_are_ordered() {
        let mut config = LoggingConfig {
            level: "debug".to_string(),
            ..LoggingConfig::default()
        };
        config.components.insert("supervisor".to_string(), "trace".to_string());
        config.components.insert("backend".to_string(), "warn".to_string());

        assert_eq!(
            build_filter_directives(&config),
            "debug,fleetgate::backend=warn,fleetgate::supervisor=trace"
        );
    }
}
