//! Server Registry module.
//!
//! Read-only catalogue of the configured inference backends.

mod error;
mod server;

pub use error::*;
pub use server::*;

use std::collections::HashMap;
use std::sync::Arc;

/// Model id that matches every server during selection.
pub const ANY_MODEL: &str = "any";

/// The Server Registry holds every configured backend.
///
/// Built once from configuration and never mutated afterwards, so lookups need
/// no locking. Registry order (configuration order) is preserved and used as
/// the tie-breaker wherever a deterministic order matters.
///
/// # Examples
///
/// ```
/// use fleetgate::registry::{LaunchParams, ServerDescriptor, ServerRegistry};
///
/// let registry = ServerRegistry::new(vec![ServerDescriptor {
///     name: "a".to_string(),
///     host: "127.0.0.1".to_string(),
///     port: 8001,
///     model: "m".to_string(),
///     launch: LaunchParams::default(),
///     enabled: true,
///     autostart: false,
/// }])
/// .unwrap();
///
/// assert_eq!(registry.len(), 1);
/// assert!(registry.get("a").is_ok());
/// ```
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: Vec<Arc<ServerDescriptor>>,
    index: HashMap<String, usize>,
}

impl ServerRegistry {
    /// Build a registry from descriptors.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateServer` if two descriptors share a name.
    pub fn new(servers: Vec<ServerDescriptor>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(servers.len());
        let mut stored = Vec::with_capacity(servers.len());

        for (position, server) in servers.into_iter().enumerate() {
            if index.insert(server.name.clone(), position).is_some() {
                return Err(RegistryError::DuplicateServer(server.name));
            }
            stored.push(Arc::new(server));
        }

        Ok(Self {
            servers: stored,
            index,
        })
    }

    /// Look up a server by name.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownServer` if no server has that name.
    pub fn get(&self, name: &str) -> Result<Arc<ServerDescriptor>, RegistryError> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.servers[i]))
            .ok_or_else(|| RegistryError::UnknownServer(name.to_string()))
    }

    /// Whether a server with this name is configured.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All servers in registry order.
    pub fn all(&self) -> Vec<Arc<ServerDescriptor>> {
        self.servers.clone()
    }

    /// Enabled servers in registry order.
    pub fn enabled(&self) -> Vec<Arc<ServerDescriptor>> {
        self.servers.iter().filter(|s| s.enabled).cloned().collect()
    }

    /// Enabled servers serving `model`, or every enabled server for [`ANY_MODEL`].
    pub fn serving(&self, model: &str) -> Vec<Arc<ServerDescriptor>> {
        self.servers
            .iter()
            .filter(|s| s.enabled && (model == ANY_MODEL || s.model == model))
            .cloned()
            .collect()
    }

    /// Position of a server in registry order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Distinct model ids across enabled servers, in first-seen order.
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for server in self.servers.iter().filter(|s| s.enabled) {
            if !models.contains(&server.model) {
                models.push(server.model.clone());
            }
        }
        models
    }

    /// Number of configured servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no servers are configured.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
