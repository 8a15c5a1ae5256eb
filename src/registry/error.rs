/// Errors that can occur during registry lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("duplicate server name: {0}")]
    DuplicateServer(String),
}
