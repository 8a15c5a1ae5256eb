//! Error types for health probing.

use thiserror::Error;

/// Failures observed while probing a backend.
///
/// Never returned to callers; rendered into the cached record's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// TCP connect failed or timed out
    #[error("Port {port} is not accessible on {host}")]
    PortInaccessible { host: String, port: u16 },

    /// Request timeout
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection failed
    #[error("connection failed: {0}")]
    Connection(String),

    /// Non-success HTTP status
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// Body could not be parsed
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
