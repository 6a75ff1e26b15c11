//! Engine and host error types.

use thiserror::Error;

/// Error reported by a host audio API primitive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("Node type not supported by host: {0}")]
    UnsupportedNodeType(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Scheduling failed: {0}")]
    SchedulingFailed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for host primitives.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Graph error: {0}")]
    Graph(#[from] resound_core::Error),

    #[error("Engine driver closed")]
    DriverClosed,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
