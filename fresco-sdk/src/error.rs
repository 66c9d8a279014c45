//! Error types for fresco-sdk

use fresco_protocol::ValidationError;
use fresco_transport::TransportError;
use thiserror::Error;

use crate::logging::LoggingError;

/// Result type for fresco-sdk operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// Configuration problems, fatal to device construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse device properties: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Unsupported control method '{0}' (expected tcpIp)")]
    UnsupportedControlMethod(String),

    #[error(
        "Timeouts must satisfy pollTimeMs < warningTimeoutMs < errorTimeoutMs \
         (got {poll_ms} / {warning_ms} / {error_ms})"
    )]
    InvalidTimeouts {
        poll_ms: u64,
        warning_ms: u64,
        error_ms: u64,
    },

    #[error("Invalid transport settings: {0}")]
    Transport(#[from] TransportError),
}

/// A scene selection that was refused; nothing was sent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Scene index {index} is out of range ({len} scenes configured)")]
    OutOfRange { index: usize, len: usize },

    #[error("Scene {index:?} is invalid: {source}")]
    InvalidScene {
        index: Option<usize>,
        #[source]
        source: ValidationError,
    },

    #[error("Device has been disposed")]
    Disposed,
}

/// Device factory errors
#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("Unsupported device type '{0}'")]
    UnsupportedType(String),

    #[error("Invalid configuration for device '{key}': {source}")]
    Config {
        key: String,
        #[source]
        source: ConfigError,
    },

    #[error("Failed to build device '{key}': {source}")]
    Device {
        key: String,
        #[source]
        source: Box<SdkError>,
    },
}

/// Top-level error for fresco-sdk
#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Factory(#[from] FactoryError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("Failed to start worker thread: {0}")]
    Worker(#[from] std::io::Error),
}
