use std::time::Duration;

use thiserror::Error;

/// Errors raised while setting up or running a transport session
///
/// Runtime I/O failures inside a session are logged and turned into status
/// changes; only setup problems reach the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to start session worker: {0}")]
    Worker(#[from] std::io::Error),

    #[error("Connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
}

/// Type alias for results that can return a TransportError
pub type Result<T> = std::result::Result<T, TransportError>;
