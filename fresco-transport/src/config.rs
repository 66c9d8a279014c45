use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// TCP session settings
///
/// Deserializes from the `control.tcpSshProperties` block of a device config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpConfig {
    /// Controller host name or IP address
    pub address: String,

    pub port: u16,

    /// Reconnect after the connection drops or an attempt fails
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    #[serde(default = "default_auto_reconnect_interval_ms")]
    pub auto_reconnect_interval_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Receive buffer size per read
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_auto_reconnect_interval_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_buffer_size() -> usize {
    32768
}

impl TcpConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            auto_reconnect: default_auto_reconnect(),
            auto_reconnect_interval_ms: default_auto_reconnect_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            buffer_size: default_buffer_size(),
        }
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.auto_reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.auto_reconnect_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the settings before a session is started
    pub fn validate(&self) -> Result<()> {
        if self.address.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "address must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(TransportError::InvalidConfig("port must not be 0".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(TransportError::InvalidConfig(
                "bufferSize must be greater than 0".to_string(),
            ));
        }
        if self.auto_reconnect && self.auto_reconnect_interval_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "autoReconnectIntervalMs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `address:port`, for logging
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
