//! Device configuration
//!
//! Mirrors the JSON a control system hands a device plugin:
//!
//! ```json
//! {
//!   "key": "lighting-1",
//!   "name": "Room Lighting",
//!   "type": "acuityfresco",
//!   "properties": {
//!     "control": {
//!       "method": "tcpIp",
//!       "tcpSshProperties": { "address": "10.0.0.50", "port": 23 }
//!     },
//!     "pollTimeMs": 30000,
//!     "warningTimeoutMs": 120000,
//!     "errorTimeoutMs": 300000,
//!     "scenes": [
//!       { "id": 1, "level": 100, "roomId": "A", "name": "Full" },
//!       { "id": 0, "level": 0, "roomId": "A", "name": "Off" }
//!     ]
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use fresco_protocol::{Delimiter, Scene, SceneCommandFormat};
use fresco_transport::TcpConfig;
use serde::{Deserialize, Serialize};

use crate::bridge::JoinOverride;
use crate::error::ConfigError;
use crate::registry::ActivationPolicy;

/// Generic device entry, as found in a control system's device list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// How the device is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlConfig {
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub tcp_ssh_properties: Option<TcpConfig>,
}

fn default_method() -> String {
    "tcpIp".to_string()
}

impl ControlConfig {
    pub fn tcp(config: TcpConfig) -> Self {
        Self {
            method: default_method(),
            tcp_ssh_properties: Some(config),
        }
    }

    /// TCP settings, checked for use
    pub fn tcp_config(&self) -> Result<&TcpConfig, ConfigError> {
        if !self.method.eq_ignore_ascii_case("tcpip") {
            return Err(ConfigError::UnsupportedControlMethod(self.method.clone()));
        }
        let tcp = self
            .tcp_ssh_properties
            .as_ref()
            .ok_or(ConfigError::Missing("control.tcpSshProperties"))?;
        tcp.validate()?;
        Ok(tcp)
    }
}

/// Device-specific properties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrescoConfig {
    #[serde(default)]
    pub control: Option<ControlConfig>,

    #[serde(default = "default_poll_time_ms")]
    pub poll_time_ms: u64,

    #[serde(default = "default_warning_timeout_ms")]
    pub warning_timeout_ms: u64,

    #[serde(default = "default_error_timeout_ms")]
    pub error_timeout_ms: u64,

    #[serde(default)]
    pub scenes: Option<Vec<Scene>>,

    #[serde(default)]
    pub delimiter: Delimiter,

    #[serde(default)]
    pub activation_policy: ActivationPolicy,

    #[serde(default)]
    pub command_format: SceneCommandFormat,

    /// Join overrides by join name
    #[serde(default)]
    pub join_map: HashMap<String, JoinOverride>,
}

fn default_poll_time_ms() -> u64 {
    30_000
}

fn default_warning_timeout_ms() -> u64 {
    120_000
}

fn default_error_timeout_ms() -> u64 {
    300_000
}

impl FrescoConfig {
    /// Config with the given scenes and default settings otherwise
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            control: None,
            poll_time_ms: default_poll_time_ms(),
            warning_timeout_ms: default_warning_timeout_ms(),
            error_timeout_ms: default_error_timeout_ms(),
            scenes: Some(scenes),
            delimiter: Delimiter::default(),
            activation_policy: ActivationPolicy::default(),
            command_format: SceneCommandFormat::default(),
            join_map: HashMap::new(),
        }
    }

    /// Parse the `properties` object of a device entry
    pub fn from_value(properties: &serde_json::Value) -> Result<Self, ConfigError> {
        if properties.is_null() {
            return Err(ConfigError::Missing("properties"));
        }
        let config: Self = serde_json::from_value(properties.clone())?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_timeouts(mut self, poll: Duration, warning: Duration, error: Duration) -> Self {
        self.poll_time_ms = poll.as_millis() as u64;
        self.warning_timeout_ms = warning.as_millis() as u64;
        self.error_timeout_ms = error.as_millis() as u64;
        self
    }

    pub fn with_activation_policy(mut self, policy: ActivationPolicy) -> Self {
        self.activation_policy = policy;
        self
    }

    pub fn with_command_format(mut self, format: SceneCommandFormat) -> Self {
        self.command_format = format;
        self
    }

    pub fn with_delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Check everything construction depends on
    ///
    /// Scenes themselves aren't validated here: an invalid scene is refused
    /// when selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenes.is_none() {
            return Err(ConfigError::Missing("scenes"));
        }
        let ordered = 0 < self.poll_time_ms
            && self.poll_time_ms < self.warning_timeout_ms
            && self.warning_timeout_ms < self.error_timeout_ms;
        if !ordered {
            return Err(ConfigError::InvalidTimeouts {
                poll_ms: self.poll_time_ms,
                warning_ms: self.warning_timeout_ms,
                error_ms: self.error_timeout_ms,
            });
        }
        Ok(())
    }

    pub fn scenes(&self) -> &[Scene] {
        self.scenes.as_deref().unwrap_or_default()
    }

    pub fn poll_time(&self) -> Duration {
        Duration::from_millis(self.poll_time_ms)
    }

    pub fn warning_timeout(&self) -> Duration {
        Duration::from_millis(self.warning_timeout_ms)
    }

    pub fn error_timeout(&self) -> Duration {
        Duration::from_millis(self.error_timeout_ms)
    }
}
