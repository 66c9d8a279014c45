//! Device construction from configuration

use std::sync::Arc;

use fresco_transport::{TcpClient, Transport};
use tracing::{debug, error};

use crate::config::{DeviceConfig, FrescoConfig};
use crate::device::FrescoDevice;
use crate::error::{ConfigError, FactoryError, SdkError};

/// Builds [`FrescoDevice`]s from device config entries
///
/// ```rust,no_run
/// use fresco_sdk::{DeviceConfig, FrescoFactory};
///
/// let entry: DeviceConfig = serde_json::from_str(r#"{
///     "key": "lighting-1",
///     "name": "Boardroom",
///     "type": "acuityfresco",
///     "properties": {
///         "control": {
///             "method": "tcpIp",
///             "tcpSshProperties": { "address": "10.0.0.20", "port": 23 }
///         },
///         "scenes": [{ "id": 1, "level": 100, "roomId": "A", "name": "Full" }]
///     }
/// }"#).unwrap();
///
/// let device = FrescoFactory::new().build_device(&entry).unwrap();
/// device.initialize().unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FrescoFactory;

impl FrescoFactory {
    pub const TYPE_NAMES: &'static [&'static str] = &["acuityfresco"];

    pub fn new() -> Self {
        Self
    }

    /// Whether `device_type` names a Fresco device (case-insensitive)
    pub fn supports(&self, device_type: &str) -> bool {
        Self::TYPE_NAMES
            .iter()
            .any(|name| name.eq_ignore_ascii_case(device_type))
    }

    /// Build a device connected over TCP as configured
    pub fn build_device(&self, entry: &DeviceConfig) -> Result<Arc<FrescoDevice>, FactoryError> {
        let config = self.parse(entry)?;
        let tcp = config
            .control
            .as_ref()
            .ok_or(ConfigError::Missing("control"))
            .and_then(|control| control.tcp_config())
            .map_err(|source| config_error(entry, source))?;

        let transport: Arc<dyn Transport> = Arc::new(TcpClient::new(tcp.clone()));
        self.finish(entry, config, transport)
    }

    /// Build a device on a transport supplied by the caller
    ///
    /// The `control` section is ignored.
    pub fn build_device_with_transport(
        &self,
        entry: &DeviceConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<FrescoDevice>, FactoryError> {
        let config = self.parse(entry)?;
        self.finish(entry, config, transport)
    }

    fn parse(&self, entry: &DeviceConfig) -> Result<FrescoConfig, FactoryError> {
        if !self.supports(&entry.device_type) {
            return Err(FactoryError::UnsupportedType(entry.device_type.clone()));
        }
        debug!(device = %entry.key, device_type = %entry.device_type, "Building device");
        FrescoConfig::from_value(&entry.properties).map_err(|source| config_error(entry, source))
    }

    fn finish(
        &self,
        entry: &DeviceConfig,
        config: FrescoConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<FrescoDevice>, FactoryError> {
        FrescoDevice::new(&entry.key, &entry.name, config, transport).map_err(|e| match e {
            SdkError::Config(source) => config_error(entry, source),
            other => {
                error!(device = %entry.key, error = %other, "Failed to build device");
                FactoryError::Device {
                    key: entry.key.clone(),
                    source: Box::new(other),
                }
            }
        })
    }
}

fn config_error(entry: &DeviceConfig, source: ConfigError) -> FactoryError {
    error!(device = %entry.key, error = %source, "Invalid device configuration");
    FactoryError::Config {
        key: entry.key.clone(),
        source,
    }
}
