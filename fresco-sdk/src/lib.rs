//! Acuity Fresco lighting controller SDK
//!
//! A sync-first adapter that keeps a TCP session to a Fresco controller,
//! selects lighting scenes, tracks the controller's health and exports
//! everything as observable feedback cells for a control surface.
//!
//! # Architecture
//!
//! ```text
//! FrescoFactory ──► FrescoDevice
//!                     ├── Transport (TcpClient, worker thread)
//!                     ├── LineFramer ──► ResponseProcessor (worker thread)
//!                     ├── HealthMonitor (timer thread) ──► "status scene ALL"
//!                     ├── SceneRegistry (selection state)
//!                     └── FeedbackStore<FeedbackKey> ──► SignalSink (bridge)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fresco_protocol::Scene;
//! use fresco_sdk::{FeedbackKey, FrescoConfig, FrescoDevice};
//! use fresco_transport::{TcpClient, TcpConfig};
//!
//! # fn main() -> fresco_sdk::Result<()> {
//! fresco_sdk::logging::init_logging_from_env()?;
//!
//! let config = FrescoConfig::new(vec![
//!     Scene::new(1, 100, "A", "Full"),
//!     Scene::new(2, 50, "A", "Dim"),
//!     Scene::new(0, 0, "A", "Off"),
//! ]);
//! let transport = Arc::new(TcpClient::new(TcpConfig::new("10.0.0.20", 23)));
//! let device = FrescoDevice::new("lighting-1", "Boardroom", config, transport)?;
//! device.initialize()?;
//!
//! // Pull-style change consumption
//! device.feedback().watch(FeedbackKey::SelectedScene);
//! device.select_scene(1)?;
//! for event in device.feedback().iter().try_iter() {
//!     println!("{} = {}", event.key, event.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod factory;
pub mod feedback;
pub mod logging;
pub mod monitor;
pub mod processor;
pub mod registry;

pub use bridge::{Bridgeable, JoinData, JoinMap, JoinOverride, JoinType, SignalSink};
pub use config::{ControlConfig, DeviceConfig, FrescoConfig};
pub use device::{FrescoDevice, LineDevice};
pub use error::{ConfigError, FactoryError, Result, SdkError, SelectionError};
pub use factory::FrescoFactory;
pub use feedback::FeedbackKey;
pub use logging::{DebugLevels, LoggingMode};
pub use monitor::{MonitorStatus, StatusChange};
pub use processor::ShutdownMode;
pub use registry::{ActivationPolicy, SceneState};

// Re-exported so `device_log!` works without a direct tracing dependency
#[doc(hidden)]
pub use tracing as __tracing;
