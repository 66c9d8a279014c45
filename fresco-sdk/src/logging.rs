//! Logging for fresco-sdk
//!
//! Two layers:
//! - process-wide subscriber setup (`init_logging`, `init_logging_from_env`)
//! - per-device debug levels that decide at which `tracing` level each
//!   category of device message is emitted, with an optional timed revert

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics for debugging
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `FRESCO_LOG_LEVEL`: filter directive (error, warn, info, debug, trace,
///   or per-target such as `fresco_sdk=debug`)
/// - `RUST_LOG`: used when `FRESCO_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `FRESCO_LOG_MODE` ("silent", "development" or
/// "debug"; silent when unset)
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("FRESCO_LOG_MODE") {
        Ok(value) => parse_mode(&value)?,
        Err(std::env::VarError::NotPresent) => LoggingMode::Silent,
        Err(e) => return Err(LoggingError::InvalidEnv(format!("FRESCO_LOG_MODE: {e}"))),
    };

    init_logging(mode)
}

pub fn parse_mode(value: &str) -> Result<LoggingMode, LoggingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "silent" | "" => Ok(LoggingMode::Silent),
        "development" | "dev" => Ok(LoggingMode::Development),
        "debug" => Ok(LoggingMode::Debug),
        other => Err(LoggingError::InvalidEnv(format!(
            "FRESCO_LOG_MODE: unknown mode '{other}'"
        ))),
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("FRESCO_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{directives}: {e}")))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

// ============================================================================
// Per-device debug levels
// ============================================================================

/// Highest debug level a category can be set to
pub const MAX_DEBUG_LEVEL: u8 = 2;

/// Debug level of each device message category
///
/// A level is the verbosity a message needs to be shown at: 0 is emitted at
/// `INFO`, 1 at `DEBUG`, 2 at `TRACE`. Lowering a category's level makes its
/// messages show up under a less verbose filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugLevels {
    /// Lifecycle messages
    pub trace: u8,
    /// Status and selection messages
    pub info: u8,
    /// Per-line and per-command detail
    pub verbose: u8,
}

impl Default for DebugLevels {
    fn default() -> Self {
        Self {
            trace: 0,
            info: 1,
            verbose: 2,
        }
    }
}

impl DebugLevels {
    /// Every category at `level`
    pub fn uniform(level: u8) -> Self {
        Self {
            trace: level,
            info: level,
            verbose: level,
        }
    }
}

/// Emit a device message at the `tracing` level its debug level maps to
///
/// ```rust
/// use fresco_sdk::device_log;
///
/// let levels = fresco_sdk::DebugLevels::default();
/// device_log!(levels.info, device = "lighting-1", "Scene selected");
/// ```
#[macro_export]
macro_rules! device_log {
    ($level:expr, $($arg:tt)+) => {
        match $level {
            0 => $crate::__tracing::info!($($arg)+),
            1 => $crate::__tracing::debug!($($arg)+),
            _ => $crate::__tracing::trace!($($arg)+),
        }
    };
}

/// Shared, revertible debug levels of one device
#[derive(Debug, Clone, Default)]
pub struct DeviceDebug {
    levels: Arc<RwLock<DebugLevels>>,
}

impl DeviceDebug {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> DebugLevels {
        *self.levels.read()
    }

    pub fn set(&self, levels: DebugLevels) {
        *self.levels.write() = levels;
    }

    pub fn reset(&self) {
        self.set(DebugLevels::default());
    }

    /// Restore defaults after `delay` unless cancelled first
    pub fn revert_after(&self, device: &str, delay: Duration) -> std::io::Result<RevertTimer> {
        let (cancel_tx, cancel_rx) = channel::bounded::<()>(1);
        let debug = self.clone();
        let device = device.to_string();

        let handle = thread::Builder::new()
            .name(format!("fresco-debug-revert-{device}"))
            .spawn(move || match cancel_rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => {
                    debug.reset();
                    info!(device = %device, "Debug levels reverted to defaults");
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            })?;

        Ok(RevertTimer {
            cancel_tx: Some(cancel_tx),
            handle: Some(handle),
        })
    }
}

/// A pending debug level revert
///
/// Cancelled when dropped.
#[derive(Debug)]
pub struct RevertTimer {
    cancel_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RevertTimer {
    /// Stop the timer without reverting
    pub fn cancel(mut self) {
        self.stop();
    }

    /// Whether the timer has already fired or been cancelled
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.cancel_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RevertTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
