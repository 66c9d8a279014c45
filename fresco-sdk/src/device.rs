//! The Fresco device facade
//!
//! [`FrescoDevice`] owns one controller connection and everything hanging off
//! it:
//!
//! ```text
//! transport ──Received──► LineFramer ──lines──► ResponseProcessor (worker thread)
//!     │                                              │
//!     │                                              ├── HealthMonitor::notify_activity
//!     │                                              └── SceneRegistry::confirm ─┐
//!     └──StatusChanged──► socket status cell                                      │
//!                                                                                  ▼
//! select_scene() ──► SceneRegistry::select ──► transport.send_text      FeedbackStore
//!                                                                      (transactional)
//! HealthMonitor loop ──► poll (status scene ALL), status cells ───────────────▲
//! ```
//!
//! The registry is only mutated inside a feedback transaction. Lock order is
//! store first, registry second.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use feedback_store::FeedbackStore;
use fresco_protocol::{Command, Delimiter, LineFramer, Scene, SceneReport, ValidationError};
use fresco_transport::{ConnectionStatus, Transport, TransportEvent};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bridge::JoinOverride;
use crate::config::FrescoConfig;
use crate::device_log;
use crate::error::{Result, SelectionError};
use crate::feedback::{register_cells, selection_keys, FeedbackKey, FeedbackSources};
use crate::logging::{DebugLevels, DeviceDebug, RevertTimer, MAX_DEBUG_LEVEL};
use crate::monitor::{HealthMonitor, MonitorConfig, MonitorStatus};
use crate::processor::{QueuedLine, ResponseProcessor, ShutdownMode};
use crate::registry::{SceneRegistry, SceneState, Selection};

/// A device that talks in lines of text
pub trait LineDevice {
    /// Send text with the configured delimiter appended
    fn send_text(&self, text: &str);

    /// Feed one inbound line, as if it had come off the wire
    fn handle_line(&self, line: &str);
}

/// Outbound half of the connection: framing and logging around the transport
#[derive(Clone)]
struct CommandSender {
    key: String,
    transport: Arc<dyn Transport>,
    delimiter: Delimiter,
    debug: DeviceDebug,
}

impl CommandSender {
    fn send_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        device_log!(self.debug.levels().verbose, device = %self.key, text, "Sending");
        self.transport
            .send_text(&format!("{text}{}", self.delimiter.as_str()));
    }

    fn send(&self, command: &Command) {
        self.send_text(&command.to_string());
    }
}

/// Everything the processor thread needs to interpret a line
struct LineContext {
    key: String,
    registry: Arc<Mutex<SceneRegistry>>,
    feedback: FeedbackStore<FeedbackKey>,
    monitor: Arc<HealthMonitor>,
    debug: DeviceDebug,
}

impl LineContext {
    fn process(&self, item: &QueuedLine) {
        let line = item.line.trim();
        if line.is_empty() {
            return;
        }
        self.monitor.notify_activity();

        let levels = self.debug.levels();
        let report = match SceneReport::parse_line(line) {
            Ok(report) => report,
            Err(e) => {
                debug!(device = %self.key, seq = item.seq, error = %e, "Discarding line");
                return;
            }
        };
        device_log!(
            levels.verbose,
            device = %self.key,
            seq = item.seq,
            scene_id = %report.scene_id,
            level = %report.level,
            room_id = %report.room_id,
            "Scene report"
        );

        let change = self.feedback.transaction_with(|| {
            let change = self.registry.lock().confirm(&report);
            (change, selection_keys(change))
        });
        if let Some(change) = change {
            device_log!(
                levels.info,
                device = %self.key,
                previous = ?change.previous,
                current = ?change.current,
                "Scene confirmed by controller"
            );
        }
    }
}

/// An Acuity Fresco lighting controller
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fresco_protocol::Scene;
/// use fresco_sdk::{FrescoConfig, FrescoDevice};
/// use fresco_transport::{TcpClient, TcpConfig};
///
/// # fn main() -> fresco_sdk::Result<()> {
/// let config = FrescoConfig::new(vec![
///     Scene::new(1, 100, "A", "Full"),
///     Scene::new(0, 0, "A", "Off"),
/// ]);
/// let transport = Arc::new(TcpClient::new(TcpConfig::new("10.0.0.20", 23)));
/// let device = FrescoDevice::new("lighting-1", "Boardroom", config, transport)?;
///
/// device.initialize()?;
/// device.select_scene(0)?;
/// # Ok(())
/// # }
/// ```
pub struct FrescoDevice {
    key: String,
    name: String,
    me: Weak<FrescoDevice>,
    join_overrides: HashMap<String, JoinOverride>,
    transport: Arc<dyn Transport>,
    sender: CommandSender,
    registry: Arc<Mutex<SceneRegistry>>,
    feedback: FeedbackStore<FeedbackKey>,
    monitor: Arc<HealthMonitor>,
    processor: Arc<ResponseProcessor>,
    debug: DeviceDebug,
    revert_timer: Mutex<Option<RevertTimer>>,
    disposed: AtomicBool,
}

impl FrescoDevice {
    /// Build a device on `transport`
    ///
    /// Nothing is connected until [`initialize`](Self::initialize).
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        config: FrescoConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>> {
        let key = key.into();
        let name = name.into();
        config.validate()?;
        let monitor_config = MonitorConfig::new(
            config.poll_time(),
            config.warning_timeout(),
            config.error_timeout(),
        )?;

        let debug = DeviceDebug::new();
        let registry = Arc::new(Mutex::new(SceneRegistry::new(
            config.scenes().to_vec(),
            config.activation_policy,
            config.command_format,
        )));
        let monitor = Arc::new(HealthMonitor::new(key.clone(), monitor_config));
        let socket_status = Arc::new(AtomicU16::new(transport.status().code()));

        let feedback = FeedbackStore::new();
        register_cells(
            &feedback,
            &FeedbackSources {
                registry: Arc::clone(&registry),
                monitor_status: monitor.status_handle(),
                socket_status: Arc::clone(&socket_status),
            },
        );

        let context = LineContext {
            key: key.clone(),
            registry: Arc::clone(&registry),
            feedback: feedback.clone(),
            monitor: Arc::clone(&monitor),
            debug: debug.clone(),
        };
        let processor = Arc::new(ResponseProcessor::start(key.clone(), move |item: &QueuedLine| {
            context.process(item)
        })?);

        let framer = Arc::new(Mutex::new(LineFramer::new(config.delimiter)));
        {
            let key = key.clone();
            let processor = Arc::clone(&processor);
            let feedback = feedback.clone();
            let monitor = Arc::downgrade(&monitor);
            transport.set_event_handler(Arc::new(move |event| match event {
                TransportEvent::Received(bytes) => {
                    let mut framer = framer.lock();
                    framer.push(&bytes);
                    while let Some(line) = framer.next() {
                        processor.enqueue(line);
                    }
                }
                TransportEvent::StatusChanged(status) => {
                    info!(device = %key, %status, "Socket status changed");
                    if !status.is_connected() {
                        framer.lock().reset();
                    }
                    feedback.transaction(&[FeedbackKey::SocketStatus], || {
                        socket_status.store(status.code(), Ordering::SeqCst)
                    });
                    // Polls made while connecting were dropped
                    if status.is_connected() {
                        if let Some(monitor) = monitor.upgrade() {
                            monitor.request_poll();
                        }
                    }
                }
            }));
        }

        let sender = CommandSender {
            key: key.clone(),
            transport: Arc::clone(&transport),
            delimiter: config.delimiter,
            debug: debug.clone(),
        };

        info!(
            device = %key,
            scenes = config.scenes().len(),
            policy = ?config.activation_policy,
            format = ?config.command_format,
            "Fresco device created"
        );

        Ok(Arc::new_cyclic(|me| Self {
            key,
            name,
            me: me.clone(),
            join_overrides: config.join_map,
            transport,
            sender,
            registry,
            feedback,
            monitor,
            processor,
            debug,
            revert_timer: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn weak(&self) -> Weak<FrescoDevice> {
        self.me.clone()
    }

    pub(crate) fn join_overrides(&self) -> &HashMap<String, JoinOverride> {
        &self.join_overrides
    }

    /// Connect, start the health monitor and publish every cell once
    pub fn initialize(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(SelectionError::Disposed.into());
        }
        device_log!(self.debug.levels().trace, device = %self.key, "Initializing");
        self.transport.connect()?;

        let poll = self.sender.clone();
        let feedback = self.feedback.clone();
        let key = self.key.clone();
        self.monitor.start(
            Box::new(move || {
                if poll.transport.is_connected() {
                    poll.send(&Command::status(None, None));
                }
            }),
            Box::new(move |change| {
                info!(device = %key, status = %change.status, message = %change.message, "Monitor status changed");
                feedback.fire_updates(&[FeedbackKey::MonitorStatus, FeedbackKey::Online]);
            }),
        )?;

        self.feedback.fire_all();
        Ok(())
    }

    /// Select a catalog scene by 0-based index
    ///
    /// On error nothing is sent and the selection is unchanged.
    pub fn select_scene(&self, index: usize) -> std::result::Result<(), SelectionError> {
        device_log!(self.debug.levels().verbose, device = %self.key, index, "Select scene");
        self.apply_selection(|registry| registry.select(index))
    }

    /// Select a scene given directly
    ///
    /// A scene matching a catalog entry selects that entry; any other valid
    /// scene is only sent.
    pub fn select_scene_ref(&self, scene: &Scene) -> std::result::Result<(), SelectionError> {
        device_log!(
            self.debug.levels().verbose,
            device = %self.key,
            scene_id = scene.id,
            level = scene.level,
            room_id = %scene.room_id,
            "Select scene"
        );
        self.apply_selection(|registry| registry.select_ref(scene))
    }

    fn apply_selection(
        &self,
        select: impl FnOnce(&mut SceneRegistry) -> std::result::Result<Selection, SelectionError>,
    ) -> std::result::Result<(), SelectionError> {
        if self.is_disposed() {
            return Err(SelectionError::Disposed);
        }
        let levels = self.debug.levels();
        let result = self.feedback.transaction_with(|| {
            let mut registry = self.registry.lock();
            match select(&mut registry) {
                Ok(selection) => {
                    self.sender.send(&selection.command);
                    (Ok(selection.change), selection_keys(selection.change))
                }
                Err(e) => (Err(e), Vec::new()),
            }
        });

        match result {
            Ok(change) => {
                device_log!(
                    levels.info,
                    device = %self.key,
                    current = ?change.and_then(|c| c.current),
                    "Scene selected"
                );
                Ok(())
            }
            Err(e) => {
                warn!(device = %self.key, error = %e, "Scene selection refused");
                Err(e)
            }
        }
    }

    /// Query scene status from the controller
    ///
    /// `poll(None, None)` asks for every scene.
    pub fn poll(&self, scene_id: Option<u32>, room_id: Option<&str>) {
        self.sender.send(&Command::status(scene_id, room_id));
    }

    /// Catalog with active flags
    pub fn scenes(&self) -> Vec<SceneState> {
        self.registry.lock().states()
    }

    pub fn scene_count(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn selected_scene(&self) -> Option<usize> {
        self.registry.lock().selected()
    }

    /// Scene sent but not yet confirmed, under confirm-on-response
    pub fn pending_scene(&self) -> Option<usize> {
        self.registry.lock().pending()
    }

    /// Log every catalog entry
    pub fn log_scenes(&self) {
        let debug_level = self.debug.levels().trace;
        for state in self.scenes() {
            device_log!(
                debug_level,
                device = %self.key,
                index = state.index,
                scene_id = state.scene.id,
                scene_level = state.scene.level,
                room_id = %state.scene.room_id,
                name = %state.scene.name,
                active = state.is_active,
                "Scene"
            );
        }
    }

    // ------------------------------------------------------------------------
    // Debug levels
    // ------------------------------------------------------------------------

    /// Promote every message category to `level`, optionally reverting to
    /// defaults after `revert_after`
    pub fn set_debug_levels(&self, level: u8, revert_after: Option<Duration>) -> Result<()> {
        if level > MAX_DEBUG_LEVEL {
            return Err(ValidationError::range_error("level", 0, MAX_DEBUG_LEVEL, level).into());
        }
        let mut timer = self.revert_timer.lock();
        if let Some(previous) = timer.take() {
            previous.cancel();
        }
        self.debug.set(DebugLevels::uniform(level));
        if let Some(delay) = revert_after {
            *timer = Some(self.debug.revert_after(&self.key, delay)?);
        }
        info!(device = %self.key, level, revert_after = ?revert_after, "Debug levels set");
        Ok(())
    }

    /// Restore default debug levels and cancel any pending revert
    pub fn reset_debug_levels(&self) {
        if let Some(timer) = self.revert_timer.lock().take() {
            timer.cancel();
        }
        self.debug.reset();
        info!(device = %self.key, "Debug levels reset");
    }

    pub fn debug_levels(&self) -> DebugLevels {
        self.debug.levels()
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    pub fn feedback(&self) -> &FeedbackStore<FeedbackKey> {
        &self.feedback
    }

    pub fn monitor_status(&self) -> MonitorStatus {
        self.monitor.status()
    }

    pub fn is_online(&self) -> bool {
        self.monitor_status().is_online()
    }

    pub fn socket_status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    /// Lines handled by the processor so far
    pub fn lines_processed(&self) -> u64 {
        self.processor.processed()
    }

    /// An external consumer came back: push everything again
    pub fn on_consumer_online(&self) {
        self.feedback.republish_all();
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Stop the device, draining queued lines
    pub fn dispose(&self) {
        self.dispose_with(ShutdownMode::Drain);
    }

    /// Stop the device
    ///
    /// Monitor first, then the queue, then the connection. Idempotent.
    pub fn dispose_with(&self, mode: ShutdownMode) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        device_log!(self.debug.levels().trace, device = %self.key, ?mode, "Disposing");

        self.monitor.stop();
        self.processor.shutdown(mode);
        self.transport.disconnect();
        self.transport.set_event_handler(Arc::new(|_| {}));
        if let Some(timer) = self.revert_timer.lock().take() {
            timer.cancel();
        }
    }
}

impl LineDevice for FrescoDevice {
    fn send_text(&self, text: &str) {
        self.sender.send_text(text);
    }

    fn handle_line(&self, line: &str) {
        self.processor.enqueue(line);
    }
}

impl Drop for FrescoDevice {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for FrescoDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrescoDevice")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("socket_status", &self.socket_status())
            .field("monitor_status", &self.monitor_status())
            .field("selected", &self.selected_scene())
            .finish()
    }
}
