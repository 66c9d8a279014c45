//! Communication health monitor
//!
//! Tracks liveness of the controller from the time since it last said
//! anything. One loop thread owns the status: activity notifications are
//! messages into that loop, and the loop wakes up on its own for polls and
//! timeouts.
//!
//! ```text
//!             activity                     warningTimeout idle
//! Unknown ───────────────► Up ───────────────────────────────► Warning
//!    │                      ▲                                     │
//!    │ warningTimeout idle  │ activity (from any state)           │ errorTimeout idle
//!    ▼                      │                                     ▼
//! Warning ──────────────────┴────────────────────────────────── Error
//! ```
//!
//! The state machine itself is [`MonitorMachine`], which is pure and takes
//! the current time as an argument; [`HealthMonitor`] drives it from a
//! thread.

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::error::ConfigError;

/// Health of the connection to the controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MonitorStatus {
    #[default]
    Unknown,
    Up,
    Warning,
    Error,
}

impl MonitorStatus {
    /// Integer code exported to control surfaces
    pub fn code(self) -> u16 {
        match self {
            Self::Unknown => 0,
            Self::Warning => 1,
            Self::Up => 2,
            Self::Error => 3,
        }
    }

    pub fn is_online(self) -> bool {
        self == Self::Up
    }
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::Up => "Up",
            Self::Warning => "Warning",
            Self::Error => "Error",
        };
        f.write_str(s)
    }
}

/// A status transition with a message for humans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: MonitorStatus,
    pub message: String,
}

/// Monitor timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub warning_timeout: Duration,
    pub error_timeout: Duration,
}

impl MonitorConfig {
    /// Build a config, enforcing `poll < warning < error`
    pub fn new(
        poll_interval: Duration,
        warning_timeout: Duration,
        error_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if poll_interval.is_zero()
            || poll_interval >= warning_timeout
            || warning_timeout >= error_timeout
        {
            return Err(ConfigError::InvalidTimeouts {
                poll_ms: poll_interval.as_millis() as u64,
                warning_ms: warning_timeout.as_millis() as u64,
                error_ms: error_timeout.as_millis() as u64,
            });
        }
        Ok(Self {
            poll_interval,
            warning_timeout,
            error_timeout,
        })
    }
}

// ============================================================================
// MonitorMachine - pure state machine
// ============================================================================

/// Liveness state machine over explicit instants
#[derive(Debug, Clone)]
pub struct MonitorMachine {
    config: MonitorConfig,
    status: MonitorStatus,
    started: Instant,
    last_activity: Option<Instant>,
    last_poll: Option<Instant>,
}

impl MonitorMachine {
    pub fn new(config: MonitorConfig, now: Instant) -> Self {
        Self {
            config,
            status: MonitorStatus::Unknown,
            started: now,
            last_activity: None,
            last_poll: None,
        }
    }

    pub fn status(&self) -> MonitorStatus {
        self.status
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Start of the current idle period
    fn idle_since(&self) -> Instant {
        self.last_activity.unwrap_or(self.started)
    }

    /// Record activity; returns a change if the status wasn't Up
    pub fn activity(&mut self, now: Instant) -> Option<StatusChange> {
        self.last_activity = Some(now);
        if self.status == MonitorStatus::Up {
            return None;
        }
        self.status = MonitorStatus::Up;
        Some(StatusChange {
            status: MonitorStatus::Up,
            message: "Communication is OK".to_string(),
        })
    }

    /// Apply the timeouts; returns a change if one fired
    pub fn evaluate(&mut self, now: Instant) -> Option<StatusChange> {
        let idle = now.saturating_duration_since(self.idle_since());

        let next = if idle >= self.config.error_timeout {
            MonitorStatus::Error
        } else if idle >= self.config.warning_timeout {
            MonitorStatus::Warning
        } else {
            return None;
        };
        if next == self.status {
            return None;
        }

        self.status = next;
        Some(StatusChange {
            status: next,
            message: format!("No response from device for {} ms", idle.as_millis()),
        })
    }

    /// When the next poll is due
    ///
    /// Immediately on start, then one poll interval after the later of the
    /// last poll and the last activity.
    pub fn next_poll(&self) -> Instant {
        match self.last_poll {
            None => self.started,
            Some(polled) => polled.max(self.idle_since()) + self.config.poll_interval,
        }
    }

    pub fn poll_due(&self, now: Instant) -> bool {
        now >= self.next_poll()
    }

    pub fn mark_polled(&mut self, now: Instant) {
        self.last_poll = Some(now);
    }

    /// Earliest instant at which the machine has something to do
    pub fn next_deadline(&self) -> Instant {
        let idle_since = self.idle_since();
        let mut deadline = self.next_poll();

        if !matches!(self.status, MonitorStatus::Warning | MonitorStatus::Error) {
            deadline = deadline.min(idle_since + self.config.warning_timeout);
        }
        if self.status != MonitorStatus::Error {
            deadline = deadline.min(idle_since + self.config.error_timeout);
        }
        deadline
    }
}

// ============================================================================
// HealthMonitor - loop thread
// ============================================================================

/// Poll action issued by the monitor
pub type PollAction = Box<dyn Fn() + Send>;

/// Status change callback
pub type StatusListener = Box<dyn Fn(&StatusChange) + Send>;

enum MonitorMessage {
    Activity(Instant),
    Poll,
    Stop,
}

struct MonitorLoop {
    tx: Sender<MonitorMessage>,
    handle: JoinHandle<()>,
}

/// Timer-driven health monitor
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use fresco_sdk::monitor::{HealthMonitor, MonitorConfig, MonitorStatus};
///
/// let config = MonitorConfig::new(
///     Duration::from_secs(30),
///     Duration::from_secs(120),
///     Duration::from_secs(300),
/// ).unwrap();
/// let monitor = HealthMonitor::new("lighting-1", config);
/// monitor.start(Box::new(|| println!("status scene ALL")), Box::new(|_| {})).unwrap();
///
/// monitor.notify_activity();
/// monitor.stop();
/// ```
pub struct HealthMonitor {
    name: String,
    config: MonitorConfig,
    status: Arc<RwLock<MonitorStatus>>,
    running: Mutex<Option<MonitorLoop>>,
}

impl HealthMonitor {
    pub fn new(name: impl Into<String>, config: MonitorConfig) -> Self {
        Self {
            name: name.into(),
            config,
            status: Arc::new(RwLock::new(MonitorStatus::Unknown)),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Current status, as last written by the loop
    pub fn status(&self) -> MonitorStatus {
        *self.status.read()
    }

    /// Shared handle on the status, for computed feedback
    pub fn status_handle(&self) -> Arc<RwLock<MonitorStatus>> {
        Arc::clone(&self.status)
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Start the loop; a no-op if already running
    ///
    /// `poll` is issued right away, on [`request_poll`](Self::request_poll)
    /// and whenever the device has been idle for a poll interval. `on_change` runs on the loop thread after each
    /// transition has been written.
    pub fn start(&self, poll: PollAction, on_change: StatusListener) -> std::io::Result<()> {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!(monitor = %self.name, "Monitor already running");
            return Ok(());
        }

        let (tx, rx) = channel::unbounded();
        let config = self.config;
        let status = Arc::clone(&self.status);
        let name = self.name.clone();

        let handle = thread::Builder::new()
            .name(format!("fresco-monitor-{}", self.name))
            .spawn(move || {
                let mut machine = MonitorMachine::new(config, Instant::now());
                *status.write() = machine.status();
                debug!(monitor = %name, "Monitor started");

                loop {
                    let now = Instant::now();
                    if let Some(change) = machine.evaluate(now) {
                        publish(&status, &on_change, change);
                    }
                    if machine.poll_due(now) {
                        machine.mark_polled(now);
                        poll();
                    }

                    let timeout = machine
                        .next_deadline()
                        .saturating_duration_since(Instant::now());
                    match rx.recv_timeout(timeout) {
                        Ok(MonitorMessage::Activity(at)) => {
                            if let Some(change) = machine.activity(at) {
                                publish(&status, &on_change, change);
                            }
                        }
                        Ok(MonitorMessage::Poll) => {
                            machine.mark_polled(Instant::now());
                            poll();
                        }
                        Ok(MonitorMessage::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }

                debug!(monitor = %name, "Monitor stopped");
            })?;

        *running = Some(MonitorLoop { tx, handle });
        Ok(())
    }

    /// Report inbound activity; ignored when the monitor isn't running
    pub fn notify_activity(&self) {
        if let Some(running) = self.running.lock().as_ref() {
            let _ = running.tx.send(MonitorMessage::Activity(Instant::now()));
        }
    }

    /// Poll now instead of waiting for the next interval
    ///
    /// Ignored when the monitor isn't running.
    pub fn request_poll(&self) {
        if let Some(running) = self.running.lock().as_ref() {
            let _ = running.tx.send(MonitorMessage::Poll);
        }
    }

    /// Stop the loop and wait for it to exit
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.tx.send(MonitorMessage::Stop);
        if running.handle.thread().id() != thread::current().id()
            && running.handle.join().is_err()
        {
            error!(monitor = %self.name, "Monitor loop panicked");
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn publish(status: &RwLock<MonitorStatus>, on_change: &StatusListener, change: StatusChange) {
    *status.write() = change.status;
    on_change(&change);
}
