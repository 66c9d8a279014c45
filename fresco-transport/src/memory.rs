//! In-memory transport for tests
//!
//! Records what is sent and lets a test play the controller's side by
//! injecting received bytes and status changes. Events are delivered
//! synchronously on the calling thread.

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use bytes::Bytes;

use crate::error::Result;
use crate::status::ConnectionStatus;
use crate::transport::{EventHandler, Transport, TransportEvent};

/// Transport double backed by plain memory
#[derive(Default)]
pub struct MemoryTransport {
    status: Mutex<ConnectionStatus>,
    handler: RwLock<Option<EventHandler>>,
    sent: Mutex<Vec<String>>,
    connect_calls: Mutex<usize>,
    /// When set, `connect()` stops at Connecting and the test decides
    manual: bool,
}

impl MemoryTransport {
    /// A transport that connects as soon as asked
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `connect()` only reaches Connecting
    pub fn manual() -> Self {
        Self {
            manual: true,
            ..Self::default()
        }
    }

    /// Play received bytes into the session
    pub fn inject(&self, bytes: impl Into<Bytes>) {
        self.emit(TransportEvent::Received(bytes.into()));
    }

    /// Move the session to `status`, emitting an event on change
    pub fn set_status(&self, status: ConnectionStatus) {
        let previous = std::mem::replace(&mut *self.status.lock(), status);
        if previous != status {
            self.emit(TransportEvent::StatusChanged(status));
        }
    }

    /// Everything sent while connected, oldest first
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Take and clear the sent log
    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn connect_calls(&self) -> usize {
        *self.connect_calls.lock()
    }

    fn emit(&self, event: TransportEvent) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> Result<()> {
        *self.connect_calls.lock() += 1;
        if self.status().is_active() {
            return Ok(());
        }
        self.set_status(ConnectionStatus::Connecting);
        if !self.manual {
            self.set_status(ConnectionStatus::Connected);
        }
        Ok(())
    }

    fn disconnect(&self) {
        if self.status() != ConnectionStatus::Unknown {
            self.set_status(ConnectionStatus::Disconnected);
        }
    }

    fn send_text(&self, text: &str) {
        if !self.is_connected() {
            warn!(text = %text.trim_end(), "Not connected, dropping send");
            return;
        }
        self.sent.lock().push(text.to_string());
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    fn set_event_handler(&self, handler: EventHandler) {
        *self.handler.write() = Some(handler);
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("status", &self.status())
            .field("sent", &self.sent.lock().len())
            .finish()
    }
}
