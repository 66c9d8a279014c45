//! The transport seam between a device and its connection

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::status::ConnectionStatus;

/// Something that happened on a transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes received, not yet framed
    Received(Bytes),
    /// The session moved to a new status
    StatusChanged(ConnectionStatus),
}

/// Callback receiving every event of a session
///
/// Runs on the transport's own thread; keep it short and never call
/// `disconnect()` from it.
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// A bidirectional text session
///
/// Implementations deliver events asynchronously relative to the calls that
/// cause them: `connect()` returns before the session is up and the
/// `StatusChanged(Connected)` event follows.
pub trait Transport: Send + Sync {
    /// Start connecting; a no-op when already connecting or connected
    fn connect(&self) -> Result<()>;

    /// Stop the session and cancel any pending reconnect
    fn disconnect(&self);

    /// Send text as-is
    ///
    /// Fire-and-forget: when the session isn't connected the text is dropped
    /// and a warning logged.
    fn send_text(&self, text: &str);

    /// Current session status
    fn status(&self) -> ConnectionStatus;

    fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Register the event handler, replacing any previous one
    fn set_event_handler(&self, handler: EventHandler);
}
