//! TCP client session
//!
//! The public API is synchronous. Each session runs on a dedicated worker
//! thread that owns a single-threaded tokio runtime; the client talks to it
//! through a command channel, and the worker reports back through the
//! registered [`EventHandler`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tracing::{debug, error, info, trace, warn};

use crate::config::TcpConfig;
use crate::error::{Result, TransportError};
use crate::status::ConnectionStatus;
use crate::transport::{EventHandler, Transport, TransportEvent};

/// Commands sent from the sync client to the session worker
#[derive(Debug)]
enum SessionCommand {
    /// Write text to the socket
    Send(String),
    /// Close the socket and stop the worker
    Shutdown,
}

/// How a connected session ended
#[derive(Debug)]
enum SessionExit {
    Shutdown,
    Closed,
    Failed(std::io::Error),
}

/// State shared between the client and its worker
struct Shared {
    endpoint: String,
    status: Mutex<ConnectionStatus>,
    handler: RwLock<Option<EventHandler>>,
}

impl Shared {
    fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    /// Update the status, emitting an event only on change
    fn set_status(&self, status: ConnectionStatus) {
        let previous = std::mem::replace(&mut *self.status.lock(), status);
        if previous != status {
            debug!(endpoint = %self.endpoint, from = %previous, to = %status, "Connection status changed");
            self.emit(TransportEvent::StatusChanged(status));
        }
    }

    fn emit(&self, event: TransportEvent) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

/// A running session worker
struct Session {
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    worker: JoinHandle<()>,
}

/// TCP client for a line-oriented text protocol
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use fresco_transport::{TcpClient, TcpConfig, Transport, TransportEvent};
///
/// let client = TcpClient::new(TcpConfig::new("10.0.0.5", 23));
/// client.set_event_handler(Arc::new(|event| {
///     if let TransportEvent::Received(bytes) = event {
///         println!("{}", String::from_utf8_lossy(&bytes));
///     }
/// }));
/// client.connect().unwrap();
/// client.send_text("status scene ALL\n");
/// ```
pub struct TcpClient {
    config: TcpConfig,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl TcpClient {
    pub fn new(config: TcpConfig) -> Self {
        let shared = Arc::new(Shared {
            endpoint: config.endpoint(),
            status: Mutex::new(ConnectionStatus::Unknown),
            handler: RwLock::new(None),
        });
        Self {
            config,
            shared,
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    fn spawn_worker(&self) -> Result<Session> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);

        let worker = thread::Builder::new()
            .name(format!("fresco-tcp-{}", self.shared.endpoint))
            .spawn(move || {
                // Create a new single-threaded tokio runtime for this session
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to create tokio runtime for TCP session: {}", e);
                        shared.set_status(ConnectionStatus::Disconnected);
                        return;
                    }
                };

                rt.block_on(run_session(config, command_rx, shared));
            })?;

        Ok(Session { command_tx, worker })
    }
}

impl Transport for TcpClient {
    fn connect(&self) -> Result<()> {
        self.config.validate()?;

        let mut session = self.session.lock();
        if let Some(running) = session.as_ref() {
            if !running.worker.is_finished() {
                debug!(endpoint = %self.shared.endpoint, "Session already active, ignoring connect");
                return Ok(());
            }
        }
        // Reap a worker that gave up on its own
        if let Some(finished) = session.take() {
            let _ = finished.worker.join();
        }

        *session = Some(self.spawn_worker()?);
        Ok(())
    }

    fn disconnect(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };

        let _ = session.command_tx.send(SessionCommand::Shutdown);
        if session.worker.thread().id() != thread::current().id() {
            if session.worker.join().is_err() {
                error!(endpoint = %self.shared.endpoint, "TCP session worker panicked");
            }
        }
        self.shared.set_status(ConnectionStatus::Disconnected);
        info!(endpoint = %self.shared.endpoint, "Disconnected");
    }

    fn send_text(&self, text: &str) {
        if !self.is_connected() {
            warn!(endpoint = %self.shared.endpoint, text = %text.trim_end(), "Not connected, dropping send");
            return;
        }

        let session = self.session.lock();
        let sent = session
            .as_ref()
            .map(|s| s.command_tx.send(SessionCommand::Send(text.to_string())).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!(endpoint = %self.shared.endpoint, text = %text.trim_end(), "Session worker gone, dropping send");
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    fn set_event_handler(&self, handler: EventHandler) {
        *self.shared.handler.write() = Some(handler);
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("endpoint", &self.shared.endpoint)
            .field("status", &self.shared.status())
            .finish()
    }
}

/// Connect, drive and reconnect until shut down
async fn run_session(
    config: TcpConfig,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    shared: Arc<Shared>,
) {
    let endpoint = config.endpoint();

    loop {
        shared.set_status(ConnectionStatus::Connecting);
        debug!(%endpoint, "Connecting");

        let connecting = time::timeout(
            config.connect_timeout(),
            TcpStream::connect((config.address.as_str(), config.port)),
        );
        let attempt = tokio::select! {
            attempt = connecting => attempt,
            _ = until_shutdown(&mut commands) => {
                debug!(%endpoint, "Shut down while connecting");
                return;
            }
        };

        match attempt {
            Ok(Ok(stream)) => {
                info!(%endpoint, "Connected");
                shared.set_status(ConnectionStatus::Connected);
                let exit = drive(stream, &config, &mut commands, &shared).await;
                shared.set_status(ConnectionStatus::Disconnected);

                match exit {
                    SessionExit::Shutdown => {
                        debug!(%endpoint, "Session shut down");
                        return;
                    }
                    SessionExit::Closed => info!(%endpoint, "Connection closed by peer"),
                    SessionExit::Failed(e) => warn!(%endpoint, error = %e, "Connection lost"),
                }
            }
            Ok(Err(e)) => {
                warn!(%endpoint, error = %e, "Connection attempt failed");
                shared.set_status(ConnectionStatus::Disconnected);
            }
            Err(_) => {
                let e = TransportError::ConnectTimeout(config.connect_timeout());
                warn!(%endpoint, error = %e, "Connection attempt failed");
                shared.set_status(ConnectionStatus::Disconnected);
            }
        }

        if !config.auto_reconnect {
            debug!(%endpoint, "Auto-reconnect disabled, session ends");
            return;
        }
        if !wait_for_reconnect(&config, &mut commands).await {
            debug!(%endpoint, "Shut down while waiting to reconnect");
            return;
        }
    }
}

/// Pump bytes in and commands out until the connection ends
async fn drive(
    stream: TcpStream,
    config: &TcpConfig,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    shared: &Shared,
) -> SessionExit {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY");
    }
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = BytesMut::with_capacity(config.buffer_size);

    loop {
        tokio::select! {
            read = reader.read_buf(&mut buf) => match read {
                Ok(0) => return SessionExit::Closed,
                Ok(n) => {
                    trace!(bytes = n, "Received");
                    shared.emit(TransportEvent::Received(buf.split().freeze()));
                    buf.reserve(config.buffer_size);
                }
                Err(e) => return SessionExit::Failed(e),
            },

            command = commands.recv() => match command {
                Some(SessionCommand::Send(text)) => {
                    if let Err(e) = writer.write_all(text.as_bytes()).await {
                        return SessionExit::Failed(e);
                    }
                    trace!(text = %text.trim_end(), "Sent");
                }
                Some(SessionCommand::Shutdown) | None => {
                    let _ = writer.shutdown().await;
                    return SessionExit::Shutdown;
                }
            },
        }
    }
}

/// Sleep out the reconnect interval; false if shut down meanwhile
async fn wait_for_reconnect(
    config: &TcpConfig,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
) -> bool {
    tokio::select! {
        _ = time::sleep(config.reconnect_interval()) => true,
        _ = until_shutdown(commands) => false,
    }
}

/// Drop sends until told to shut down
async fn until_shutdown(commands: &mut mpsc::UnboundedReceiver<SessionCommand>) {
    loop {
        match commands.recv().await {
            Some(SessionCommand::Send(text)) => {
                warn!(text = %text.trim_end(), "Not connected, dropping send");
            }
            Some(SessionCommand::Shutdown) | None => return,
        }
    }
}
