//! Transport sessions for the Acuity Fresco controller
//!
//! A [`Transport`] connects, sends text and reports what it receives as
//! [`TransportEvent`]s. [`TcpClient`] is the production implementation; with
//! the `test-support` feature, [`MemoryTransport`] stands in for it in tests.
//!
//! # Architecture
//!
//! ```text
//! TcpClient (sync API)
//!     │
//!     ├── command channel ──► session worker thread
//!     │                           │
//!     │                           └── tokio current_thread runtime
//!     │                                   ├── connect (timeout)
//!     │                                   ├── read  ──► TransportEvent::Received
//!     │                                   ├── write ◄── SessionCommand::Send
//!     │                                   └── reconnect after interval
//!     │
//!     └── EventHandler ◄── TransportEvent::StatusChanged
//! ```

pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod status;
pub mod tcp;
pub mod transport;

pub use config::TcpConfig;
pub use error::{Result, TransportError};
#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryTransport;
pub use status::ConnectionStatus;
pub use tcp::TcpClient;
pub use transport::{EventHandler, Transport, TransportEvent};
