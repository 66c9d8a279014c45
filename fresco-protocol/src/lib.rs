//! Acuity Fresco wire protocol
//!
//! The pieces of the controller's line protocol that don't depend on a
//! connection: scene definitions, outbound command formatting, inbound
//! status report parsing and byte-stream line framing.
//!
//! # Example
//!
//! ```rust
//! use fresco_protocol::{Command, Scene, SceneCommandFormat, SceneReport};
//!
//! let scene = Scene::new(2, 100, "AB", "Presentation");
//! let command = Command::select_scene(&scene, SceneCommandFormat::default()).unwrap();
//! assert_eq!(command.to_string(), "scene 2 100 0 AB");
//!
//! let report = SceneReport::parse("scene 2 100 0 ab").unwrap();
//! assert!(report.matches(&scene));
//! ```

pub mod command;
pub mod error;
pub mod framing;
pub mod response;
pub mod scene;

pub use command::{Command, SceneCommandFormat};
pub use error::{ProtocolError, Result, ValidationError};
pub use framing::{Delimiter, LineFramer, DEFAULT_MAX_LINE_LENGTH};
pub use response::SceneReport;
pub use scene::{Scene, MAX_LEVEL, MAX_SCENE_ID};
