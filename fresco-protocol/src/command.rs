//! Outbound commands
//!
//! The controller speaks a plain ASCII command set. Only scene recall and
//! scene status queries are needed here:
//!
//! ```text
//! scene {id} {level} 0 {room}      recall a scene (zone-addressed)
//! scene {id} {level} {room}        recall a scene (legacy firmware)
//! status scene ALL                 report every scene
//! status scene {id}                report one scene
//! status scene {id} 0 {room}       report one scene in one room
//! ```
//!
//! Commands render without a delimiter; the transport layer appends it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::scene::Scene;

/// Which revision of the scene recall command to produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SceneCommandFormat {
    /// `scene {id} {level} 0 {room}`
    #[default]
    ZoneAddressed,
    /// `scene {id} {level} {room}`
    Legacy,
}

/// A command for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Recall a scene
    SelectScene {
        id: u32,
        level: u32,
        room_id: String,
        format: SceneCommandFormat,
    },
    /// Query every scene
    StatusAll,
    /// Query one scene, optionally scoped to a room
    StatusScene { id: u32, room_id: Option<String> },
}

impl Command {
    /// Build a scene recall command, validating the scene first
    pub fn select_scene(scene: &Scene, format: SceneCommandFormat) -> Result<Self, ValidationError> {
        scene.validate()?;
        Ok(Self::SelectScene {
            id: scene.id,
            level: scene.level,
            room_id: scene.room_id.clone(),
            format,
        })
    }

    /// Build a status query
    ///
    /// A room without a scene index queries scene 0 in that room.
    pub fn status(scene_id: Option<u32>, room_id: Option<&str>) -> Self {
        match (scene_id, room_id) {
            (None, None) => Self::StatusAll,
            (id, room) => Self::StatusScene {
                id: id.unwrap_or(0),
                room_id: room.map(str::to_string),
            },
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectScene {
                id,
                level,
                room_id,
                format: SceneCommandFormat::ZoneAddressed,
            } => write!(f, "scene {id} {level} 0 {room_id}"),
            Self::SelectScene {
                id,
                level,
                room_id,
                format: SceneCommandFormat::Legacy,
            } => write!(f, "scene {id} {level} {room_id}"),
            Self::StatusAll => f.write_str("status scene ALL"),
            Self::StatusScene { id, room_id: None } => write!(f, "status scene {id}"),
            Self::StatusScene {
                id,
                room_id: Some(room),
            } => write!(f, "status scene {id} 0 {room}"),
        }
    }
}
