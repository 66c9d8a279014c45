//! Scene definitions
//!
//! A scene is a preconfigured lighting state the controller can recall: a
//! scene id, a brightness level and the room(s) it applies to.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Highest scene id the controller accepts (0 means "lights off")
pub const MAX_SCENE_ID: u32 = 36;

/// Highest brightness level, in percent
pub const MAX_LEVEL: u32 = 100;

/// A configured lighting scene
///
/// # Example
///
/// ```rust
/// use fresco_protocol::Scene;
///
/// let scene: Scene = serde_json::from_str(
///     r#"{ "id": 2, "level": 100, "roomId": "AB", "name": "Presentation" }"#,
/// ).unwrap();
/// assert!(scene.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Device-side scene id, 0-36
    pub id: u32,

    /// Brightness level, 0-100
    #[serde(default)]
    pub level: u32,

    /// Room addressing token, one letter per room ("A", "AB", ...)
    #[serde(default)]
    pub room_id: String,

    /// Display label; empty marks an unused slot
    #[serde(default)]
    pub name: String,
}

impl Scene {
    pub fn new(id: u32, level: u32, room_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            level,
            room_id: room_id.into(),
            name: name.into(),
        }
    }

    /// Check the scene can be sent to the controller
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id > MAX_SCENE_ID {
            return Err(ValidationError::range_error("id", 0, MAX_SCENE_ID, self.id));
        }
        if self.level > MAX_LEVEL {
            return Err(ValidationError::range_error("level", 0, MAX_LEVEL, self.level));
        }
        if self.room_id.trim().is_empty() {
            return Err(ValidationError::empty("roomId"));
        }
        Ok(())
    }

    /// Whether the slot has a display name
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Case-insensitive room id comparison, the way the controller reports rooms
    pub fn same_room(&self, room_id: &str) -> bool {
        self.room_id.eq_ignore_ascii_case(room_id)
    }
}
