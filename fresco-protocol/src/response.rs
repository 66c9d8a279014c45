//! Inbound scene status reports
//!
//! The controller answers a recall or a status query with one line per
//! scene: `scene {id} {level} 0 {room}`. The keyword is matched without
//! regard to case and fields may be separated by any run of whitespace.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ProtocolError, Result};
use crate::scene::Scene;

fn report_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*scene\s+(\d+)\s+(\d+)\s+0\s+([a-z]+)\s*$")
            .expect("scene report pattern is valid")
    })
}

/// A parsed scene status line
///
/// Fields are kept as reported; the room id is lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneReport {
    pub scene_id: String,
    pub level: String,
    pub room_id: String,
}

impl SceneReport {
    /// Parse a line, returning `None` if it isn't a scene report
    pub fn parse(line: &str) -> Option<Self> {
        let caps = report_pattern().captures(line)?;
        Some(Self {
            scene_id: caps[1].to_string(),
            level: caps[2].to_string(),
            room_id: caps[3].to_ascii_lowercase(),
        })
    }

    /// Parse a line, reporting failures as errors
    pub fn parse_line(line: &str) -> Result<Self> {
        Self::parse(line).ok_or_else(|| ProtocolError::UnrecognizedLine(line.to_string()))
    }

    /// Scene id as a number
    pub fn scene_id_value(&self) -> Option<u32> {
        self.scene_id.parse().ok()
    }

    /// Level as a number
    pub fn level_value(&self) -> Option<u32> {
        self.level.parse().ok()
    }

    /// Whether this report describes `scene` (same id, level and room)
    pub fn matches(&self, scene: &Scene) -> bool {
        self.scene_id_value() == Some(scene.id)
            && self.level_value() == Some(scene.level)
            && scene.same_room(&self.room_id)
    }
}
