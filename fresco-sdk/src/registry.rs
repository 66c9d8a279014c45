//! Scene registry and selection state
//!
//! The catalog is fixed at construction. The registry tracks which entry is
//! selected (at most one) and, under the confirm-on-response policy, which
//! entry has been requested but not yet confirmed by the controller.
//!
//! The registry is plain data. It is shared behind a mutex and only mutated
//! inside a feedback transaction, so every change comes with the list of
//! feedback cells it affects.

use fresco_protocol::{Command, Scene, SceneCommandFormat, SceneReport};
use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// When a selection becomes the active scene
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivationPolicy {
    /// As soon as the command has been sent
    #[default]
    Optimistic,
    /// When the controller reports the scene back
    ConfirmOnResponse,
}

/// A catalog entry with its derived active flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneState {
    pub index: usize,
    pub scene: Scene,
    pub is_active: bool,
}

/// Which selections changed, as indices into the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionChange {
    pub previous: Option<usize>,
    pub current: Option<usize>,
}

impl SelectionChange {
    pub fn is_change(&self) -> bool {
        self.previous != self.current
    }
}

/// What a successful selection did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The command to send
    pub command: Command,
    /// Set when the active scene moved
    pub change: Option<SelectionChange>,
}

#[derive(Debug, Clone)]
pub struct SceneRegistry {
    scenes: Vec<Scene>,
    selected: Option<usize>,
    pending: Option<usize>,
    policy: ActivationPolicy,
    format: SceneCommandFormat,
}

impl SceneRegistry {
    pub fn new(scenes: Vec<Scene>, policy: ActivationPolicy, format: SceneCommandFormat) -> Self {
        Self {
            scenes,
            selected: None,
            pending: None,
            policy,
            format,
        }
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, index: usize) -> Option<&Scene> {
        self.scenes.get(index)
    }

    pub fn policy(&self) -> ActivationPolicy {
        self.policy
    }

    pub fn format(&self) -> SceneCommandFormat {
        self.format
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn pending(&self) -> Option<usize> {
        self.pending
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.selected == Some(index)
    }

    /// Selected index as exported: -1 when nothing is selected
    pub fn selected_code(&self) -> i32 {
        self.selected
            .and_then(|i| i32::try_from(i).ok())
            .unwrap_or(-1)
    }

    /// First catalog entry with the same id, level and room
    pub fn index_of(&self, scene: &Scene) -> Option<usize> {
        self.scenes.iter().position(|s| {
            s.id == scene.id && s.level == scene.level && s.same_room(&scene.room_id)
        })
    }

    /// Catalog with derived active flags
    pub fn states(&self) -> Vec<SceneState> {
        self.scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| SceneState {
                index,
                scene: scene.clone(),
                is_active: self.is_active(index),
            })
            .collect()
    }

    /// Validate and apply a selection by index
    ///
    /// On error nothing changes.
    pub fn select(&mut self, index: usize) -> Result<Selection, SelectionError> {
        let scene = self.scenes.get(index).ok_or(SelectionError::OutOfRange {
            index,
            len: self.scenes.len(),
        })?;
        let command = Command::select_scene(scene, self.format).map_err(|source| {
            SelectionError::InvalidScene {
                index: Some(index),
                source,
            }
        })?;

        Ok(Selection {
            command,
            change: self.activate(index),
        })
    }

    /// Validate and apply a selection of a scene given directly
    ///
    /// If the scene is in the catalog it becomes the selection; otherwise
    /// only the command is produced.
    pub fn select_ref(&mut self, scene: &Scene) -> Result<Selection, SelectionError> {
        let command = Command::select_scene(scene, self.format).map_err(|source| {
            SelectionError::InvalidScene {
                index: self.index_of(scene),
                source,
            }
        })?;
        let change = self.index_of(scene).and_then(|index| self.activate(index));

        Ok(Selection { command, change })
    }

    /// Apply an inbound report
    ///
    /// Under confirm-on-response, a report matching the pending scene makes
    /// it the selection. Reports never change anything otherwise.
    pub fn confirm(&mut self, report: &SceneReport) -> Option<SelectionChange> {
        let pending = self.pending?;
        let matches = self
            .scenes
            .get(pending)
            .is_some_and(|scene| report.matches(scene));
        if !matches {
            return None;
        }
        self.pending = None;
        self.set_selected(Some(pending))
    }

    fn activate(&mut self, index: usize) -> Option<SelectionChange> {
        match self.policy {
            ActivationPolicy::Optimistic => self.set_selected(Some(index)),
            ActivationPolicy::ConfirmOnResponse => {
                self.pending = Some(index);
                None
            }
        }
    }

    fn set_selected(&mut self, selected: Option<usize>) -> Option<SelectionChange> {
        let change = SelectionChange {
            previous: self.selected,
            current: selected,
        };
        self.selected = selected;
        change.is_change().then_some(change)
    }
}
