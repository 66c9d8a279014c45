//! Control-surface bridge
//!
//! A control surface is seen through [`SignalSink`]: numbered boolean
//! (digital), integer (analog) and string (serial) signals that the device
//! drives, plus actions the surface invokes. [`JoinMap`] assigns the numbers.
//!
//! | Join                         | Type    | Offset | Span | Direction |
//! |------------------------------|---------|--------|------|-----------|
//! | `IsOnline`                   | digital | 1      | 1    | to panel  |
//! | `SceneSelectDirect`          | digital | 11     | 10   | both      |
//! | `SceneButtonVisibility`      | digital | 41     | 10   | to panel  |
//! | `SceneSelect`                | analog  | 1      | 1    | both      |
//! | `CommunicationMonitorStatus` | analog  | 2      | 1    | to panel  |
//! | `SocketStatus`               | analog  | 3      | 1    | to panel  |
//! | `DeviceName`                 | serial  | 1      | 1    | to panel  |
//! | `SceneName`                  | serial  | 11     | 10   | to panel  |

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use feedback_store::{FeedbackStore, FeedbackValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::device::FrescoDevice;
use crate::feedback::FeedbackKey;

/// Action run when a digital join is pressed
pub type PressAction = Box<dyn Fn() + Send + Sync>;

/// Action run when an analog join is set
pub type UShortAction = Box<dyn Fn(u16) + Send + Sync>;

/// Action run when the surface goes on- or offline
pub type OnlineAction = Box<dyn Fn(bool) + Send + Sync>;

/// A remote control surface
///
/// The `set_*` methods are called from feedback delivery, with the device's
/// feedback store busy publishing. They must not run registered actions or
/// otherwise call back into the device on the same thread; a surface that
/// loops a feedback join back into an action has to hand it off to another
/// thread first.
pub trait SignalSink: Send + Sync {
    fn set_bool(&self, join: u32, value: bool);
    fn set_ushort(&self, join: u32, value: u16);
    fn set_string(&self, join: u32, value: &str);

    /// Run `action` on the rising edge of a digital join
    fn on_bool_press(&self, join: u32, action: PressAction);

    /// Run `action` whenever an analog join is set
    fn on_ushort(&self, join: u32, action: UShortAction);

    /// Run `action` when the surface's own connection changes
    fn on_online_change(&self, action: OnlineAction);
}

/// A device that can be linked to a control surface
pub trait Bridgeable {
    /// Wire feedback and actions to `sink` starting at `join_start`,
    /// returning the join map in effect
    fn link_to_api(&self, sink: Arc<dyn SignalSink>, join_start: u32) -> JoinMap;
}

// ============================================================================
// Join map
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Digital,
    Analog,
    Serial,
}

/// One named join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinData {
    pub join_number: u32,
    pub join_span: u32,
    pub join_type: JoinType,
    pub description: &'static str,
}

impl JoinData {
    fn new(
        offset: u32,
        join_span: u32,
        join_type: JoinType,
        description: &'static str,
        join_start: u32,
    ) -> Self {
        Self {
            join_number: absolute(offset, join_start),
            join_span,
            join_type,
            description,
        }
    }

    /// Join number of the `index`th element of a spanned join
    pub fn at(&self, index: usize) -> Option<u32> {
        let index = u32::try_from(index).ok()?;
        (index < self.join_span).then(|| self.join_number + index)
    }
}

/// Replacement for a join's number or span, from config
///
/// `joinNumber` is an offset from the join start, like the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOverride {
    #[serde(default)]
    pub join_number: Option<u32>,
    #[serde(default)]
    pub join_span: Option<u32>,
}

fn absolute(offset: u32, join_start: u32) -> u32 {
    offset + join_start.saturating_sub(1)
}

/// Join numbers of a linked device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMap {
    pub join_start: u32,
    pub is_online: JoinData,
    pub scene_select_direct: JoinData,
    pub scene_button_visibility: JoinData,
    pub scene_select: JoinData,
    pub communication_monitor_status: JoinData,
    pub socket_status: JoinData,
    pub device_name: JoinData,
    pub scene_name: JoinData,
}

impl JoinMap {
    pub fn new(join_start: u32) -> Self {
        use JoinType::*;
        Self {
            join_start,
            is_online: JoinData::new(1, 1, Digital, "Device online", join_start),
            scene_select_direct: JoinData::new(11, 10, Digital, "Select scene / scene active", join_start),
            scene_button_visibility: JoinData::new(41, 10, Digital, "Scene button visible", join_start),
            scene_select: JoinData::new(1, 1, Analog, "Select scene by index / selected index", join_start),
            communication_monitor_status: JoinData::new(2, 1, Analog, "Communication monitor status", join_start),
            socket_status: JoinData::new(3, 1, Analog, "Socket status", join_start),
            device_name: JoinData::new(1, 1, Serial, "Device name", join_start),
            scene_name: JoinData::new(11, 10, Serial, "Scene name", join_start),
        }
    }

    /// Default map with config overrides applied
    pub fn with_overrides(join_start: u32, overrides: &HashMap<String, JoinOverride>) -> Self {
        let mut map = Self::new(join_start);
        for (name, join_override) in overrides {
            let Some(join) = map.get_mut(name) else {
                warn!(join = %name, "Unknown join in joinMap override, ignoring");
                continue;
            };
            if let Some(offset) = join_override.join_number {
                join.join_number = absolute(offset, join_start);
            }
            if let Some(span) = join_override.join_span {
                join.join_span = span;
            }
        }
        map
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut JoinData> {
        let join = match name {
            "IsOnline" => &mut self.is_online,
            "SceneSelectDirect" => &mut self.scene_select_direct,
            "SceneButtonVisibility" => &mut self.scene_button_visibility,
            "SceneSelect" => &mut self.scene_select,
            "CommunicationMonitorStatus" => &mut self.communication_monitor_status,
            "SocketStatus" => &mut self.socket_status,
            "DeviceName" => &mut self.device_name,
            "SceneName" => &mut self.scene_name,
            _ => return None,
        };
        Some(join)
    }

    /// All joins by name
    pub fn joins(&self) -> Vec<(&'static str, &JoinData)> {
        vec![
            ("IsOnline", &self.is_online),
            ("SceneSelectDirect", &self.scene_select_direct),
            ("SceneButtonVisibility", &self.scene_button_visibility),
            ("SceneSelect", &self.scene_select),
            ("CommunicationMonitorStatus", &self.communication_monitor_status),
            ("SocketStatus", &self.socket_status),
            ("DeviceName", &self.device_name),
            ("SceneName", &self.scene_name),
        ]
    }
}

// ============================================================================
// Linking
// ============================================================================

/// Analog value for an integer feedback; negatives (no selection) map to the
/// top of the range
pub fn to_ushort(value: i32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn link_bool(store: &FeedbackStore<FeedbackKey>, key: FeedbackKey, sink: &Arc<dyn SignalSink>, join: u32) {
    let sink = Arc::clone(sink);
    store.link(&key, move |value: &FeedbackValue| {
        if let Some(b) = value.as_bool() {
            sink.set_bool(join, b);
        }
    });
}

fn link_ushort(store: &FeedbackStore<FeedbackKey>, key: FeedbackKey, sink: &Arc<dyn SignalSink>, join: u32) {
    let sink = Arc::clone(sink);
    store.link(&key, move |value: &FeedbackValue| {
        if let Some(i) = value.as_int() {
            sink.set_ushort(join, to_ushort(i));
        }
    });
}

fn link_string(store: &FeedbackStore<FeedbackKey>, key: FeedbackKey, sink: &Arc<dyn SignalSink>, join: u32) {
    let sink = Arc::clone(sink);
    store.link(&key, move |value: &FeedbackValue| {
        if let Some(s) = value.as_text() {
            sink.set_string(join, s);
        }
    });
}

/// Run `f` on the device if it's still alive
fn with_device(device: &Weak<FrescoDevice>, f: impl FnOnce(&FrescoDevice)) {
    if let Some(device) = device.upgrade() {
        f(&device);
    }
}

impl Bridgeable for FrescoDevice {
    fn link_to_api(&self, sink: Arc<dyn SignalSink>, join_start: u32) -> JoinMap {
        let joins = JoinMap::with_overrides(join_start, self.join_overrides());
        let store = self.feedback();
        let me = self.weak();

        info!(device = %self.key(), join_start, "Linking to bridge");

        sink.set_string(joins.device_name.join_number, self.name());

        link_bool(store, FeedbackKey::Online, &sink, joins.is_online.join_number);
        link_ushort(
            store,
            FeedbackKey::MonitorStatus,
            &sink,
            joins.communication_monitor_status.join_number,
        );
        link_ushort(store, FeedbackKey::SocketStatus, &sink, joins.socket_status.join_number);

        let device = me.clone();
        sink.on_ushort(
            joins.scene_select.join_number,
            Box::new(move |value| {
                with_device(&device, |d| {
                    let _ = d.select_scene(usize::from(value));
                })
            }),
        );
        link_ushort(store, FeedbackKey::SelectedScene, &sink, joins.scene_select.join_number);

        for index in 0..self.scene_count() {
            let (Some(select_join), Some(visible_join), Some(name_join)) = (
                joins.scene_select_direct.at(index),
                joins.scene_button_visibility.at(index),
                joins.scene_name.at(index),
            ) else {
                warn!(
                    device = %self.key(),
                    linked = index,
                    configured = self.scene_count(),
                    "More scenes than scene joins, remaining scenes not linked"
                );
                break;
            };

            let device = me.clone();
            sink.on_bool_press(
                select_join,
                Box::new(move || {
                    with_device(&device, |d| {
                        let _ = d.select_scene(index);
                    })
                }),
            );
            link_bool(store, FeedbackKey::SceneActive(index), &sink, select_join);
            link_bool(store, FeedbackKey::SceneVisible(index), &sink, visible_join);
            link_string(store, FeedbackKey::SceneName(index), &sink, name_join);
        }

        let device = me;
        let surface = Arc::downgrade(&sink);
        let name_join = joins.device_name.join_number;
        sink.on_online_change(Box::new(move |online| {
            if !online {
                return;
            }
            with_device(&device, |d| {
                debug!(device = %d.key(), "Bridge came online, refreshing");
                if let Some(sink) = surface.upgrade() {
                    sink.set_string(name_join, d.name());
                }
                d.on_consumer_online();
            })
        }));

        // Current values to the freshly linked surface
        store.republish_all();

        joins
    }
}
