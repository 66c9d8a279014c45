//! Device feedback cells
//!
//! Every value a control surface can observe is a cell in a
//! [`FeedbackStore`] keyed by [`FeedbackKey`]. Cells compute from the
//! device's state sources; mutators recompute exactly the cells they touch.

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use feedback_store::{FeedbackStore, FeedbackValue};
use parking_lot::{Mutex, RwLock};

use crate::monitor::MonitorStatus;
use crate::registry::{SceneRegistry, SelectionChange};

/// Identifies one feedback cell of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedbackKey {
    /// Monitor reports Up
    Online,
    /// Monitor status code
    MonitorStatus,
    /// Transport status code
    SocketStatus,
    /// Selected scene index, -1 for none
    SelectedScene,
    /// Scene at index is the active one
    SceneActive(usize),
    /// Display name of the scene at index
    SceneName(usize),
    /// Scene at index has a name and should be shown
    SceneVisible(usize),
}

impl fmt::Display for FeedbackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::MonitorStatus => f.write_str("monitor-status"),
            Self::SocketStatus => f.write_str("socket-status"),
            Self::SelectedScene => f.write_str("selected-scene"),
            Self::SceneActive(i) => write!(f, "scene-{i}-active"),
            Self::SceneName(i) => write!(f, "scene-{i}-name"),
            Self::SceneVisible(i) => write!(f, "scene-{i}-visible"),
        }
    }
}

/// Cells touched by a selection change
pub fn selection_keys(change: Option<SelectionChange>) -> Vec<FeedbackKey> {
    let Some(change) = change else {
        return Vec::new();
    };
    let mut keys = Vec::with_capacity(3);
    keys.extend(change.previous.map(FeedbackKey::SceneActive));
    keys.extend(change.current.map(FeedbackKey::SceneActive));
    keys.push(FeedbackKey::SelectedScene);
    keys
}

/// State sources the cells compute from
#[derive(Clone)]
pub struct FeedbackSources {
    pub registry: Arc<Mutex<SceneRegistry>>,
    pub monitor_status: Arc<RwLock<MonitorStatus>>,
    /// Last transport status code reported
    pub socket_status: Arc<AtomicU16>,
}

/// Register every device cell in `store`
pub fn register_cells(store: &FeedbackStore<FeedbackKey>, sources: &FeedbackSources) {
    let monitor = Arc::clone(&sources.monitor_status);
    store.register(FeedbackKey::Online, move || {
        FeedbackValue::Bool(monitor.read().is_online())
    });

    let monitor = Arc::clone(&sources.monitor_status);
    store.register(FeedbackKey::MonitorStatus, move || {
        FeedbackValue::Int(i32::from(monitor.read().code()))
    });

    let socket = Arc::clone(&sources.socket_status);
    store.register(FeedbackKey::SocketStatus, move || {
        FeedbackValue::Int(i32::from(socket.load(Ordering::SeqCst)))
    });

    let registry = Arc::clone(&sources.registry);
    store.register(FeedbackKey::SelectedScene, move || {
        FeedbackValue::Int(registry.lock().selected_code())
    });

    let count = sources.registry.lock().len();
    for index in 0..count {
        let registry = Arc::clone(&sources.registry);
        store.register(FeedbackKey::SceneActive(index), move || {
            FeedbackValue::Bool(registry.lock().is_active(index))
        });

        let registry = Arc::clone(&sources.registry);
        store.register(FeedbackKey::SceneName(index), move || {
            let name = registry
                .lock()
                .scene(index)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            FeedbackValue::Text(name)
        });

        let registry = Arc::clone(&sources.registry);
        store.register(FeedbackKey::SceneVisible(index), move || {
            FeedbackValue::Bool(registry.lock().scene(index).is_some_and(|s| s.is_named()))
        });
    }
}
