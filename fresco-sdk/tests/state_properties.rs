//! Property tests for selection and liveness state

use std::sync::Arc;
use std::time::{Duration, Instant};

use feedback_store::FeedbackStore;
use fresco_protocol::{Scene, SceneCommandFormat, MAX_LEVEL, MAX_SCENE_ID};
use fresco_sdk::feedback::{register_cells, selection_keys, FeedbackKey, FeedbackSources};
use fresco_sdk::monitor::{MonitorConfig, MonitorMachine};
use fresco_sdk::registry::SceneRegistry;
use fresco_sdk::{ActivationPolicy, MonitorStatus, SelectionError};
use parking_lot::{Mutex, RwLock};
use proptest::prelude::*;

fn valid_scene() -> impl Strategy<Value = Scene> {
    (0..=MAX_SCENE_ID, 0..=MAX_LEVEL, "[A-X]{1,3}", "[A-Za-z ]{0,12}")
        .prop_map(|(id, level, room, name)| Scene::new(id, level, room, name))
}

fn any_scene() -> impl Strategy<Value = Scene> {
    (0u32..60, 0u32..150, "[A-X]{0,3}", "[A-Za-z ]{0,12}")
        .prop_map(|(id, level, room, name)| Scene::new(id, level, room, name))
}

/// Registry plus a store with every cell registered
fn wired(scenes: Vec<Scene>) -> (Arc<Mutex<SceneRegistry>>, FeedbackStore<FeedbackKey>) {
    let registry = Arc::new(Mutex::new(SceneRegistry::new(
        scenes,
        ActivationPolicy::Optimistic,
        SceneCommandFormat::ZoneAddressed,
    )));
    let store = FeedbackStore::new();
    register_cells(
        &store,
        &FeedbackSources {
            registry: Arc::clone(&registry),
            monitor_status: Arc::new(RwLock::new(MonitorStatus::Unknown)),
            socket_status: Arc::new(std::sync::atomic::AtomicU16::new(0)),
        },
    );
    (registry, store)
}

fn select(
    registry: &Mutex<SceneRegistry>,
    store: &FeedbackStore<FeedbackKey>,
    index: usize,
) -> Result<(), SelectionError> {
    store.transaction_with(|| match registry.lock().select(index) {
        Ok(selection) => (Ok(()), selection_keys(selection.change)),
        Err(e) => (Err(e), Vec::new()),
    })
}

fn active_cells(store: &FeedbackStore<FeedbackKey>, len: usize) -> Vec<usize> {
    (0..len)
        .filter(|&i| {
            store
                .get(&FeedbackKey::SceneActive(i))
                .and_then(|v| v.as_bool())
                == Some(true)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_successful_selection_leaves_exactly_one_active(
        scenes in prop::collection::vec(valid_scene(), 1..16),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..10),
    ) {
        let len = scenes.len();
        let (registry, store) = wired(scenes);

        for pick in picks {
            let index = pick.index(len);
            prop_assert!(select(&registry, &store, index).is_ok());
            prop_assert_eq!(active_cells(&store, len), vec![index]);
            let selected = store.get(&FeedbackKey::SelectedScene).and_then(|v| v.as_int());
            prop_assert_eq!(selected, Some(index as i32));
        }
    }

    #[test]
    fn prop_refused_selection_changes_nothing(
        scenes in prop::collection::vec(any_scene(), 1..16),
        first in any::<prop::sample::Index>(),
        index in 0usize..32,
    ) {
        let len = scenes.len();
        let (registry, store) = wired(scenes);
        let _ = select(&registry, &store, first.index(len));

        let before = registry.lock().selected();
        let cells_before = active_cells(&store, len);
        if select(&registry, &store, index).is_err() {
            prop_assert_eq!(registry.lock().selected(), before);
            prop_assert_eq!(active_cells(&store, len), cells_before);
        }
        // Whatever happened, never more than one active
        prop_assert!(active_cells(&store, len).len() <= 1);
    }

    #[test]
    fn prop_invalid_scenes_are_never_selected(
        scene in any_scene(),
    ) {
        let (registry, store) = wired(vec![scene.clone()]);
        let result = select(&registry, &store, 0);
        let valid = scene.validate().is_ok();
        prop_assert_eq!(result.is_ok(), valid);
        prop_assert_eq!(registry.lock().selected().is_some(), valid);
    }

    #[test]
    fn prop_activity_always_ends_up(
        steps in prop::collection::vec((0u64..2_000, any::<bool>()), 1..40),
    ) {
        let config = MonitorConfig::new(
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(600),
        ).unwrap();
        let t0 = Instant::now();
        let mut machine = MonitorMachine::new(config, t0);
        let mut now = t0;
        let mut last_activity = None;

        for (advance, active) in steps {
            now += Duration::from_millis(advance);
            if active {
                machine.activity(now);
                last_activity = Some(now);
                prop_assert_eq!(machine.status(), MonitorStatus::Up);
            }
            machine.evaluate(now);

            let idle = now.saturating_duration_since(last_activity.unwrap_or(t0));
            let expected = if idle >= config.error_timeout {
                MonitorStatus::Error
            } else if idle >= config.warning_timeout {
                MonitorStatus::Warning
            } else if last_activity.is_some() {
                MonitorStatus::Up
            } else {
                MonitorStatus::Unknown
            };
            prop_assert_eq!(machine.status(), expected);
        }
    }
}
