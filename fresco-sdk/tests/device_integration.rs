//! End-to-end device tests over the in-memory transport
//!
//! The transport double plays the controller: tests inject what the
//! controller would send and inspect what the device wrote.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fresco_protocol::{Delimiter, Scene};
use fresco_sdk::bridge::{OnlineAction, PressAction, UShortAction};
use fresco_sdk::{
    ActivationPolicy, Bridgeable, FeedbackKey, FrescoConfig, FrescoDevice, LineDevice,
    MonitorStatus, SelectionError, SignalSink,
};
use fresco_transport::{ConnectionStatus, MemoryTransport, Transport};
use parking_lot::Mutex;

fn catalog() -> Vec<Scene> {
    vec![
        Scene::new(1, 100, "A", "Full"),
        Scene::new(2, 100, "AB", "Presentation"),
        Scene::new(0, 0, "A", "Off"),
        Scene::new(3, 40, "B", ""),
        Scene::new(40, 50, "A", "Broken"),
    ]
}

fn config() -> FrescoConfig {
    FrescoConfig::new(catalog()).with_timeouts(
        Duration::from_secs(1),
        Duration::from_secs(5),
        Duration::from_secs(10),
    )
}

fn device_with(config: FrescoConfig) -> (Arc<FrescoDevice>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let device = FrescoDevice::new(
        "lighting-1",
        "Boardroom",
        config,
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .unwrap();
    (device, transport)
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn cell_bool(device: &FrescoDevice, key: FeedbackKey) -> Option<bool> {
    device.feedback().get(&key).and_then(|v| v.as_bool())
}

fn cell_int(device: &FrescoDevice, key: FeedbackKey) -> Option<i32> {
    device.feedback().get(&key).and_then(|v| v.as_int())
}

fn active_scenes(device: &FrescoDevice) -> Vec<usize> {
    (0..device.scene_count())
        .filter(|&i| cell_bool(device, FeedbackKey::SceneActive(i)) == Some(true))
        .collect()
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_selection_sends_and_publishes() {
    let (device, transport) = device_with(config());
    transport.connect().unwrap();

    device.select_scene(0).unwrap();
    device.select_scene(1).unwrap();

    assert_eq!(
        transport.take_sent(),
        vec!["scene 1 100 0 A\n", "scene 2 100 0 AB\n"]
    );
    assert_eq!(active_scenes(&device), vec![1]);
    assert_eq!(cell_int(&device, FeedbackKey::SelectedScene), Some(1));
    assert!(device.scenes()[1].is_active);
}

#[test]
fn test_selection_events_are_one_per_affected_cell() {
    let (device, transport) = device_with(config());
    transport.connect().unwrap();
    device.select_scene(0).unwrap();

    let store = device.feedback();
    for key in store.keys() {
        store.watch(key);
    }
    device.select_scene(2).unwrap();

    let mut changed: Vec<FeedbackKey> = store.iter().try_iter().map(|e| e.key).collect();
    changed.sort();
    assert_eq!(
        changed,
        vec![
            FeedbackKey::SelectedScene,
            FeedbackKey::SceneActive(0),
            FeedbackKey::SceneActive(2),
        ]
    );
}

#[test]
fn test_refused_selections_change_nothing() {
    let (device, transport) = device_with(config());
    transport.connect().unwrap();
    device.select_scene(2).unwrap();
    transport.take_sent();

    assert_eq!(
        device.select_scene(5),
        Err(SelectionError::OutOfRange { index: 5, len: 5 })
    );
    assert!(matches!(
        device.select_scene(4),
        Err(SelectionError::InvalidScene { index: Some(4), .. })
    ));
    assert!(device.select_scene_ref(&Scene::new(1, 101, "A", "")).is_err());
    assert!(device.select_scene_ref(&Scene::new(1, 100, "", "")).is_err());

    assert!(transport.sent().is_empty());
    assert_eq!(device.selected_scene(), Some(2));
    assert_eq!(active_scenes(&device), vec![2]);
}

#[test]
fn test_select_by_reference() {
    let (device, transport) = device_with(config());
    transport.connect().unwrap();

    device.select_scene_ref(&Scene::new(2, 100, "ab", "")).unwrap();
    assert_eq!(device.selected_scene(), Some(1));

    device.select_scene_ref(&Scene::new(9, 30, "C", "")).unwrap();
    assert_eq!(device.selected_scene(), Some(1));
    assert_eq!(
        transport.take_sent(),
        vec!["scene 2 100 0 ab\n", "scene 9 30 0 C\n"]
    );
}

#[test]
fn test_send_while_disconnected_is_dropped() {
    let (device, transport) = device_with(config());

    device.select_scene(0).unwrap();
    assert!(transport.sent().is_empty());
    assert_eq!(device.selected_scene(), Some(0));
}

#[test]
fn test_carriage_return_delimiter_and_polls() {
    let (device, transport) = device_with(config().with_delimiter(Delimiter::CarriageReturn));
    transport.connect().unwrap();

    device.poll(None, None);
    device.poll(Some(4), None);
    device.poll(Some(4), Some("AB"));
    device.send_text("");
    device.send_text("raw");
    assert_eq!(
        transport.take_sent(),
        vec![
            "status scene ALL\r",
            "status scene 4\r",
            "status scene 4 0 AB\r",
            "raw\r"
        ]
    );
}

// ============================================================================
// Inbound lines and liveness
// ============================================================================

#[test]
fn test_initialize_polls_and_first_report_brings_device_up() {
    let (device, transport) = device_with(config());
    device.initialize().unwrap();

    wait_until("initial poll", || {
        transport.sent().contains(&"status scene ALL\n".to_string())
    });
    assert_eq!(device.monitor_status(), MonitorStatus::Unknown);
    assert_eq!(cell_bool(&device, FeedbackKey::Online), Some(false));
    assert_eq!(cell_int(&device, FeedbackKey::SocketStatus), Some(2));

    // Split across reads
    transport.inject(&b"scene 2 10"[..]);
    transport.inject(&b"0 0 ab\n"[..]);

    wait_until("online cell", || {
        cell_bool(&device, FeedbackKey::Online) == Some(true)
    });
    assert_eq!(cell_int(&device, FeedbackKey::MonitorStatus), Some(2));
    assert!(device.is_online());
}

#[test]
fn test_slow_connect_still_gets_first_poll() {
    let transport = Arc::new(MemoryTransport::manual());
    let device = FrescoDevice::new(
        "lighting-1",
        "Boardroom",
        FrescoConfig::new(catalog()).with_timeouts(
            Duration::from_secs(2),
            Duration::from_secs(5),
            Duration::from_secs(10),
        ),
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .unwrap();
    let polls = || {
        transport
            .sent()
            .iter()
            .filter(|s| s.as_str() == "status scene ALL\n")
            .count()
    };

    device.initialize().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(transport.status(), ConnectionStatus::Connecting);
    assert_eq!(polls(), 0);

    transport.set_status(ConnectionStatus::Connected);
    wait_until("poll after connect", || polls() == 1);

    // Every reconnect asks again
    transport.set_status(ConnectionStatus::Disconnected);
    transport.set_status(ConnectionStatus::Connected);
    wait_until("poll after reconnect", || polls() == 2);
    assert_eq!(device.monitor_status(), MonitorStatus::Unknown);
}

#[test]
fn test_unparsable_lines_are_discarded() {
    let (device, transport) = device_with(config());
    transport.connect().unwrap();

    transport.inject(&b"garbage\n\nscene x 1 0 a\nscene 1 100 0 a\n"[..]);
    wait_until("all lines processed", || device.lines_processed() == 4);
    assert_eq!(device.selected_scene(), None);
}

#[test]
fn test_partial_line_is_held_back() {
    let (device, transport) = device_with(config().with_activation_policy(ActivationPolicy::ConfirmOnResponse));
    transport.connect().unwrap();
    device.select_scene(0).unwrap();

    transport.inject(&b"scene 1 100 0 a"[..]);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(device.lines_processed(), 0);
    assert_eq!(device.selected_scene(), None);

    transport.inject(&b"\n"[..]);
    wait_until("confirmation", || device.selected_scene() == Some(0));
}

#[test]
fn test_confirm_on_response() {
    let (device, transport) =
        device_with(config().with_activation_policy(ActivationPolicy::ConfirmOnResponse));
    transport.connect().unwrap();

    device.select_scene(1).unwrap();
    assert_eq!(device.pending_scene(), Some(1));
    assert_eq!(device.selected_scene(), None);
    assert!(active_scenes(&device).is_empty());

    // Another scene's report doesn't confirm
    device.handle_line("scene 1 100 0 a");
    wait_until("first line", || device.lines_processed() == 1);
    assert_eq!(device.selected_scene(), None);

    device.handle_line("SCENE 2 100 0 ab");
    wait_until("confirmation", || device.selected_scene() == Some(1));
    assert_eq!(active_scenes(&device), vec![1]);
    assert_eq!(cell_int(&device, FeedbackKey::SelectedScene), Some(1));
    assert_eq!(device.pending_scene(), None);
}

#[test]
fn test_reconnect_resets_partial_line() {
    let (device, transport) =
        device_with(config().with_activation_policy(ActivationPolicy::ConfirmOnResponse));
    transport.connect().unwrap();
    device.select_scene(0).unwrap();

    // Without the reset these halves would join into a confirming report
    transport.inject(&b"scene 1 100 0"[..]);
    transport.set_status(ConnectionStatus::Disconnected);
    assert_eq!(cell_int(&device, FeedbackKey::SocketStatus), Some(3));
    transport.set_status(ConnectionStatus::Connected);
    transport.inject(&b" a\n"[..]);

    wait_until("line processed", || device.lines_processed() == 1);
    assert_eq!(device.selected_scene(), None);
    assert_eq!(device.pending_scene(), Some(0));
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn test_dispose_stops_everything() {
    let (device, transport) = device_with(config());
    device.initialize().unwrap();
    device.set_debug_levels(0, Some(Duration::from_secs(60))).unwrap();

    device.dispose();
    assert_eq!(transport.status(), ConnectionStatus::Disconnected);
    assert_eq!(device.select_scene(0), Err(SelectionError::Disposed));
    assert!(device.initialize().is_err());

    // Lines after disposal go nowhere
    transport.inject(&b"scene 1 100 0 a\n"[..]);
    device.handle_line("scene 1 100 0 a");
    thread::sleep(Duration::from_millis(20));
    assert_eq!(device.lines_processed(), 0);
}

#[test]
fn test_drop_disconnects() {
    let (device, transport) = device_with(config());
    device.initialize().unwrap();
    drop(device);
    assert_eq!(transport.status(), ConnectionStatus::Disconnected);
}

#[test]
fn test_debug_levels_revert() {
    let (device, _transport) = device_with(config());
    device.set_debug_levels(0, Some(Duration::from_millis(30))).unwrap();
    assert_eq!(device.debug_levels(), fresco_sdk::DebugLevels::uniform(0));

    wait_until("revert", || device.debug_levels() == fresco_sdk::DebugLevels::default());
}

// ============================================================================
// Bridge
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    bools: Mutex<HashMap<u32, bool>>,
    ushorts: Mutex<HashMap<u32, u16>>,
    strings: Mutex<HashMap<u32, String>>,
    ushort_writes: Mutex<HashMap<u32, usize>>,
    presses: Mutex<HashMap<u32, Arc<dyn Fn() + Send + Sync>>>,
    analogs: Mutex<HashMap<u32, Arc<dyn Fn(u16) + Send + Sync>>>,
    online: Mutex<Vec<Arc<dyn Fn(bool) + Send + Sync>>>,
}

impl RecordingSink {
    fn bool(&self, join: u32) -> Option<bool> {
        self.bools.lock().get(&join).copied()
    }

    fn ushort(&self, join: u32) -> Option<u16> {
        self.ushorts.lock().get(&join).copied()
    }

    fn string(&self, join: u32) -> Option<String> {
        self.strings.lock().get(&join).cloned()
    }

    fn press(&self, join: u32) {
        let action = self.presses.lock().get(&join).cloned();
        if let Some(action) = action {
            action();
        }
    }

    fn set_analog(&self, join: u32, value: u16) {
        let action = self.analogs.lock().get(&join).cloned();
        if let Some(action) = action {
            action(value);
        }
    }

    fn set_online(&self, online: bool) {
        let actions = self.online.lock().clone();
        for action in actions {
            action(online);
        }
    }

    fn ushort_writes(&self, join: u32) -> usize {
        self.ushort_writes.lock().get(&join).copied().unwrap_or(0)
    }

    fn clear(&self) {
        self.ushort_writes.lock().clear();
        self.bools.lock().clear();
        self.ushorts.lock().clear();
        self.strings.lock().clear();
    }
}

impl SignalSink for RecordingSink {
    fn set_bool(&self, join: u32, value: bool) {
        self.bools.lock().insert(join, value);
    }

    fn set_ushort(&self, join: u32, value: u16) {
        self.ushorts.lock().insert(join, value);
        *self.ushort_writes.lock().entry(join).or_default() += 1;
    }

    fn set_string(&self, join: u32, value: &str) {
        self.strings.lock().insert(join, value.to_string());
    }

    fn on_bool_press(&self, join: u32, action: PressAction) {
        self.presses.lock().insert(join, Arc::from(action));
    }

    fn on_ushort(&self, join: u32, action: UShortAction) {
        self.analogs.lock().insert(join, Arc::from(action));
    }

    fn on_online_change(&self, action: OnlineAction) {
        self.online.lock().push(Arc::from(action));
    }
}

fn linked(config: FrescoConfig) -> (Arc<FrescoDevice>, Arc<MemoryTransport>, Arc<RecordingSink>) {
    let (device, transport) = device_with(config);
    let sink = Arc::new(RecordingSink::default());
    device.link_to_api(Arc::clone(&sink) as Arc<dyn SignalSink>, 1);
    (device, transport, sink)
}

#[test]
fn test_link_pushes_current_values() {
    let (_device, _transport, sink) = linked(config());

    assert_eq!(sink.string(1).as_deref(), Some("Boardroom"));
    assert_eq!(sink.string(11).as_deref(), Some("Full"));
    assert_eq!(sink.string(14).as_deref(), Some(""));
    assert_eq!(sink.bool(1), Some(false));
    assert_eq!(sink.bool(41), Some(true));
    assert_eq!(sink.bool(44), Some(false));
    assert_eq!(sink.bool(11), Some(false));
    assert_eq!(sink.ushort(1), Some(u16::MAX));
    assert_eq!(sink.ushort(2), Some(0));
    assert_eq!(sink.ushort(3), Some(0));
}

#[test]
fn test_bridge_presses_select_scenes() {
    let (device, transport, sink) = linked(config());
    transport.connect().unwrap();
    assert_eq!(sink.ushort(3), Some(2));

    sink.press(12);
    assert_eq!(device.selected_scene(), Some(1));
    assert_eq!(sink.bool(12), Some(true));
    assert_eq!(sink.ushort(1), Some(1));

    sink.set_analog(1, 2);
    assert_eq!(device.selected_scene(), Some(2));
    assert_eq!(sink.bool(12), Some(false));
    assert_eq!(sink.bool(13), Some(true));

    // Out of range from the panel is refused quietly
    sink.set_analog(1, 99);
    assert_eq!(device.selected_scene(), Some(2));

    assert_eq!(
        transport.take_sent(),
        vec!["scene 2 100 0 AB\n", "scene 0 0 0 A\n"]
    );
}

#[test]
fn test_bridge_online_republishes() {
    let (_device, _transport, sink) = linked(config());
    sink.clear();

    sink.set_online(false);
    assert!(sink.string(1).is_none());

    sink.set_online(true);
    assert_eq!(sink.string(1).as_deref(), Some("Boardroom"));
    assert_eq!(sink.string(12).as_deref(), Some("Presentation"));
    assert_eq!(sink.ushort(1), Some(u16::MAX));
}

#[test]
fn test_bridge_online_pushes_each_signal_once() {
    let (device, transport, sink) = linked(config());
    transport.connect().unwrap();
    device.select_scene(1).unwrap();
    sink.clear();

    sink.set_online(true);
    for join in 1..=3 {
        assert_eq!(sink.ushort_writes(join), 1, "join {join}");
    }
    assert_eq!(sink.ushort(1), Some(1));
    assert_eq!(sink.ushort(3), Some(2));
}

/// Surface that answers scene 2 going active by pressing scene 3,
/// handing the press to another thread
struct HandoffSink {
    inner: Arc<RecordingSink>,
    fired: std::sync::atomic::AtomicBool,
}

impl SignalSink for HandoffSink {
    fn set_bool(&self, join: u32, value: bool) {
        self.inner.set_bool(join, value);
        if join == 12 && value && !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || inner.press(13));
        }
    }

    fn set_ushort(&self, join: u32, value: u16) {
        self.inner.set_ushort(join, value);
    }

    fn set_string(&self, join: u32, value: &str) {
        self.inner.set_string(join, value);
    }

    fn on_bool_press(&self, join: u32, action: PressAction) {
        self.inner.on_bool_press(join, action);
    }

    fn on_ushort(&self, join: u32, action: UShortAction) {
        self.inner.on_ushort(join, action);
    }

    fn on_online_change(&self, action: OnlineAction) {
        self.inner.on_online_change(action);
    }
}

#[test]
fn test_feedback_handed_off_to_another_thread_can_select() {
    let (device, transport) = device_with(config());
    transport.connect().unwrap();
    let inner = Arc::new(RecordingSink::default());
    let sink = Arc::new(HandoffSink {
        inner: Arc::clone(&inner),
        fired: std::sync::atomic::AtomicBool::new(false),
    });
    device.link_to_api(sink as Arc<dyn SignalSink>, 1);

    inner.press(12);
    wait_until("handed-off press", || {
        inner.bool(13) == Some(true) && inner.bool(12) == Some(false)
    });
    assert_eq!(device.selected_scene(), Some(2));
}

#[test]
fn test_scenes_beyond_span_are_not_linked() {
    let scenes: Vec<Scene> = (0..12)
        .map(|i| Scene::new(i, 100, "A", format!("Scene {i}")))
        .collect();
    let (device, _transport, sink) = linked(FrescoConfig::new(scenes));

    assert_eq!(sink.string(20).as_deref(), Some("Scene 9"));
    assert!(sink.string(21).is_none());

    sink.press(21);
    assert_eq!(device.selected_scene(), None);
}

#[test]
fn test_join_overrides_from_config() {
    let mut config = config();
    config.join_map.insert(
        "SceneSelectDirect".to_string(),
        fresco_sdk::JoinOverride {
            join_number: Some(101),
            join_span: None,
        },
    );
    let (device, transport) = device_with(config);
    let sink = Arc::new(RecordingSink::default());
    let joins = device.link_to_api(Arc::clone(&sink) as Arc<dyn SignalSink>, 1);
    assert_eq!(joins.scene_select_direct.join_number, 101);

    transport.connect().unwrap();
    sink.press(102);
    assert_eq!(device.selected_scene(), Some(1));
    assert_eq!(sink.bool(102), Some(true));
}

#[test]
fn test_bridge_actions_outlive_device_safely() {
    let (device, _transport, sink) = linked(config());
    drop(device);
    sink.press(11);
    sink.set_online(true);
}
