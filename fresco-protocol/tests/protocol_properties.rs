//! Property-based tests for the line protocol

use proptest::prelude::*;

use fresco_protocol::{Command, Delimiter, LineFramer, Scene, SceneCommandFormat, SceneReport};

// ============================================================================
// Test Helpers
// ============================================================================

/// Strategy for room ids the controller accepts
fn room_strategy() -> impl Strategy<Value = String> {
    "[A-Xa-x]{1,4}"
}

/// Strategy for lines that never contain the delimiter
fn line_strategy() -> impl Strategy<Value = String> {
    "[ -~]{0,40}"
}

/// Split `data` at the given cut points
fn chunk(data: &[u8], mut cuts: Vec<usize>) -> Vec<&[u8]> {
    cuts.iter_mut().for_each(|c| *c %= data.len() + 1);
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(&data[start..cut]);
        start = cut;
    }
    chunks.push(&data[start..]);
    chunks
}

// ============================================================================
// Framing
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Framer output doesn't depend on how the stream was chunked.
    #[test]
    fn prop_framing_is_chunk_invariant(
        lines in proptest::collection::vec(line_strategy(), 0..12),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut stream = Vec::new();
        for line in &lines {
            stream.extend_from_slice(line.as_bytes());
            stream.push(b'\n');
        }

        let mut framer = LineFramer::new(Delimiter::Newline);
        let mut framed = Vec::new();
        for piece in chunk(&stream, cuts) {
            framer.push(piece);
            framed.extend(&mut framer);
        }

        prop_assert_eq!(framed, lines);
        prop_assert_eq!(framer.buffered(), 0);
    }

    /// Whatever is after the last delimiter stays buffered.
    #[test]
    fn prop_partial_tail_is_held_back(
        line in line_strategy(),
        tail in "[ -~]{1,20}",
    ) {
        let mut framer = LineFramer::new(Delimiter::CarriageReturn);
        framer.push(format!("{line}\r{tail}").as_bytes());

        prop_assert_eq!(framer.next(), Some(line));
        prop_assert_eq!(framer.next(), None);
        prop_assert_eq!(framer.buffered(), tail.len());
    }
}

// ============================================================================
// Commands and reports
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A formatted scene command, echoed back by the controller, matches its scene.
    #[test]
    fn prop_echoed_command_matches_scene(
        id in 0u32..=36,
        level in 0u32..=100,
        room in room_strategy(),
    ) {
        let scene = Scene::new(id, level, room.clone(), "");
        let command = Command::select_scene(&scene, SceneCommandFormat::ZoneAddressed).unwrap();
        let echoed = command.to_string().to_ascii_lowercase();

        let report = SceneReport::parse(&echoed).unwrap();
        prop_assert_eq!(report.room_id, room.to_ascii_lowercase());
        prop_assert!(SceneReport::parse(&echoed).unwrap().matches(&scene));
    }

    /// Out-of-range scenes never produce a command.
    #[test]
    fn prop_invalid_scene_rejected(
        id in 37u32..1000,
        level in 101u32..1000,
        room in room_strategy(),
    ) {
        let format = SceneCommandFormat::default();
        prop_assert!(Command::select_scene(&Scene::new(id, 50, room.clone(), ""), format).is_err());
        prop_assert!(Command::select_scene(&Scene::new(5, level, room, ""), format).is_err());
        prop_assert!(Command::select_scene(&Scene::new(5, 50, "", ""), format).is_err());
    }

    /// Parsing arbitrary text never panics.
    #[test]
    fn prop_parse_never_panics(line in ".*") {
        let _ = SceneReport::parse(&line);
    }
}
