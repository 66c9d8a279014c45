//! Change events for feedback updates
//!
//! When a watched cell recomputes to a different value, a `FeedbackEvent`
//! is emitted carrying the cell key and the new value.

use std::time::Instant;

use crate::value::FeedbackValue;

/// A change event emitted when a watched cell changes
///
/// Unlike a bare key notification, the new value travels with the event so
/// consumers don't need to read the store again (and risk observing a later
/// value).
///
/// # Example
///
/// ```rust,ignore
/// for event in store.iter() {
///     println!("{:?} -> {}", event.key, event.value);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FeedbackEvent<K> {
    /// The cell whose value changed
    pub key: K,

    /// The value after the change
    pub value: FeedbackValue,

    /// When the change was committed
    pub timestamp: Instant,
}

impl<K> FeedbackEvent<K> {
    /// Create a new change event stamped now
    pub fn new(key: K, value: FeedbackValue) -> Self {
        Self {
            key,
            value,
            timestamp: Instant::now(),
        }
    }
}

impl<K: PartialEq> PartialEq for FeedbackEvent<K> {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.key == other.key && self.value == other.value
    }
}
