//! Blocking iterator over feedback change events
//!
//! Provides the same consumption patterns the control side needs:
//! - Blocking: `recv()`, `for event in iter`
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`, `timeout_iter()`

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::FeedbackEvent;

/// Blocking iterator over feedback change events
///
/// All clones of a store share one receiver, so each event is delivered to
/// exactly one consumer. Use cell listeners when every consumer must see
/// every change.
pub struct ChangeIterator<K> {
    rx: Arc<Mutex<mpsc::Receiver<FeedbackEvent<K>>>>,
}

impl<K> ChangeIterator<K> {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<FeedbackEvent<K>>>>) -> Self {
        Self { rx }
    }

    /// Block until the next event is available
    ///
    /// Returns `None` if the channel is closed.
    pub fn recv(&self) -> Option<FeedbackEvent<K>> {
        self.rx.lock().recv().ok()
    }

    /// Block until the next event or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FeedbackEvent<K>> {
        self.rx.lock().recv_timeout(timeout).ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<FeedbackEvent<K>> {
        self.rx.lock().try_recv().ok()
    }

    /// Iterator over the events currently queued, without blocking
    pub fn try_iter(&self) -> TryIter<'_, K> {
        TryIter { inner: self }
    }

    /// Iterator that waits up to `timeout` for each event
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_, K> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl<K> Iterator for ChangeIterator<K> {
    type Item = FeedbackEvent<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available events
pub struct TryIter<'a, K> {
    inner: &'a ChangeIterator<K>,
}

impl<'a, K> Iterator for TryIter<'a, K> {
    type Item = FeedbackEvent<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIter<'a, K> {
    inner: &'a ChangeIterator<K>,
    timeout: Duration,
}

impl<'a, K> Iterator for TimeoutIter<'a, K> {
    type Item = FeedbackEvent<K>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
