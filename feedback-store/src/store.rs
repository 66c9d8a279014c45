//! Observable cell storage
//!
//! This module provides the storage primitives for feedback publishing:
//! - `FeedbackCell`: a compute function plus its cached value and listeners
//! - `FeedbackStore<K>`: a keyed collection of cells with change detection

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{mpsc, Arc};

use parking_lot::{Mutex, RwLock};

use crate::event::FeedbackEvent;
use crate::iter::ChangeIterator;
use crate::value::FeedbackValue;

/// Pure function of the owner's state producing a cell value
pub type ComputeFn = Box<dyn Fn() -> FeedbackValue + Send + Sync>;

/// Callback pushed the new value of a cell
pub type Listener = Arc<dyn Fn(&FeedbackValue) + Send + Sync>;

// ============================================================================
// FeedbackCell - one observable value
// ============================================================================

/// A single observable value
///
/// The cell never stores state of its own beyond the last computed value:
/// the compute function is the source of truth, the cache exists for change
/// detection and for cheap reads.
pub struct FeedbackCell {
    compute: ComputeFn,
    value: FeedbackValue,
    listeners: Vec<Listener>,
}

impl FeedbackCell {
    /// Create a cell, computing its initial value
    pub fn new(compute: ComputeFn) -> Self {
        let value = compute();
        Self {
            compute,
            value,
            listeners: Vec::new(),
        }
    }

    /// The cached value
    pub fn value(&self) -> &FeedbackValue {
        &self.value
    }

    /// Evaluate the compute function without touching the cache
    pub fn compute(&self) -> FeedbackValue {
        (self.compute)()
    }

    /// Recompute and cache, returning whether the value changed
    pub fn refresh(&mut self) -> bool {
        let next = (self.compute)();
        if next != self.value {
            self.value = next;
            true
        } else {
            false
        }
    }

    /// Number of linked listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for FeedbackCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackCell")
            .field("value", &self.value)
            .field("listener_count", &self.listeners.len())
            .finish()
    }
}

/// A value ready to be pushed to listeners and watchers
struct Publication<K> {
    key: K,
    value: FeedbackValue,
    listeners: Vec<Listener>,
}

// ============================================================================
// FeedbackStore<K> - keyed cells with change detection
// ============================================================================

/// Keyed collection of feedback cells
///
/// # Features
///
/// - Pull: `get()` returns the cached value, `compute()` evaluates fresh
/// - Push: listeners linked with `link()` receive every committed change
/// - Watch pattern: watched keys also emit `FeedbackEvent`s into `iter()`
/// - Transactions: a state mutation and the recomputation of every cell it
///   can affect are committed under one lock, so `snapshot()` never observes
///   a half-applied update
///
/// Compute functions and the `mutate` closure of `transaction()` run with the
/// store locked and must not call back into the store. Listeners run after
/// the store lock is released, in commit order, and receive the value they
/// need; they must not call back into the store either.
///
/// # Example
///
/// ```rust
/// use feedback_store::{FeedbackStore, FeedbackValue};
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
///
/// let level = Arc::new(AtomicI32::new(0));
/// let store = FeedbackStore::<&'static str>::new();
///
/// let source = Arc::clone(&level);
/// store.register("level", move || FeedbackValue::Int(source.load(Ordering::SeqCst)));
///
/// store.transaction(&["level"], || level.store(80, Ordering::SeqCst));
/// assert_eq!(store.get(&"level"), Some(FeedbackValue::Int(80)));
/// ```
pub struct FeedbackStore<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Cells by key
    cells: Arc<RwLock<HashMap<K, FeedbackCell>>>,

    /// Keys whose changes are emitted as events
    watched: Arc<RwLock<HashSet<K>>>,

    /// Serializes delivery so listeners observe commits in order
    publish_lock: Arc<Mutex<()>>,

    /// Channel sender for change events
    event_tx: mpsc::Sender<FeedbackEvent<K>>,

    /// Channel receiver for change events (shared by clones)
    event_rx: Arc<Mutex<mpsc::Receiver<FeedbackEvent<K>>>>,
}

impl<K> FeedbackStore<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create an empty store
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel();

        Self {
            cells: Arc::new(RwLock::new(HashMap::new())),
            watched: Arc::new(RwLock::new(HashSet::new())),
            publish_lock: Arc::new(Mutex::new(())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    /// Register a cell, replacing any cell with the same key
    ///
    /// The initial value is computed immediately; nothing is published.
    pub fn register<F>(&self, key: K, compute: F)
    where
        F: Fn() -> FeedbackValue + Send + Sync + 'static,
    {
        let cell = FeedbackCell::new(Box::new(compute));
        self.cells.write().insert(key, cell);
    }

    /// Cached value of a cell
    pub fn get(&self, key: &K) -> Option<FeedbackValue> {
        self.cells.read().get(key).map(|cell| cell.value().clone())
    }

    /// Fresh value of a cell, bypassing (and not updating) the cache
    pub fn compute(&self, key: &K) -> Option<FeedbackValue> {
        self.cells.read().get(key).map(|cell| cell.compute())
    }

    /// Cached values of several cells, read under one lock
    pub fn snapshot(&self, keys: &[K]) -> Vec<Option<FeedbackValue>> {
        let cells = self.cells.read();
        keys.iter()
            .map(|key| cells.get(key).map(|cell| cell.value().clone()))
            .collect()
    }

    /// Recompute one cell, publishing if it changed
    pub fn fire_update(&self, key: &K) -> bool {
        self.fire_updates(std::slice::from_ref(key)) > 0
    }

    /// Recompute several cells as one commit, returning how many changed
    pub fn fire_updates(&self, keys: &[K]) -> usize {
        self.commit(|| ((), keys.to_vec())).1
    }

    /// Recompute every cell
    pub fn fire_all(&self) -> usize {
        let keys = self.keys();
        self.fire_updates(&keys)
    }

    /// Apply a state mutation and recompute `keys` as one atomic commit
    ///
    /// `mutate` runs while the store is write-locked, so no reader can see
    /// the cells between the mutation and their recomputation.
    pub fn transaction<R>(&self, keys: &[K], mutate: impl FnOnce() -> R) -> R {
        self.commit(|| (mutate(), keys.to_vec())).0
    }

    /// Like `transaction()`, for mutations that only know which cells they
    /// touched once they've run
    ///
    /// `mutate` returns its result together with the keys to recompute.
    pub fn transaction_with<R>(&self, mutate: impl FnOnce() -> (R, Vec<K>)) -> R {
        self.commit(mutate).0
    }

    /// Push the cached values of `keys` to their listeners, changed or not
    ///
    /// Used when a consumer reconnects and needs the full picture again.
    /// Watchers are not notified since nothing changed.
    pub fn republish(&self, keys: &[K]) {
        let cells = self.cells.read();
        let publications: Vec<Publication<K>> = keys
            .iter()
            .filter_map(|key| {
                cells.get(key).map(|cell| Publication {
                    key: key.clone(),
                    value: cell.value().clone(),
                    listeners: cell.listeners.clone(),
                })
            })
            .collect();
        let _publishing = self.publish_lock.lock();
        drop(cells);

        for publication in publications {
            for listener in &publication.listeners {
                listener(&publication.value);
            }
        }
    }

    /// Push every cached value to its listeners
    pub fn republish_all(&self) {
        let keys = self.keys();
        self.republish(&keys);
    }

    /// Link a listener to a cell; returns false if the cell doesn't exist
    pub fn link<F>(&self, key: &K, listener: F) -> bool
    where
        F: Fn(&FeedbackValue) + Send + Sync + 'static,
    {
        match self.cells.write().get_mut(key) {
            Some(cell) => {
                cell.listeners.push(Arc::new(listener));
                true
            }
            None => false,
        }
    }

    /// Register interest in change events for a cell
    pub fn watch(&self, key: K) {
        self.watched.write().insert(key);
    }

    /// Unregister interest in a cell
    pub fn unwatch(&self, key: &K) {
        self.watched.write().remove(key);
    }

    /// Check if a cell is watched
    pub fn is_watched(&self, key: &K) -> bool {
        self.watched.read().contains(key)
    }

    /// Blocking iterator over change events of watched cells
    pub fn iter(&self) -> ChangeIterator<K> {
        ChangeIterator::new(Arc::clone(&self.event_rx))
    }

    /// All registered keys
    pub fn keys(&self) -> Vec<K> {
        self.cells.read().keys().cloned().collect()
    }

    /// Check if a cell exists
    pub fn contains(&self, key: &K) -> bool {
        self.cells.read().contains_key(key)
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// Check if the store has no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn commit<R>(&self, mutate: impl FnOnce() -> (R, Vec<K>)) -> (R, usize) {
        let mut cells = self.cells.write();
        let (result, keys) = mutate();

        let mut publications = Vec::new();
        for key in &keys {
            if let Some(cell) = cells.get_mut(key) {
                if cell.refresh() {
                    publications.push(Publication {
                        key: key.clone(),
                        value: cell.value().clone(),
                        listeners: cell.listeners.clone(),
                    });
                }
            }
        }
        let changed = publications.len();

        // Take the publish lock before releasing the cells so that two commits
        // can't deliver out of order.
        let _publishing = self.publish_lock.lock();
        drop(cells);
        self.publish(publications);

        (result, changed)
    }

    fn publish(&self, publications: Vec<Publication<K>>) {
        if publications.is_empty() {
            return;
        }
        let watched = self.watched.read().clone();
        for publication in publications {
            for listener in &publication.listeners {
                listener(&publication.value);
            }
            if watched.contains(&publication.key) {
                let _ = self
                    .event_tx
                    .send(FeedbackEvent::new(publication.key, publication.value));
            }
        }
    }
}

impl<K> Default for FeedbackStore<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for FeedbackStore<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            cells: Arc::clone(&self.cells),
            watched: Arc::clone(&self.watched),
            publish_lock: Arc::clone(&self.publish_lock),
            event_tx: self.event_tx.clone(),
            event_rx: Arc::clone(&self.event_rx),
        }
    }
}

impl<K> std::fmt::Debug for FeedbackStore<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackStore")
            .field("cell_count", &self.len())
            .finish()
    }
}
