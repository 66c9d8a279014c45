//! Observable Feedback Cells
//!
//! A small library of push/pull feedback cells: each cell holds a pure
//! compute function over some owner state, caches its last value, and
//! notifies listeners and watchers when a recomputation changes it.
//!
//! # Features
//!
//! - **Pull**: cached reads (`get`, `snapshot`) and fresh evaluation (`compute`)
//! - **Push**: listeners linked to a cell get every committed change
//! - **Change Detection**: nothing is published when a value recomputes equal
//! - **Transactions**: mutate owner state and recompute affected cells atomically
//! - **Blocking Iteration**: consume change events of watched cells
//!
//! # Quick Start
//!
//! ```rust
//! use feedback_store::{FeedbackStore, FeedbackValue};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let online = Arc::new(AtomicBool::new(false));
//! let store = FeedbackStore::<String>::new();
//!
//! let source = Arc::clone(&online);
//! store.register("online".to_string(), move || {
//!     FeedbackValue::Bool(source.load(Ordering::SeqCst))
//! });
//! store.watch("online".to_string());
//!
//! store.transaction(&["online".to_string()], || online.store(true, Ordering::SeqCst));
//!
//! let event = store.iter().try_recv().unwrap();
//! assert_eq!(event.value, FeedbackValue::Bool(true));
//! ```
//!
//! # Architecture
//!
//! ```text
//! FeedbackStore<K>
//!     │
//!     ├── cells: HashMap<K, FeedbackCell>
//!     │       │
//!     │       └── FeedbackCell: compute fn + cached value + listeners
//!     │
//!     ├── watched: HashSet<K>
//!     │
//!     └── event_channel: mpsc::channel<FeedbackEvent<K>>
//!             │
//!             └── ChangeIterator<K>
//! ```

pub mod event;
pub mod iter;
pub mod store;
pub mod value;

pub use event::FeedbackEvent;
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use store::{ComputeFn, FeedbackCell, FeedbackStore, Listener};
pub use value::FeedbackValue;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::event::FeedbackEvent;
    pub use crate::iter::ChangeIterator;
    pub use crate::store::FeedbackStore;
    pub use crate::value::FeedbackValue;
}
