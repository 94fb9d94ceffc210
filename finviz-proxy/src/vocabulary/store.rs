//! Atomically replaceable snapshot holder.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// Shared handle to the currently published snapshot of `T`.
///
/// Readers call [`load`](Self::load) once and keep the returned `Arc` for as
/// long as they need a consistent view. A publish swaps the whole value; it
/// never touches a snapshot a reader already holds.
pub struct SnapshotStore<T> {
    current: Arc<ArcSwap<T>>,
}

impl<T> SnapshotStore<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: Arc::new(ArcSwap::new(Arc::new(initial))),
        }
    }

    /// The snapshot published most recently.
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Replace the published snapshot, returning the previous one.
    pub fn publish(&self, next: T) -> Arc<T> {
        self.current.swap(Arc::new(next))
    }
}

impl<T: Default> Default for SnapshotStore<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for SnapshotStore<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<T> std::fmt::Debug for SnapshotStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore").finish_non_exhaustive()
    }
}
