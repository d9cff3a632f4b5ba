use crate::graph::TaskHandle;
use core::cell::UnsafeCell;
use derive_more::{Deref, DerefMut};

/// A minimal `UnsafeCell` wrapper that is `Sync` when `T: Send`.
///
/// Used internally by the task graph to enable interior mutability across
/// threads while correctness is ensured by scheduling: a node is accessed
/// only by the single thread currently running or completing it, and a
/// shared `&T` is never handed out, so `T: Send` suffices.
#[derive(Debug, Deref, DerefMut)]
#[repr(transparent)]
pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<T>);

// SAFETY: Access is funneled through raw pointers under the single-runner
// discipline documented at each use site; a `&T` is never shared between
// threads, so `T: Send` is sufficient for cross-thread hand-offs of the
// contents.
unsafe impl<T: Send> Sync for SyncUnsafeCell<T> {}

impl<T> SyncUnsafeCell<T> {
    pub(crate) fn new(val: T) -> Self {
        Self(UnsafeCell::new(val))
    }
}

/// An ordered sequence of allocated tasks accumulated by one producer, to be
/// submitted together via [`TaskGraph::run_lists`].
///
/// [`TaskGraph::run_lists`]: crate::graph::TaskGraph::run_lists
pub type TaskList = Vec<TaskHandle>;

/// Per-producer task lists, one [`TaskList`] per producer.
///
/// Ownership of every listed node transfers to the graph when the lists are
/// drained by [`TaskGraph::run_lists`].
///
/// [`TaskGraph::run_lists`]: crate::graph::TaskGraph::run_lists
pub type TaskLists = Vec<TaskList>;
