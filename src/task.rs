use crate::graph::{TaskHandle, TaskScope};

/// A unit of work runnable by the task graph.
///
/// Implementations define [`execute`], which performs the work and may use
/// the provided [`TaskScope`] to spawn children, allocate continuations, or
/// recycle the running task in place. Tasks are constructed by the caller
/// and handed to the graph via [`TaskGraph::allocate_task`],
/// [`TaskScope::allocate_child`], and friends.
///
/// A task suited to this graph typically discovers additional work while it
/// runs (hierarchical structured parallelism). If continuation passing,
/// recycling, and scheduler bypass are not required, prefer a higher-level
/// primitive such as [`parallel_for_each`] or direct submission through a
/// [`Dispatch`] implementation.
///
/// [`execute`]: Task::execute
/// [`TaskGraph::allocate_task`]: crate::graph::TaskGraph::allocate_task
/// [`parallel_for_each`]: crate::loops::parallel_for_each
/// [`Dispatch`]: crate::dispatcher::Dispatch
pub trait Task: Send + 'static {
    /// Performs one incarnation of this task's work.
    ///
    /// Returning `Some(next)` hands `next` directly to the scheduler for
    /// immediate execution on the current thread (scheduler bypass),
    /// avoiding a round trip through the dispatcher queue.
    ///
    /// The graph never intercepts panics escaping this method; avoiding or
    /// catching them is the caller's responsibility.
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle>;
}
