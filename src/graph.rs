mod node;
mod run;

pub use node::TaskHandle;
pub use run::TaskScope;

use crate::{
    dispatcher::{Dispatch, RayonDispatcher},
    loops::parallel_for_each,
    sync::Arc,
    task::Task,
    types::TaskLists,
};
use node::RawTask;

/// Spawns and waits on a directed graph of tasks, where tasks keep a back
/// reference to their parent/successor and a reference count of pending
/// children.
///
/// Supports adding new tasks during the execution of running tasks,
/// continuation passing, recycling of task resources, and scheduler bypass.
/// This organization of tasks suits problems with hierarchical structured
/// parallelism: tasks that discover additional work while they run. If
/// those optimizations are not required, consider a higher-level
/// abstraction, e.g. [`parallel_for_each`] or direct submission of work via
/// a [`Dispatch`] implementation.
///
/// [`parallel_for_each`]: crate::loops::parallel_for_each
#[derive(derive_more::Debug)]
#[must_use]
pub struct TaskGraph {
    inner: Arc<GraphInner>,
}

#[derive(derive_more::Debug)]
pub(crate) struct GraphInner {
    #[debug(skip)]
    dispatcher: Box<dyn Dispatch>,
}

impl GraphInner {
    pub(crate) fn spawn_node(self: &Arc<Self>, node: Arc<RawTask>) {
        let inner = Arc::clone(self);
        self.dispatcher
            .run(Box::new(move || run::run_to_completion(&inner, node)));
    }
}

impl TaskGraph {
    /// Creates a task graph backed by a [`RayonDispatcher`] on the current
    /// rayon pool.
    pub fn new() -> Self {
        Self::with_dispatcher(RayonDispatcher::new())
    }

    /// Creates a task graph running on the given dispatcher.
    pub fn with_dispatcher(dispatcher: impl Dispatch) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                dispatcher: Box::new(dispatcher),
            }),
        }
    }

    /// Allocates a new top-level task to run with [`run_task`] or
    /// [`run_lists`].
    ///
    /// The caller owns the returned task until it is submitted.
    ///
    /// [`run_task`]: TaskGraph::run_task
    /// [`run_lists`]: TaskGraph::run_lists
    pub fn allocate_task(&self, task: impl Task) -> TaskHandle {
        TaskHandle::new(RawTask::new(Box::new(task), None))
    }

    /// Submits a task for concurrent execution and returns immediately.
    ///
    /// Transfers ownership of `task` to this graph instance.
    pub fn run_task(&self, task: TaskHandle) {
        self.inner.spawn_node(task.into_raw());
    }

    /// Submits the tasks accumulated in per-producer lists for concurrent
    /// execution, preserving the submission order within each list.
    ///
    /// Transfers ownership of all the listed tasks to this graph instance.
    pub fn run_lists(&self, lists: TaskLists) {
        parallel_for_each(lists, |list| {
            for task in list {
                self.run_task(task);
            }
        });
    }

    /// Blocks the calling thread until every node reachable from this graph
    /// instance, including nodes spawned dynamically by other nodes, has
    /// completed.
    ///
    /// A graph instance provides a single quiescence barrier: do not wait
    /// on it concurrently for more than one purpose.
    pub fn wait(&self) {
        tracing::trace!("waiting for task graph quiescence");
        self.inner.dispatcher.wait();
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskGraph {
    // Outstanding tasks must not outlive the graph's dispatcher.
    fn drop(&mut self) {
        self.inner.dispatcher.wait();
    }
}
