use super::{node::RawTask, GraphInner, TaskHandle};
use crate::{
    sync::{fence, Arc, Ordering},
    task::Task,
};

// Budget of nodes one dispatcher job may run back-to-back through scheduler
// bypass before re-submitting the remaining ready nodes to the dispatcher.
// Bounds the time a single job monopolizes its worker on long completion
// chains; the drain loop already bounds stack growth.
const BYPASS_LIMIT: usize = 64;

/// Runs `first` and every node that becomes ready on this thread as a
/// consequence (recycled re-executions, parent wake-ups, and next-task
/// hand-offs), up to the bypass budget.
pub(crate) fn run_to_completion(inner: &Arc<GraphInner>, first: Arc<RawTask>) {
    let mut ready = vec![first];
    let mut executed = 0_usize;
    while let Some(node) = ready.pop() {
        if executed == BYPASS_LIMIT {
            inner.spawn_node(node);
            for pending in ready.drain(..) {
                inner.spawn_node(pending);
            }
            return;
        }
        executed += 1;
        step(inner, node, &mut ready);
    }
}

// One turn of the trampoline: execute an incarnation, then resolve
// recycling, completion propagation, and the next-task hand-off by pushing
// ready nodes onto the local LIFO.
fn step(inner: &Arc<GraphInner>, node: Arc<RawTask>, ready: &mut Vec<Arc<RawTask>>) {
    // Each incarnation starts not recycled; execute() re-arms the flag if
    // needed.
    node.clear_recycle();

    let next = {
        let scope = TaskScope {
            node: &node,
            inner,
        };
        // SAFETY: This thread is the node's sole runner: a node is submitted
        // exactly once per incarnation, and a new incarnation is triggered
        // only by its child count reaching zero exactly once.
        unsafe { node.execute(&scope) }
    };

    if let Some(next) = next {
        // Pushed first so the completion handling below pops ahead of it:
        // a re-executed self or woken parent runs before the bypassed next
        // task.
        ready.push(next.into_raw());
    }

    if node.is_recycled() {
        // Cancel the extra safety reference the recycling caller accounted
        // for. Reaching zero here means every child has already completed
        // and this turn is responsible for re-running the task.
        if node.remove_child_reference() == 0 {
            fence(Ordering::Acquire);
            ready.push(node);
        }
    } else {
        // SAFETY: Completion detaches the parent link exactly once; no
        // other thread touches it once the node has stopped executing.
        let parent = unsafe { node.take_parent() };
        drop(node);
        if let Some(parent) = parent {
            // If this was the last child of a task awaiting re-execution,
            // run the parent directly instead of round-tripping through the
            // dispatcher queue.
            if parent.remove_child_reference() == 0 {
                fence(Ordering::Acquire);
                if parent.is_recycled() {
                    ready.push(parent);
                }
            }
        }
    }
}

/// The node-local operations available to a running task.
///
/// A scope borrows the node currently being executed; all allocation and
/// recycling operations act on or relative to that node.
pub struct TaskScope<'a> {
    pub(crate) node: &'a Arc<RawTask>,
    pub(crate) inner: &'a Arc<GraphInner>,
}

impl TaskScope<'_> {
    /// Allocates a new subtask of the running task, incrementing the
    /// running task's child count.
    pub fn allocate_child(&self, task: impl Task) -> TaskHandle {
        self.node.add_child_reference();
        TaskHandle::new(RawTask::new(Box::new(task), Some(Arc::clone(self.node))))
    }

    /// Allocates a new subtask of the running task without incrementing its
    /// child count, because the outstanding-child obligation has already
    /// been transferred to a continuation.
    pub fn allocate_continuing_child(&self, task: impl Task) -> TaskHandle {
        TaskHandle::new(RawTask::new(Box::new(task), Some(Arc::clone(self.node))))
    }

    /// Allocates a continuation task pre-seeded with `children` expected
    /// children.
    ///
    /// The continuation inherits the running task's parent link
    /// (re-parenting), so the running task's completion propagates through
    /// the continuation's subtree instead. The continuation executes as
    /// soon as its seeded child count reaches zero; `children` must cover
    /// every child subsequently allocated for it via
    /// [`TaskHandle::allocate_continuing_child`] and must be at least 1, or
    /// the continuation can never fire.
    ///
    /// Continuation passing provides an alternative to the task-blocking
    /// style of execution that results from recursively spawning children
    /// and waiting for them to complete (the common fork-join pattern), at
    /// the cost of growing the heap instead of the stack.
    pub fn allocate_continuation(&self, children: i32, task: impl Task) -> TaskHandle {
        // SAFETY: Only the executing thread reads or writes its own node's
        // parent link.
        let parent = unsafe { self.node.take_parent() };
        TaskHandle::new(RawTask::with_seeded_children(
            Box::new(task),
            parent,
            children,
            true,
        ))
    }

    /// Marks the running task for in-place re-execution once its
    /// outstanding children complete, instead of being destroyed.
    ///
    /// This recycles the node as its own continuation, avoiding the heap
    /// allocation of [`allocate_continuation`]. The caller must account for
    /// one extra implicit child reference beyond the children it explicitly
    /// spawns (via [`add_child_reference`]); the scheduler removes that
    /// extra reference after `execute` returns, which prevents the recycled
    /// task from re-firing before a longer-lived child completes.
    ///
    /// [`allocate_continuation`]: TaskScope::allocate_continuation
    /// [`add_child_reference`]: TaskScope::add_child_reference
    pub fn recycle_as_continuation(&self) {
        self.node.set_recycle();
    }

    /// Marks the running task for re-execution and re-parents it under
    /// `continuation`.
    ///
    /// The continuation's pre-seeded child count must already account for
    /// the running task; its count is not incremented here. The same extra
    /// implicit self reference as for [`recycle_as_continuation`] applies.
    ///
    /// [`recycle_as_continuation`]: TaskScope::recycle_as_continuation
    pub fn recycle_as_child_of(&self, continuation: &TaskHandle) {
        self.node.set_recycle();
        // SAFETY: Only the executing thread reads or writes its own node's
        // parent link.
        unsafe { self.node.set_parent(Some(Arc::clone(continuation.raw()))) };
    }

    /// Submits `task` for concurrent execution, transferring its ownership
    /// to the graph. Returns immediately.
    pub fn spawn(&self, task: TaskHandle) {
        self.inner.spawn_node(task.into_raw());
    }

    /// Increments the running task's child count.
    pub fn add_child_reference(&self) {
        self.node.add_child_reference();
    }

    /// Decrements the running task's child count, returning the
    /// post-decrement value.
    pub fn remove_child_reference(&self) -> i32 {
        self.node.remove_child_reference()
    }
}
