use crate::{
    sync::{Arc, AtomicBool, AtomicI32, Ordering},
    task::Task,
    types::SyncUnsafeCell,
};

/// A heap-allocated task-graph node.
///
/// The node's memory is reclaimed by the last `Arc` dropping; completion is
/// a state transition, never a manual free. The parent link is a back
/// reference used purely for re-parenting and completion propagation: it is
/// written only by the thread currently running the node and detached
/// exactly once by the thread completing it.
pub(crate) struct RawTask {
    // The user task body. Accessed mutably only by the node's current
    // runner.
    body: SyncUnsafeCell<Box<dyn Task>>,
    // The parent/successor of this node.
    parent: SyncUnsafeCell<Option<Arc<RawTask>>>,
    // Whether this node is awaiting re-execution once its child count
    // reaches zero.
    recycle: AtomicBool,
    // Pending children that must complete before this node can proceed.
    child_count: AtomicI32,
}

impl RawTask {
    pub(crate) fn new(body: Box<dyn Task>, parent: Option<Arc<RawTask>>) -> Arc<Self> {
        Arc::new(Self {
            body: SyncUnsafeCell::new(body),
            parent: SyncUnsafeCell::new(parent),
            recycle: AtomicBool::new(false),
            child_count: AtomicI32::new(0),
        })
    }

    // Allocates a continuation-style node: `children` pre-seeded references
    // and, when `awaiting` is set, armed to execute as soon as the seeded
    // children complete.
    pub(crate) fn with_seeded_children(
        body: Box<dyn Task>,
        parent: Option<Arc<RawTask>>,
        children: i32,
        awaiting: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            body: SyncUnsafeCell::new(body),
            parent: SyncUnsafeCell::new(parent),
            recycle: AtomicBool::new(awaiting),
            child_count: AtomicI32::new(children),
        })
    }

    pub(crate) fn add_child_reference(&self) {
        self.child_count.fetch_add(1, Ordering::Acquire);
    }

    /// Returns the post-decrement count, so callers test for "last child"
    /// by comparing against zero.
    pub(crate) fn remove_child_reference(&self) -> i32 {
        self.child_count.fetch_sub(1, Ordering::Release) - 1
    }

    pub(crate) fn set_recycle(&self) {
        self.recycle.store(true, Ordering::Relaxed);
    }

    pub(crate) fn clear_recycle(&self) {
        self.recycle.store(false, Ordering::Relaxed);
    }

    // Reads of another node's flag must be preceded by an acquire fence on
    // the decrement-to-zero transition, which orders them after the store.
    pub(crate) fn is_recycled(&self) -> bool {
        self.recycle.load(Ordering::Relaxed)
    }

    /// Detaches and returns the parent link.
    ///
    /// # Safety
    ///
    /// The caller must be the node's current runner or completer; the parent
    /// link is single-writer, single-reader by scheduling discipline.
    pub(crate) unsafe fn take_parent(&self) -> Option<Arc<RawTask>> {
        (*self.parent.get()).take()
    }

    /// Re-parents the node under `parent`.
    ///
    /// # Safety
    ///
    /// The caller must be the node's current runner; no other thread may
    /// observe the parent link while it is written.
    pub(crate) unsafe fn set_parent(&self, parent: Option<Arc<RawTask>>) {
        *self.parent.get() = parent;
    }

    /// Runs one incarnation of the task body.
    ///
    /// # Safety
    ///
    /// The caller must be the node's sole runner: a node is submitted
    /// exactly once per incarnation, and a new incarnation begins only when
    /// the child count reaches zero exactly once.
    pub(crate) unsafe fn execute(
        &self,
        scope: &crate::graph::TaskScope<'_>,
    ) -> Option<TaskHandle> {
        (*self.body.get()).execute(scope)
    }
}

/// The owned handle to an allocated task-graph node.
///
/// The holder owns the node until it is submitted via
/// [`TaskGraph::run_task`], [`TaskGraph::run_lists`], or
/// [`TaskScope::spawn`], or returned from [`Task::execute`] as the next
/// task; from then on the graph owns it.
///
/// [`TaskGraph::run_task`]: crate::graph::TaskGraph::run_task
/// [`TaskGraph::run_lists`]: crate::graph::TaskGraph::run_lists
/// [`TaskScope::spawn`]: crate::graph::TaskScope::spawn
/// [`Task::execute`]: crate::task::Task::execute
#[derive(derive_more::Debug)]
#[debug("TaskHandle")]
pub struct TaskHandle {
    raw: Arc<RawTask>,
}

impl TaskHandle {
    pub(crate) fn new(raw: Arc<RawTask>) -> Self {
        Self { raw }
    }

    pub(crate) fn raw(&self) -> &Arc<RawTask> {
        &self.raw
    }

    pub(crate) fn into_raw(self) -> Arc<RawTask> {
        self.raw
    }

    /// Increments the count of child tasks that must complete before this
    /// task can proceed.
    pub fn add_child_reference(&self) {
        self.raw.add_child_reference();
    }

    /// Decrements the count of child tasks that must complete before this
    /// task can proceed.
    ///
    /// Returns the post-decrement value, so the caller can test for "last
    /// child" by comparing against zero.
    pub fn remove_child_reference(&self) -> i32 {
        self.raw.remove_child_reference()
    }

    /// Allocates a new task parented under this node, incrementing this
    /// node's child count.
    ///
    /// Ownership of the returned task transfers to the graph once it is
    /// run.
    pub fn allocate_child(&self, task: impl Task) -> TaskHandle {
        self.raw.add_child_reference();
        TaskHandle::new(RawTask::new(Box::new(task), Some(Arc::clone(&self.raw))))
    }

    /// Allocates a new task parented under this node without incrementing
    /// this node's child count.
    ///
    /// Intended for children of a continuation whose expected child count
    /// was already pre-seeded at allocation time.
    pub fn allocate_continuing_child(&self, task: impl Task) -> TaskHandle {
        TaskHandle::new(RawTask::new(Box::new(task), Some(Arc::clone(&self.raw))))
    }
}
