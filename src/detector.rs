//! Quiescence-based detection of task cycles.
//!
//! Task cycles form when tasks directly or indirectly wait on themselves to
//! complete, preventing the task graph from ever finishing. The detector
//! maintains counters for blocked and unblocked tasks; workers continually
//! execute unblocked tasks until none remain. If any blocked task survives
//! the point where no worker is busy and no unblocked task exists, at least
//! one cycle must exist among the blocked tasks.
//!
//! A cycle is never reported while other tasks can still make progress: a
//! cycle established early in a round surfaces only once all other tasks
//! have completed or become blocked.

mod packed;

use crate::{
    diagnostic::{Diagnostic, DiagnosticSink, ErrorKind},
    sync::{AtomicBool, AtomicI32, Ordering},
};
use packed::BusyThreadsAndUnblockedTasks;

/// The cooperative-interruption collaborator of the [`TaskCycleDetector`].
///
/// [`interrupt`] is invoked at most once per detection session, when a cycle
/// is found, so the owning system stops scheduling new top-level work. It
/// does not preempt tasks already running or queued.
///
/// [`interrupt`]: Interrupt::interrupt
pub trait Interrupt: Send + Sync {
    /// Asks the owning system to stop scheduling new top-level work.
    fn interrupt(&self);
}

/// Per-worker detector state, passed explicitly into every operation.
///
/// The deltas accumulate while the worker is busy and are flushed into the
/// shared counters by the outermost [`end_thread_busy`].
///
/// [`end_thread_busy`]: TaskCycleDetector::end_thread_busy
#[derive(Debug, Default)]
pub struct WorkerContext {
    // Number of nested busy sections for the worker. > 0 means busy.
    nested_busy: u32,
    blocked_tasks: i32,
    unblocked_tasks: i32,
}

impl WorkerContext {
    /// Creates an idle worker context.
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
#[repr(align(128))]
struct BlockedTasks(AtomicI32);

/// Detects when a task graph is blocked by a data-dependency cycle, without
/// a central coordinator and without stopping the world.
///
/// Workers bracket their participation with [`begin_thread_busy`] /
/// [`end_thread_busy`] and report task transitions through
/// [`create_task`], [`destroy_task`], [`block_task`], and
/// [`unblock_task`]. The last worker to go idle performs the decision: if
/// any blocked task remains with no capacity left to unblock it, exactly
/// one [`ErrorKind::DataDependencyCycle`] diagnostic is posted and the
/// injected [`Interrupt`] fires.
///
/// [`begin_thread_busy`]: TaskCycleDetector::begin_thread_busy
/// [`end_thread_busy`]: TaskCycleDetector::end_thread_busy
/// [`create_task`]: TaskCycleDetector::create_task
/// [`destroy_task`]: TaskCycleDetector::destroy_task
/// [`block_task`]: TaskCycleDetector::block_task
/// [`unblock_task`]: TaskCycleDetector::unblock_task
#[derive(derive_more::Debug)]
pub struct TaskCycleDetector {
    diagnostics: DiagnosticSink,
    #[debug(skip)]
    interrupt: Box<dyn Interrupt>,
    // Set once a cycle has been reported; a cycle is reported at most once
    // per detection session.
    reported: AtomicBool,
    busy_and_unblocked: BusyThreadsAndUnblockedTasks,
    blocked_tasks: BlockedTasks,
}

impl TaskCycleDetector {
    /// Creates a detector posting to `diagnostics` and interrupting through
    /// `interrupt`.
    pub fn new(diagnostics: DiagnosticSink, interrupt: Box<dyn Interrupt>) -> Self {
        Self {
            diagnostics,
            interrupt,
            reported: AtomicBool::new(false),
            busy_and_unblocked: BusyThreadsAndUnblockedTasks::new(),
            blocked_tasks: BlockedTasks(AtomicI32::new(0)),
        }
    }

    /// Declares that the worker owning `cx` is now busy executing tasks.
    ///
    /// Pairs of `begin_thread_busy` / [`end_thread_busy`] may be nested;
    /// only the outermost pair touches the shared counters.
    ///
    /// [`end_thread_busy`]: TaskCycleDetector::end_thread_busy
    pub fn begin_thread_busy(&self, cx: &mut WorkerContext) {
        cx.nested_busy += 1;
        if cx.nested_busy > 1 {
            // Nested call: the worker is already busy.
            return;
        }
        self.busy_and_unblocked.add(1, 0, Ordering::Release);
        cx.blocked_tasks = 0;
        cx.unblocked_tasks = 0;
    }

    /// Declares that the worker owning `cx` has completed executing tasks.
    ///
    /// The outermost call flushes the worker's deltas into the shared
    /// counters and, if the caller is the last busy worker with no
    /// unblocked task remaining, performs cycle detection.
    pub fn end_thread_busy(&self, cx: &mut WorkerContext) {
        debug_assert!(
            cx.nested_busy > 0,
            "TaskCycleDetector::end_thread_busy: unmatched call"
        );
        cx.nested_busy -= 1;
        if cx.nested_busy > 0 {
            // Nested call: the worker is still busy.
            return;
        }

        // Flush the number of blocked tasks accumulated by this worker.
        self.blocked_tasks
            .0
            .fetch_add(cx.blocked_tasks, Ordering::Acquire);

        // Decrement the number of busy workers while also flushing the
        // worker's unblocked-task delta, in one combined atomic add. The
        // acquire half pairs with the release decrements of workers that
        // went idle earlier, making their blocked-task flushes visible to
        // the decision below.
        let (prev_busy, prev_unblocked) =
            self.busy_and_unblocked
                .fetch_add(-1, cx.unblocked_tasks, Ordering::AcqRel);
        let busy_threads = prev_busy - 1;
        let unblocked_tasks = prev_unblocked + cx.unblocked_tasks;
        cx.blocked_tasks = 0;
        cx.unblocked_tasks = 0;

        // While any busy worker or unblocked task remains, the graph can
        // still make progress and it is too early to check for cycles.
        if busy_threads != 0 || unblocked_tasks != 0 {
            return;
        }

        // Only the last busy worker reaches this point: either all work has
        // completed, or every remaining task is blocked.
        let blocked_tasks = self.blocked_tasks.0.load(Ordering::Acquire);
        if blocked_tasks != 0 {
            self.report_cycle(blocked_tasks);
        }
    }

    /// Returns an RAII guard that marks the worker busy until dropped.
    pub fn busy_scope<'a>(&'a self, cx: &'a mut WorkerContext) -> BusyScope<'a> {
        self.begin_thread_busy(cx);
        BusyScope { detector: self, cx }
    }

    /// Declares that a new task has been created. The new task is assumed
    /// to be unblocked.
    ///
    /// Must only be called while the worker is busy. A task must be
    /// declared created before it is made runnable, so that queued work is
    /// never invisible to the quiescence decision.
    pub fn create_task(&self, cx: &mut WorkerContext) {
        debug_assert!(
            cx.nested_busy > 0,
            "TaskCycleDetector::create_task: worker not busy"
        );
        cx.unblocked_tasks += 1;
    }

    /// Declares that a task has completed and will be destroyed. The task
    /// is assumed to already be unblocked.
    ///
    /// Must only be called while the worker is busy.
    pub fn destroy_task(&self, cx: &mut WorkerContext) {
        debug_assert!(
            cx.nested_busy > 0,
            "TaskCycleDetector::destroy_task: worker not busy"
        );
        cx.unblocked_tasks -= 1;
    }

    /// Declares that a previously unblocked task is now blocked.
    ///
    /// Must only be called while the worker is busy.
    pub fn block_task(&self, cx: &mut WorkerContext) {
        debug_assert!(
            cx.nested_busy > 0,
            "TaskCycleDetector::block_task: worker not busy"
        );
        cx.blocked_tasks += 1;
        cx.unblocked_tasks -= 1;
    }

    /// Declares that a previously blocked task is now unblocked.
    ///
    /// Must only be called while the worker is busy.
    pub fn unblock_task(&self, cx: &mut WorkerContext) {
        debug_assert!(
            cx.nested_busy > 0,
            "TaskCycleDetector::unblock_task: worker not busy"
        );
        cx.unblocked_tasks += 1;
        cx.blocked_tasks -= 1;
    }

    fn report_cycle(&self, blocked_tasks: i32) {
        if self.reported.swap(true, Ordering::AcqRel) {
            // At most one quiescence point with blocked tasks is expected
            // per detection session.
            debug_assert!(
                false,
                "TaskCycleDetector: cycle reported more than once in a session"
            );
            return;
        }
        tracing::error!(blocked_tasks, "data dependency cycle detected");
        self.diagnostics.post(Diagnostic::new(
            ErrorKind::DataDependencyCycle,
            format!(
                "data dependency cycle detected: {blocked_tasks} tasks are \
                 blocked and cannot make progress"
            ),
        ));
        self.interrupt.interrupt();
    }
}

impl Drop for TaskCycleDetector {
    fn drop(&mut self) {
        // Blocked tasks legitimately survive an interrupted round; in every
        // other case all counters must have returned to zero.
        if self.reported.load(Ordering::Acquire) {
            return;
        }
        let (busy_threads, unblocked_tasks) = self.busy_and_unblocked.load(Ordering::Acquire);
        let blocked_tasks = self.blocked_tasks.0.load(Ordering::Relaxed);
        debug_assert!(
            busy_threads == 0 && blocked_tasks == 0 && unblocked_tasks == 0,
            "TaskCycleDetector: counters not all zero at teardown: \
             busy threads={busy_threads}, blocked tasks={blocked_tasks}, \
             unblocked tasks={unblocked_tasks}"
        );
    }
}

/// An RAII guard holding a worker's busy bracket open.
///
/// Exposes the task-transition operations of the underlying detector for
/// the duration of the bracket; dropping the guard ends it.
#[derive(Debug)]
pub struct BusyScope<'a> {
    detector: &'a TaskCycleDetector,
    cx: &'a mut WorkerContext,
}

impl BusyScope<'_> {
    /// Declares that a new, unblocked task has been created.
    pub fn create_task(&mut self) {
        self.detector.create_task(self.cx);
    }

    /// Declares that an unblocked task has completed and will be destroyed.
    pub fn destroy_task(&mut self) {
        self.detector.destroy_task(self.cx);
    }

    /// Declares that a previously unblocked task is now blocked.
    pub fn block_task(&mut self) {
        self.detector.block_task(self.cx);
    }

    /// Declares that a previously blocked task is now unblocked.
    pub fn unblock_task(&mut self) {
        self.detector.unblock_task(self.cx);
    }
}

impl Drop for BusyScope<'_> {
    fn drop(&mut self) {
        self.detector.end_thread_busy(self.cx);
    }
}
