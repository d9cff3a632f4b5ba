use core::sync::atomic::{AtomicUsize, Ordering};
use derive_more::Debug;
use std::sync::{Arc, Condvar, Mutex};

/// A unit of work accepted by a [`Dispatch`] implementation.
pub type Work = Box<dyn FnOnce() + Send>;

/// The executor collaborator of the task graph and the parallel primitives.
///
/// Implementations accept callables for concurrent execution and support a
/// blocking [`wait`] for all outstanding work submitted to the instance,
/// including work submitted transitively from inside running callables.
///
/// [`wait`]: Dispatch::wait
pub trait Dispatch: Send + Sync + 'static {
    /// Submits `work` for execution and returns immediately.
    fn run(&self, work: Work);

    /// Blocks the calling thread until all submitted work has completed.
    fn wait(&self);
}

// The outstanding-work barrier shared between `run` jobs and `wait`ers.
#[derive(Debug, Default)]
struct WaitState {
    pending: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

/// A [`Dispatch`] implementation backed by rayon's work-stealing thread
/// pool.
///
/// By default work is spawned onto the current (usually global) rayon pool;
/// [`with_pool`] pins the dispatcher to a dedicated pool instead, which also
/// fixes the worker-thread count.
///
/// [`with_pool`]: RayonDispatcher::with_pool
#[derive(Debug, Default)]
pub struct RayonDispatcher {
    #[debug(skip)]
    pool: Option<Arc<rayon::ThreadPool>>,
    state: Arc<WaitState>,
}

impl RayonDispatcher {
    /// Creates a dispatcher spawning onto the current rayon pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher spawning onto `pool`.
    pub fn with_pool(pool: Arc<rayon::ThreadPool>) -> Self {
        Self {
            pool: Some(pool),
            state: Arc::default(),
        }
    }
}

impl Dispatch for RayonDispatcher {
    fn run(&self, work: Work) {
        // The increment must be visible before the job can decrement, so a
        // waiter never observes a spurious zero while work is in flight.
        self.state.pending.fetch_add(1, Ordering::Relaxed);
        let state = Arc::clone(&self.state);
        let job = move || {
            work();
            if state.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                // Take the lock before notifying so a waiter between its
                // pending check and `cvar.wait` cannot miss the wakeup.
                let _guard = state.lock.lock().expect("RayonDispatcher::run");
                state.cvar.notify_all();
            }
        };
        match &self.pool {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
    }

    fn wait(&self) {
        let mut guard = self.state.lock.lock().expect("RayonDispatcher::wait");
        while self.state.pending.load(Ordering::Acquire) != 0 {
            guard = self
                .state
                .cvar
                .wait(guard)
                .expect("RayonDispatcher::wait");
        }
    }
}

/// A [`Dispatch`] implementation that runs every callable inline on the
/// submitting thread.
///
/// All work has already completed whenever [`Dispatch::wait`] is reached, so
/// waiting is a no-op. Useful for debugging and for environments where
/// concurrency is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialDispatcher;

impl SerialDispatcher {
    /// Creates an inline dispatcher.
    pub fn new() -> Self {
        Self
    }
}

impl Dispatch for SerialDispatcher {
    fn run(&self, work: Work) {
        work();
    }

    fn wait(&self) {}
}
