//! Cooperative task-graph scheduler with quiescence-based cycle detection.
//!
//! This crate provides the concurrency substrate for hierarchical,
//! dynamically discovered parallel work: tasks that spawn further tasks
//! while other tasks are running. It:
//! - Schedules a dynamically growing graph of tasks with parent/child
//!   completion dependencies, supporting continuation passing, in-place
//!   recycling of task resources, and scheduler bypass.
//! - Detects, without a supervisor thread, when remaining tasks are
//!   mutually blocked on each other's results and reports the cycle
//!   exactly once per round.
//! - Offers fork-style parallel loops over index ranges, iterators, and
//!   user-defined splittable domains, all with a serial fallback when
//!   concurrency is disabled.
//!
//! Key modules:
//! - `graph`: the task graph: allocation, submission, child reference
//!   counting, continuation passing, recycling, and the bypassing
//!   trampoline.
//! - `task`: the `Task` trait implemented by units of work.
//! - `detector`: the quiescence-based data-dependency-cycle detector with
//!   explicit per-worker contexts.
//! - `dispatcher`: the `Dispatch` collaborator trait with rayon-backed and
//!   inline implementations.
//! - `loops`: `parallel_for_n`, `parallel_for_each`, and splittable-range
//!   parallelism.
//! - `diagnostic`: the typed diagnostic channel consumed by higher layers.
//! - `config`: the process-wide concurrency limit.
//!
//! Quick start:
//! 1. Implement `Task::execute` for your unit of work, spawning children
//!    through the provided `TaskScope` as new work is discovered.
//! 2. Create a `TaskGraph`, allocate top-level tasks with `allocate_task`,
//!    and submit them with `run_task` or `run_lists`.
//! 3. Call `wait` to block until the graph is quiescent.
//!
//! Tasks that cooperatively wait on other tasks' results report their
//! blocked/unblocked transitions to a `TaskCycleDetector`; when the graph
//! quiesces with blocked tasks remaining, the detector posts a single
//! `DataDependencyCycle` diagnostic and interrupts the round through the
//! injected collaborator instead of hanging.

/// Process-wide concurrency limit consulted by the parallel primitives.
pub mod config;
/// Quiescence-based detection of data-dependency cycles among tasks.
pub mod detector;
/// Typed diagnostics posted by the detector and consumed by higher layers.
pub mod diagnostic;
/// The executor collaborator interface and its implementations.
pub mod dispatcher;
/// The task graph: allocation, submission, continuation passing, recycling,
/// and scheduler bypass.
pub mod graph;
/// Fork-style parallel loops with serial fallbacks.
pub mod loops;
mod sync;
/// The `Task` trait implemented by units of work.
pub mod task;
/// Common aliases and the single-runner cell primitive used internally.
pub mod types;
mod utils;
