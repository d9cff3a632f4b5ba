#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

// This binary owns the process-wide concurrency limit: every test here runs
// with concurrency disabled, exercising the degenerate serial mode.

use ctg::{
    config,
    dispatcher::SerialDispatcher,
    graph::{TaskGraph, TaskHandle, TaskScope},
    loops::{parallel_for_each, parallel_for_n, parallel_for_range, IndexRange},
    task::Task,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

fn disable_concurrency() {
    config::set_concurrency_limit(1);
    assert!(!config::has_concurrency());
}

#[test]
fn parallel_for_n_degenerates_to_single_call() {
    disable_concurrency();
    let calls = Mutex::new(Vec::new());
    parallel_for_n(10, |begin, end| calls.lock().unwrap().push((begin, end)));
    assert_eq!(*calls.lock().unwrap(), vec![(0, 10)]);
}

#[test]
fn parallel_for_each_degenerates_to_in_order_iteration() {
    disable_concurrency();
    let seen = Mutex::new(Vec::new());
    parallel_for_each(0..5_usize, |item| seen.lock().unwrap().push(item));
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn parallel_for_range_degenerates_to_whole_range() {
    disable_concurrency();
    let ranges = Mutex::new(Vec::new());
    parallel_for_range(IndexRange::with_grain(0, 64, 4), |range| {
        ranges.lock().unwrap().push((range.begin(), range.end()));
    });
    assert_eq!(*ranges.lock().unwrap(), vec![(0, 64)]);
}

struct CountTask {
    counter: Arc<AtomicUsize>,
}

impl Task for CountTask {
    fn execute(&mut self, _scope: &TaskScope<'_>) -> Option<TaskHandle> {
        self.counter.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[test]
fn inline_dispatcher_runs_tasks_on_the_submitting_thread() {
    disable_concurrency();
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::with_dispatcher(SerialDispatcher::new());
    for _ in 0..10 {
        let task = graph.allocate_task(CountTask {
            counter: Arc::clone(&counter),
        });
        graph.run_task(task);
    }
    // Inline execution: everything already completed at submission time.
    assert_eq!(counter.load(Ordering::Relaxed), 10);
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 10);
}

struct SpawnTask {
    counter: Arc<AtomicUsize>,
}

impl Task for SpawnTask {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        let child = scope.allocate_child(CountTask {
            counter: Arc::clone(&self.counter),
        });
        scope.spawn(child);
        self.counter.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[test]
fn inline_dispatcher_handles_nested_spawns() {
    disable_concurrency();
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::with_dispatcher(SerialDispatcher::new());
    let task = graph.allocate_task(SpawnTask {
        counter: Arc::clone(&counter),
    });
    graph.run_task(task);
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 2);
}
