#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

use ctg::{
    graph::{TaskGraph, TaskHandle, TaskScope},
    task::Task,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

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
fn tasks_execute_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    for _ in 0..100 {
        let task = graph.allocate_task(CountTask {
            counter: Arc::clone(&counter),
        });
        graph.run_task(task);
    }
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 100);
}

#[test]
fn run_lists_drains_every_list() {
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    let lists = (0..4)
        .map(|_| {
            (0..25)
                .map(|_| {
                    graph.allocate_task(CountTask {
                        counter: Arc::clone(&counter),
                    })
                })
                .collect()
        })
        .collect();
    graph.run_lists(lists);
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 100);
}

// Spawns children from inside execute(); wait() must cover them.
struct SpawnTask {
    fan_out: usize,
    counter: Arc<AtomicUsize>,
}

impl Task for SpawnTask {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        for _ in 0..self.fan_out {
            let child = scope.allocate_child(CountTask {
                counter: Arc::clone(&self.counter),
            });
            scope.spawn(child);
        }
        self.counter.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[test]
fn wait_covers_dynamically_spawned_children() {
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    for _ in 0..10 {
        let task = graph.allocate_task(SpawnTask {
            fan_out: 8,
            counter: Arc::clone(&counter),
        });
        graph.run_task(task);
    }
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 10 * 9);
}

// The classic fork-join: fork children, recycle in place, and observe all
// of them completed on re-execution.
struct ReducerTask {
    forked: bool,
    fan_out: usize,
    counter: Arc<AtomicUsize>,
    // Value of `counter` observed by the join incarnation, plus one.
    observed: Arc<AtomicUsize>,
}

impl Task for ReducerTask {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        if !self.forked {
            self.forked = true;
            // The extra reference keeps the recycled task from re-firing
            // before the last child completes.
            scope.add_child_reference();
            scope.recycle_as_continuation();
            for _ in 0..self.fan_out {
                let child = scope.allocate_child(CountTask {
                    counter: Arc::clone(&self.counter),
                });
                scope.spawn(child);
            }
            None
        } else {
            self.observed
                .store(self.counter.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
            None
        }
    }
}

#[test]
fn recycled_task_rejoins_after_children() {
    let counter = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    let task = graph.allocate_task(ReducerTask {
        forked: false,
        fan_out: 16,
        counter: Arc::clone(&counter),
        observed: Arc::clone(&observed),
    });
    graph.run_task(task);
    graph.wait();
    // The join incarnation ran exactly once, after all 16 children.
    assert_eq!(observed.load(Ordering::Relaxed), 16 + 1);
    assert_eq!(counter.load(Ordering::Relaxed), 16);
}

// Re-recycles itself `rounds` times, spawning one child per round.
struct RepeatTask {
    rounds: usize,
    incarnations: Arc<AtomicUsize>,
    counter: Arc<AtomicUsize>,
}

impl Task for RepeatTask {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        self.incarnations.fetch_add(1, Ordering::Relaxed);
        if self.rounds == 0 {
            return None;
        }
        self.rounds -= 1;
        scope.add_child_reference();
        scope.recycle_as_continuation();
        let child = scope.allocate_child(CountTask {
            counter: Arc::clone(&self.counter),
        });
        scope.spawn(child);
        None
    }
}

#[test]
fn task_recycled_k_times_executes_k_plus_one_times() {
    let incarnations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    let task = graph.allocate_task(RepeatTask {
        rounds: 5,
        incarnations: Arc::clone(&incarnations),
        counter: Arc::clone(&counter),
    });
    graph.run_task(task);
    graph.wait();
    assert_eq!(incarnations.load(Ordering::Relaxed), 6);
    assert_eq!(counter.load(Ordering::Relaxed), 5);
}

struct JoinCheck {
    counter: Arc<AtomicUsize>,
    observed: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

impl Task for JoinCheck {
    fn execute(&mut self, _scope: &TaskScope<'_>) -> Option<TaskHandle> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.observed
            .store(self.counter.load(Ordering::Relaxed) + 1, Ordering::Relaxed);
        None
    }
}

// Allocates an explicit continuation instead of recycling, transferring the
// outstanding-child obligation to it.
struct FanOutRoot {
    counter: Arc<AtomicUsize>,
    observed: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

impl Task for FanOutRoot {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        let continuation = scope.allocate_continuation(
            3,
            JoinCheck {
                counter: Arc::clone(&self.counter),
                observed: Arc::clone(&self.observed),
                runs: Arc::clone(&self.runs),
            },
        );
        for _ in 0..3 {
            let child = continuation.allocate_continuing_child(CountTask {
                counter: Arc::clone(&self.counter),
            });
            scope.spawn(child);
        }
        None
    }
}

#[test]
fn continuation_fires_once_after_seeded_children() {
    let counter = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    let task = graph.allocate_task(FanOutRoot {
        counter: Arc::clone(&counter),
        observed: Arc::clone(&observed),
        runs: Arc::clone(&runs),
    });
    graph.run_task(task);
    graph.wait();
    assert_eq!(runs.load(Ordering::Relaxed), 1);
    assert_eq!(observed.load(Ordering::Relaxed), 3 + 1);
}

struct Recorder {
    events: Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
}

impl Task for Recorder {
    fn execute(&mut self, _scope: &TaskScope<'_>) -> Option<TaskHandle> {
        self.events.lock().unwrap().push(self.label);
        None
    }
}

// Recycles itself as a child of a freshly allocated continuation: the
// second incarnation and the sibling child must both precede the
// continuation.
struct StagedRoot {
    rejoined: bool,
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl Task for StagedRoot {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        if !self.rejoined {
            self.rejoined = true;
            self.events.lock().unwrap().push("fork");
            let continuation = scope.allocate_continuation(
                2,
                Recorder {
                    events: Arc::clone(&self.events),
                    label: "final",
                },
            );
            let sibling = continuation.allocate_continuing_child(Recorder {
                events: Arc::clone(&self.events),
                label: "sibling",
            });
            scope.spawn(sibling);
            scope.recycle_as_child_of(&continuation);
            // No children of our own: only the implicit self reference.
            scope.add_child_reference();
            None
        } else {
            self.events.lock().unwrap().push("rejoin");
            None
        }
    }
}

#[test]
fn recycle_as_child_of_orders_before_continuation() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let graph = TaskGraph::new();
    let task = graph.allocate_task(StagedRoot {
        rejoined: false,
        events: Arc::clone(&events),
    });
    graph.run_task(task);
    graph.wait();
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], "fork");
    assert_eq!(*events.last().unwrap(), "final");
    assert!(events.contains(&"rejoin"));
    assert!(events.contains(&"sibling"));
}

// Hands the scheduler a next task on every step; long chains must complete
// even past the bypass budget of a single dispatcher job.
struct ChainTask {
    remaining: usize,
    counter: Arc<AtomicUsize>,
}

impl Task for ChainTask {
    fn execute(&mut self, scope: &TaskScope<'_>) -> Option<TaskHandle> {
        self.counter.fetch_add(1, Ordering::Relaxed);
        if self.remaining == 0 {
            return None;
        }
        Some(scope.allocate_child(ChainTask {
            remaining: self.remaining - 1,
            counter: Arc::clone(&self.counter),
        }))
    }
}

#[test]
fn bypass_chain_longer_than_budget_completes() {
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    let task = graph.allocate_task(ChainTask {
        remaining: 500,
        counter: Arc::clone(&counter),
    });
    graph.run_task(task);
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 501);
}

#[test]
fn remove_child_reference_returns_post_decrement_value() {
    let graph = TaskGraph::new();
    let task = graph.allocate_task(CountTask {
        counter: Arc::new(AtomicUsize::new(0)),
    });
    task.add_child_reference();
    task.add_child_reference();
    assert_eq!(task.remove_child_reference(), 1);
    assert_eq!(task.remove_child_reference(), 0);
    graph.run_task(task);
    graph.wait();
}

#[test]
fn child_allocated_before_submission_completes_independently() {
    let counter = Arc::new(AtomicUsize::new(0));
    let graph = TaskGraph::new();
    let parent = graph.allocate_task(CountTask {
        counter: Arc::clone(&counter),
    });
    let child = parent.allocate_child(CountTask {
        counter: Arc::clone(&counter),
    });
    graph.run_task(child);
    graph.run_task(parent);
    graph.wait();
    assert_eq!(counter.load(Ordering::Relaxed), 2);
}
