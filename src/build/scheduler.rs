//! Parallel graph execution.
//!
//! # How It Works
//!
//! 1. Order the graph and count the unfinished prerequisites of each task
//! 2. Start every task whose prerequisites are done, up to `jobs` at a time,
//!    each on its own scoped thread
//! 3. When a task succeeds, release the dependents it was holding back
//! 4. When a task fails, mark everything downstream of it as blocked;
//!    unrelated branches keep running
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{Scheduler, NullProgress};
//!
//! let result = Scheduler::new().with_jobs(4).run(&graph, &tasks, &NullProgress)?;
//! println!("{}", result.summary());
//! ```

use crate::build::graph::{GraphError, TaskGraph};
use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::build::result::{BuildResult, TaskResult};
use crate::tasks::{TaskError, TaskId, TaskOutput};
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Executes a single task on behalf of the scheduler.
pub trait TaskRunner: Sync {
    fn run_task(&self, task: TaskId) -> Result<TaskOutput, TaskError>;
}

/// Default number of parallel jobs (uses available parallelism).
fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Parallel graph executor.
#[derive(Debug, Clone)]
pub struct Scheduler {
    /// Maximum tasks running at once
    jobs: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

type Outcome = (TaskId, Result<TaskOutput, String>, Duration);

impl Scheduler {
    pub fn new() -> Self {
        Self { jobs: default_jobs() }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run every task of the graph.
    ///
    /// Results are returned in execution order. Only an invalid graph is an
    /// error; task failures are recorded in the [`BuildResult`].
    pub fn run(
        &self,
        graph: &TaskGraph,
        runner: &dyn TaskRunner,
        progress: &dyn ProgressReporter,
    ) -> Result<BuildResult, GraphError> {
        let start = Instant::now();
        let order = graph.topological_order()?;

        progress.report(ProgressEvent::BuildStarted { total_tasks: order.len() });

        let mut waiting_on: HashMap<TaskId, usize> =
            order.iter().map(|&t| (t, graph.dependencies(t).len())).collect();
        let mut ready: Vec<TaskId> =
            order.iter().copied().filter(|t| graph.dependencies(*t).is_empty()).collect();
        let mut settled: HashMap<TaskId, TaskResult> = HashMap::new();

        let (tx, rx) = mpsc::channel::<Outcome>();

        std::thread::scope(|scope| {
            let mut running = 0usize;

            loop {
                while running < self.jobs && !ready.is_empty() {
                    let task = ready.remove(0);
                    progress.report(ProgressEvent::TaskStarted { task });
                    tracing::debug!(%task, "starting task");

                    let tx = tx.clone();
                    scope.spawn(move || {
                        let started = Instant::now();
                        let outcome =
                            panic::catch_unwind(AssertUnwindSafe(|| runner.run_task(task)))
                                .unwrap_or_else(|_| {
                                    Err(TaskError::Panicked(format!("task '{}' panicked", task)))
                                })
                                .map_err(|e| e.to_string());
                        let _ = tx.send((task, outcome, started.elapsed()));
                    });
                    running += 1;
                }

                if running == 0 {
                    break;
                }

                let Ok((task, outcome, duration)) = rx.recv() else {
                    break;
                };
                running -= 1;

                let result = match outcome {
                    Ok(output) => {
                        for dependent in graph.dependents(task) {
                            if let Some(count) = waiting_on.get_mut(&dependent) {
                                *count -= 1;
                                if *count == 0 && !settled.contains_key(&dependent) {
                                    ready.push(dependent);
                                }
                            }
                        }
                        ready.sort_by_key(|t| order.iter().position(|o| o == t));
                        task_result(task, output, duration)
                    }
                    Err(message) => {
                        tracing::debug!(%task, %message, "task failed");
                        let failed = TaskResult::failed(task, message, duration);
                        for blocked in blocked_by(graph, task) {
                            if settled.contains_key(&blocked) {
                                continue;
                            }
                            let result = TaskResult::blocked(blocked, task);
                            report_settled(progress, &result);
                            settled.insert(blocked, result);
                        }
                        failed
                    }
                };

                report_settled(progress, &result);
                settled.insert(task, result);
            }
        });

        let mut result = BuildResult::new();
        for task in order {
            if let Some(task_result) = settled.remove(&task) {
                result.add_result(task_result);
            }
        }
        let result = result.with_duration(start.elapsed());
        progress.report(ProgressEvent::completed(&result));

        Ok(result)
    }
}

fn task_result(task: TaskId, output: TaskOutput, duration: Duration) -> TaskResult {
    let result = if output.skipped {
        TaskResult::skipped(task, duration)
    } else {
        TaskResult::success(task, output.outputs, duration)
    };
    result.with_warnings(output.warnings)
}

fn report_settled(progress: &dyn ProgressReporter, result: &TaskResult) {
    for warning in &result.warnings {
        progress.report(ProgressEvent::Warning { task: Some(result.task), message: warning.clone() });
    }
    progress.report(ProgressEvent::TaskCompleted {
        task: result.task,
        status: result.status.clone(),
        duration_ms: result.duration.as_millis() as u64,
    });
}

/// Every task transitively depending on `failed`.
fn blocked_by(graph: &TaskGraph, failed: TaskId) -> Vec<TaskId> {
    let mut reached = HashSet::new();
    let mut frontier = vec![failed];
    let mut blocked = Vec::new();
    while let Some(current) = frontier.pop() {
        for dependent in graph.dependents(current) {
            if reached.insert(dependent) {
                blocked.push(dependent);
                frontier.push(dependent);
            }
        }
    }
    blocked
}
