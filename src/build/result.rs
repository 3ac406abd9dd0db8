//! Build result types.
//!
//! Contains types for representing the outcome of build operations.

use crate::tasks::TaskId;
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task succeeded
    Success,
    /// Task had nothing to do
    Skipped,
    /// Task failed with error
    Failed(String),
    /// Task never ran because a prerequisite failed
    Blocked(TaskId),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, TaskStatus::Blocked(_))
    }

    /// Short machine-friendly name.
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Failed(_) => "failed",
            TaskStatus::Blocked(_) => "blocked",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Failed(err) => write!(f, "failed: {}", err),
            TaskStatus::Blocked(by) => write!(f, "blocked by {}", by),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task that ran
    pub task: TaskId,
    pub status: TaskStatus,
    /// Output files produced
    pub outputs: Vec<PathBuf>,
    pub duration: Duration,
    /// Warning messages (if any)
    pub warnings: Vec<String>,
}

impl TaskResult {
    /// Create a successful result.
    pub fn success(task: TaskId, outputs: Vec<PathBuf>, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Success, outputs, duration, warnings: vec![] }
    }

    /// Create a skipped result.
    pub fn skipped(task: TaskId, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Skipped, outputs: vec![], duration, warnings: vec![] }
    }

    /// Create a failed result.
    pub fn failed(task: TaskId, error: String, duration: Duration) -> Self {
        Self { task, status: TaskStatus::Failed(error), outputs: vec![], duration, warnings: vec![] }
    }

    /// Create a result for a task whose prerequisite `by` failed.
    pub fn blocked(task: TaskId, by: TaskId) -> Self {
        Self {
            task,
            status: TaskStatus::Blocked(by),
            outputs: vec![],
            duration: Duration::ZERO,
            warnings: vec![],
        }
    }

    /// Add warnings to the result.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete graph run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each task, in execution order
    pub tasks: Vec<TaskResult>,
    /// Total build duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Look up the result of one task.
    pub fn get(&self, task: TaskId) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    pub fn success_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Success)).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().filter(|r| matches!(r.status, TaskStatus::Skipped)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_failure()).count()
    }

    pub fn blocked_count(&self) -> usize {
        self.tasks.iter().filter(|r| r.status.is_blocked()).count()
    }

    /// Check if the overall build succeeded (no failures, nothing blocked).
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(TaskResult::is_success)
    }

    /// Get all outputs produced.
    pub fn all_outputs(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.outputs.iter()).collect()
    }

    /// Get all warnings, prefixed with the task that raised them.
    pub fn all_warnings(&self) -> Vec<String> {
        self.tasks
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| format!("{}: {}", r.task, w)))
            .collect()
    }

    /// Get failed and blocked task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| !r.is_success()).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();
        let blocked = self.blocked_count();
        let total = self.tasks.len();

        if !self.is_success() {
            lines.push(format!(
                "Build failed: {} succeeded, {} skipped, {} failed, {} blocked ({} total)",
                success, skipped, failed, blocked, total
            ));
            for result in self.failures() {
                lines.push(format!("  - {}: {}", result.task, result.status));
            }
        } else {
            lines.push(format!(
                "Build succeeded: {} ran, {} skipped ({} total) in {:?}",
                success, skipped, total, self.total_duration
            ));
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}
