//! Build progress reporting.
//!
//! Supports console output (with colors) and JSON lines.
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
//!
//! let reporter = ConsoleProgress::new();
//! reporter.report(ProgressEvent::BuildStarted { total_tasks: 9 });
//! reporter.report(ProgressEvent::TaskStarted { task: TaskId::Styles });
//! ```

use crate::build::result::{BuildResult, TaskStatus};
use crate::tasks::TaskId;
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Events that can be reported during a build.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Graph run started
    BuildStarted {
        /// Total number of tasks in the graph
        total_tasks: usize,
    },
    /// A task started
    TaskStarted { task: TaskId },
    /// A task settled (including blocked tasks, which never start)
    TaskCompleted { task: TaskId, status: TaskStatus, duration_ms: u64 },
    /// Graph run completed
    BuildCompleted {
        success: bool,
        duration_ms: u64,
        succeeded: usize,
        skipped: usize,
        failed: usize,
        blocked: usize,
    },
    /// A warning was generated
    Warning { task: Option<TaskId>, message: String },
    /// The graph could not be run at all
    Error { message: String },
}

impl ProgressEvent {
    /// Summary event for a finished run.
    pub fn completed(result: &BuildResult) -> Self {
        ProgressEvent::BuildCompleted {
            success: result.is_success(),
            duration_ms: result.total_duration.as_millis() as u64,
            succeeded: result.success_count(),
            skipped: result.skipped_count(),
            failed: result.failed_count(),
            blocked: result.blocked_count(),
        }
    }
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    /// Settled task count
    current: AtomicUsize,
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a console reporter on stderr, colored when stderr is a terminal.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn bold(&self, text: &str) -> String {
        self.color(text, "\x1b[1m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_tasks } => {
                self.total.store(total_tasks, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total_tasks > 0 {
                    self.writeln(&format!(
                        "{} Running {} task{}...",
                        self.cyan("[build]"),
                        total_tasks,
                        if total_tasks == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::TaskStarted { task } => {
                if self.verbose {
                    self.writeln(&format!("{} Starting {}...", self.cyan("[build]"), task));
                }
            }
            ProgressEvent::TaskCompleted { task, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    TaskStatus::Success => self.green("ok"),
                    TaskStatus::Skipped => self.yellow("skipped"),
                    TaskStatus::Failed(_) => self.red("FAILED"),
                    TaskStatus::Blocked(_) => self.yellow("blocked"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    task,
                    format_duration(duration_ms)
                ));

                match status {
                    TaskStatus::Failed(err) => self.writeln(&format!("        {}", self.red(&err))),
                    TaskStatus::Blocked(by) => {
                        self.writeln(&format!("        waiting on failed task {}", by))
                    }
                    _ => {}
                }
            }
            ProgressEvent::BuildCompleted {
                success,
                duration_ms,
                succeeded,
                skipped,
                failed,
                blocked,
            } => {
                let duration_str = format_duration(duration_ms);
                let total = succeeded + skipped + failed + blocked;

                if success {
                    self.writeln(&format!(
                        "\n{} {} {} finished, {} skipped in {}",
                        self.green("[done]"),
                        self.bold(&format!("{}", total)),
                        if total == 1 { "task" } else { "tasks" },
                        skipped,
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "\n{} Build failed: {} succeeded, {} skipped, {} {}, {} blocked in {}",
                        self.red("[error]"),
                        succeeded,
                        skipped,
                        failed,
                        if failed == 1 { "failure" } else { "failures" },
                        blocked,
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { task, message } => {
                let prefix = task.map(|t| format!("{}: ", t)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { message } => {
                self.writeln(&format!("{} {}", self.red("[error]"), message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON-lines progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::BuildStarted { total_tasks } => {
                json!({ "event": "build_started", "total_tasks": total_tasks })
            }
            ProgressEvent::TaskStarted { task } => {
                json!({ "event": "task_started", "task": task.name() })
            }
            ProgressEvent::TaskCompleted { task, status, duration_ms } => {
                let mut value = json!({
                    "event": "task_completed",
                    "task": task.name(),
                    "status": status.name(),
                    "duration_ms": duration_ms,
                });
                match status {
                    TaskStatus::Failed(e) => value["error"] = json!(e),
                    TaskStatus::Blocked(by) => value["blocked_by"] = json!(by.name()),
                    _ => {}
                }
                value
            }
            ProgressEvent::BuildCompleted {
                success,
                duration_ms,
                succeeded,
                skipped,
                failed,
                blocked,
            } => json!({
                "event": "build_completed",
                "success": success,
                "duration_ms": duration_ms,
                "succeeded": succeeded,
                "skipped": skipped,
                "failed": failed,
                "blocked": blocked,
            }),
            ProgressEvent::Warning { task, message } => json!({
                "event": "warning",
                "message": message,
                "task": task.map(TaskId::name),
            }),
            ProgressEvent::Error { message } => json!({ "event": "error", "message": message }),
        };
        self.write_json(value);
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
