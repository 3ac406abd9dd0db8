//! Watch mode for automatic rebuilds on file changes
//!
//! Source changes are debounced, mapped to tasks through the watch rule table,
//! and each triggered task is re-run together with every task downstream of it
//! in the development graph. A task outside the graph runs on its own.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::build::discovery::{compile_patterns, matches_any};
use crate::build::graph::{GraphError, TaskGraph};
use crate::build::progress::format_duration;
use crate::build::result::{BuildResult, TaskStatus};
use crate::config::schema::{WatchConfig, WatchRuleConfig};
use crate::server::LiveReload;
use crate::tasks::TaskId;
use glob::Pattern;

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Channel receive error
    ChannelError(String),
    /// Source directory not found
    SourceNotFound(PathBuf),
    /// A watch rule has a bad pattern or task name
    InvalidRule { pattern: String, message: String },
    /// The rebuild graph could not be ordered
    Graph(GraphError),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::ChannelError(msg) => write!(f, "Watch channel error: {}", msg),
            WatchError::SourceNotFound(path) => {
                write!(f, "Source directory not found: {}", path.display())
            }
            WatchError::InvalidRule { pattern, message } => {
                write!(f, "Invalid watch rule '{}': {}", pattern, message)
            }
            WatchError::Graph(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WatchError {}

impl From<GraphError> for WatchError {
    fn from(e: GraphError) -> Self {
        WatchError::Graph(e)
    }
}

/// Source paths matching `patterns` trigger `task`.
#[derive(Debug, Clone)]
pub struct WatchRule {
    patterns: Vec<Pattern>,
    task: TaskId,
}

impl WatchRule {
    /// Compile one rule. The pattern may use `{a,b}` alternation.
    pub fn new(pattern: &str, task: TaskId) -> Result<Self, WatchError> {
        let patterns = compile_patterns(&[pattern.to_string()]).map_err(|e| {
            WatchError::InvalidRule { pattern: pattern.to_string(), message: e.to_string() }
        })?;
        Ok(Self { patterns, task })
    }

    /// Compile the `[[watch.rules]]` table.
    pub fn from_config(rules: &[WatchRuleConfig]) -> Result<Vec<Self>, WatchError> {
        rules
            .iter()
            .map(|rule| {
                let task = rule.task.parse::<TaskId>().map_err(|e| WatchError::InvalidRule {
                    pattern: rule.pattern.clone(),
                    message: e.to_string(),
                })?;
                Self::new(&rule.pattern, task)
            })
            .collect()
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Whether a source-relative path triggers this rule.
    pub fn matches(&self, relative: &Path) -> bool {
        matches_any(&self.patterns, relative)
    }
}

/// Tasks triggered by changed paths, in rule order, without duplicates.
///
/// Each path triggers the first rule it matches. Paths outside `src_dir`
/// trigger nothing.
pub fn tasks_for_changes(rules: &[WatchRule], src_dir: &Path, paths: &[PathBuf]) -> Vec<TaskId> {
    let mut hits = vec![false; rules.len()];
    for path in paths {
        let Ok(relative) = path.strip_prefix(src_dir) else {
            continue;
        };
        if let Some(index) = rules.iter().position(|rule| rule.matches(relative)) {
            hits[index] = true;
        }
    }

    let mut tasks = Vec::new();
    for (rule, hit) in rules.iter().zip(hits) {
        if hit && !tasks.contains(&rule.task) {
            tasks.push(rule.task);
        }
    }
    tasks
}

/// The part of `graph` to re-run for `triggered` tasks: each task plus
/// everything downstream of it, keeping the graph's edges.
pub fn rebuild_graph(graph: &TaskGraph, triggered: &[TaskId]) -> Result<TaskGraph, GraphError> {
    let mut keep = Vec::new();
    for &task in triggered {
        for downstream in graph.downstream(task)? {
            if !keep.contains(&downstream) {
                keep.push(downstream);
            }
        }
    }
    Ok(graph.subgraph(&keep))
}

/// Whether browsers need a full page reload after a rebuild.
///
/// Styles pushes its own stylesheet update, so a rebuild where nothing else
/// produced output does not reload the page.
pub fn needs_full_reload(result: &BuildResult) -> bool {
    result.tasks.iter().any(|r| r.task != TaskId::Styles && r.status == TaskStatus::Success)
}

/// Tracks failing tasks across rebuilds for recovery detection
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Tasks that failed the last time they ran
    failing: HashSet<TaskId>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update tracker with a build result, returns tasks that were failing
    /// and now succeeded. Tasks that did not run keep their previous state.
    pub fn update(&mut self, result: &BuildResult) -> Vec<TaskId> {
        let mut fixed = Vec::new();
        for task_result in &result.tasks {
            match task_result.status {
                TaskStatus::Failed(_) => {
                    self.failing.insert(task_result.task);
                }
                TaskStatus::Success | TaskStatus::Skipped => {
                    if self.failing.remove(&task_result.task) {
                        fixed.push(task_result.task);
                    }
                }
                TaskStatus::Blocked(_) => {}
            }
        }
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }

    /// Get the number of failing tasks
    pub fn error_count(&self) -> usize {
        self.failing.len()
    }
}

/// Options for watch mode
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Source directory to watch
    pub src_dir: PathBuf,
    /// Output directory; changes under it are ignored
    pub out_dir: PathBuf,
    /// Watch configuration (debounce, clear screen, rules)
    pub config: WatchConfig,
    /// Show full source-relative paths, and changes that trigger nothing
    pub verbose: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("source"),
            out_dir: PathBuf::from("build"),
            config: WatchConfig::default(),
            verbose: false,
        }
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400; // seconds since midnight
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// File name, or the source-relative path when `full`.
fn display_path(path: &Path, src_dir: &Path, full: bool) -> String {
    let shown = if full {
        path.strip_prefix(src_dir).unwrap_or(path)
    } else {
        path.file_name().map(Path::new).unwrap_or(path)
    };
    shown.display().to_string()
}

fn task_list(tasks: &[TaskId]) -> String {
    tasks.iter().map(|t| t.name()).collect::<Vec<_>>().join(", ")
}

/// Watch for file changes and rebuild automatically.
///
/// `build` runs a graph and is called once per batch of relevant changes.
/// After each rebuild `reload` (when given) is told to refresh browsers.
/// Blocks until the watcher channel closes.
pub fn watch_and_rebuild<F>(
    options: &WatchOptions,
    graph: &TaskGraph,
    reload: Option<&LiveReload>,
    mut build: F,
) -> Result<(), WatchError>
where
    F: FnMut(&TaskGraph) -> Result<BuildResult, GraphError>,
{
    // Verify source directory exists
    if !options.src_dir.exists() {
        return Err(WatchError::SourceNotFound(options.src_dir.clone()));
    }
    let rules = WatchRule::from_config(&options.config.rules)?;
    // Events arrive with canonical paths
    let src_dir = options.src_dir.canonicalize().unwrap_or_else(|_| options.src_dir.clone());
    let out_dir = options.out_dir.canonicalize().unwrap_or_else(|_| options.out_dir.clone());

    // Create channel for debounced events
    let (tx, rx) = channel();

    // Create debounced watcher
    let debounce_duration = Duration::from_millis(options.config.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce_duration, tx).map_err(WatchError::WatcherInit)?;

    // Start watching the source directory
    debouncer.watcher().watch(&src_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    let mut error_tracker = ErrorTracker::new();
    println!("[{}] Watching {} for changes...", timestamp(), options.src_dir.display());

    // Watch loop
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed: Vec<PathBuf> = events
                    .iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .filter(|e| !e.path.starts_with(&out_dir))
                    .map(|e| e.path.clone())
                    .collect();

                let triggered = tasks_for_changes(&rules, &src_dir, &changed);
                if triggered.is_empty() {
                    if options.verbose {
                        for path in &changed {
                            let shown = display_path(path, &src_dir, true);
                            println!("[{}] Ignored: {}", timestamp(), shown);
                        }
                    }
                    continue;
                }

                for path in &changed {
                    let shown = display_path(path, &src_dir, options.verbose);
                    println!("[{}] Changed: {}", timestamp(), shown);
                }

                // Clear screen if configured
                if options.config.clear_screen {
                    clear_screen();
                }

                let subgraph = rebuild_graph(graph, &triggered)?;
                println!("[{}] Building {}...", timestamp(), task_list(subgraph.tasks()));
                let start = Instant::now();
                let result = build(&subgraph)?;
                let elapsed = start.elapsed();

                // Track fixed tasks before reporting new errors
                let fixed = error_tracker.update(&result);
                print_build_result(&result, &fixed, elapsed);

                if let Some(reload) = reload {
                    if needs_full_reload(&result) {
                        let clients = reload.reload();
                        tracing::debug!(clients, "sent full reload");
                    }
                }

                println!("[{}] Watching {} for changes...", timestamp(), options.src_dir.display());
            }
            Ok(Err(error)) => {
                // Watch error (non-fatal) - log but continue watching
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                eprintln!("[{}] Continuing to watch...", timestamp());
            }
            Err(e) => {
                return Err(WatchError::ChannelError(e.to_string()));
            }
        }
    }
}

/// Print build result to console with fixed task notifications
fn print_build_result(result: &BuildResult, fixed: &[TaskId], elapsed: Duration) {
    // Report fixed tasks first (before showing new errors)
    for task in fixed {
        println!("[{}] Fixed: {}", timestamp(), task);
    }

    let duration = format_duration(elapsed.as_millis() as u64);
    if result.is_success() {
        let ran = result.success_count();
        println!(
            "[{}] Build complete ({}) - {} task{}",
            timestamp(),
            duration,
            ran,
            if ran == 1 { "" } else { "s" }
        );
    } else {
        let error_count = result.failed_count();
        println!(
            "[{}] Build failed ({}) - {} error{}",
            timestamp(),
            duration,
            error_count,
            if error_count == 1 { "" } else { "s" }
        );

        for failure in result.failures() {
            match &failure.status {
                TaskStatus::Failed(message) => {
                    eprintln!("[{}] Error in {}: {}", timestamp(), failure.task, message)
                }
                status => eprintln!("[{}] Skipped {}: {}", timestamp(), failure.task, status),
            }
        }
    }

    for warning in result.all_warnings() {
        eprintln!("[{}] Warning: {}", timestamp(), warning);
    }
}
