//! Graph tasks.
//!
//! Each task reads from the source directory and writes only under the output
//! directory. Content transformations are delegated to codec crates; the
//! modules here handle discovery, path mapping and atomic writes.

pub mod fs;
pub mod html;
pub mod images;
pub mod scripts;
pub mod sprite;
pub mod styles;
pub mod svg;
pub mod webp;

use crate::build::{BuildContext, DiscoveryError, TaskRunner};
use crate::server::LiveReload;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a graph task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Clean,
    Copy,
    Styles,
    Html,
    Scripts,
    OptimizeImages,
    CopyImages,
    ChangedImages,
    Webp,
    Svg,
    Sprite,
}

impl TaskId {
    /// Every task, in declaration order.
    pub const ALL: [TaskId; 11] = [
        TaskId::Clean,
        TaskId::Copy,
        TaskId::Styles,
        TaskId::Html,
        TaskId::Scripts,
        TaskId::OptimizeImages,
        TaskId::CopyImages,
        TaskId::ChangedImages,
        TaskId::Webp,
        TaskId::Svg,
        TaskId::Sprite,
    ];

    /// Command-line name.
    pub fn name(self) -> &'static str {
        match self {
            TaskId::Clean => "clean",
            TaskId::Copy => "copy",
            TaskId::Styles => "styles",
            TaskId::Html => "html",
            TaskId::Scripts => "scripts",
            TaskId::OptimizeImages => "optimize-images",
            TaskId::CopyImages => "copy-images",
            TaskId::ChangedImages => "changed-images",
            TaskId::Webp => "webp",
            TaskId::Svg => "svg",
            TaskId::Sprite => "sprite",
        }
    }

    /// One-line description for `--help` and dry runs.
    pub fn description(self) -> &'static str {
        match self {
            TaskId::Clean => "delete the output directory",
            TaskId::Copy => "copy fonts, favicons and other static files",
            TaskId::Styles => "compile, prefix and minify the stylesheet",
            TaskId::Html => "collapse whitespace in HTML pages",
            TaskId::Scripts => "minify JavaScript",
            TaskId::OptimizeImages => "recompress PNG and JPEG images",
            TaskId::CopyImages => "copy PNG and JPEG images unchanged",
            TaskId::ChangedImages => "recompress images newer than their output",
            TaskId::Webp => "encode WebP renditions of raster images",
            TaskId::Svg => "optimize standalone SVG files",
            TaskId::Sprite => "bundle icons into an SVG sprite",
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown task name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task '{0}'")]
pub struct UnknownTask(pub String);

impl FromStr for TaskId {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskId::ALL.into_iter().find(|t| t.name() == s).ok_or_else(|| UnknownTask(s.to_string()))
    }
}

/// Task failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Sass error in {}: {message}", .path.display())]
    Sass { path: PathBuf, message: String },
    #[error("CSS error in {}: {message}", .path.display())]
    Css { path: PathBuf, message: String },
    #[error("script error in {}: {message}", .path.display())]
    Script { path: PathBuf, message: String },
    #[error("image error in {}: {message}", .path.display())]
    Image { path: PathBuf, message: String },
    #[error("SVG error in {}: {message}", .path.display())]
    Svg { path: PathBuf, message: String },
    #[error("{} and {} both write {}", .first.display(), .second.display(), .dest.display())]
    OutputConflict { first: PathBuf, second: PathBuf, dest: PathBuf },
    #[error("{0}")]
    Panicked(String),
}

impl TaskError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io { path: path.into(), source }
    }
}

/// What a successful task produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutput {
    /// Files written, sorted
    pub outputs: Vec<PathBuf>,
    pub warnings: Vec<String>,
    /// The task found nothing to do
    pub skipped: bool,
}

impl TaskOutput {
    pub fn new(mut outputs: Vec<PathBuf>) -> Self {
        outputs.sort();
        Self { outputs, warnings: vec![], skipped: false }
    }

    /// A no-op run, with the reason recorded as a warning.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self { outputs: vec![], warnings: vec![reason.into()], skipped: true }
    }
}

/// Runs graph tasks against one build context.
#[derive(Debug, Clone)]
pub struct Tasks {
    ctx: BuildContext,
    reload: Option<LiveReload>,
}

impl Tasks {
    pub fn new(ctx: BuildContext) -> Self {
        Self { ctx, reload: None }
    }

    /// Send stylesheet updates to live-reload clients.
    pub fn with_live_reload(mut self, reload: LiveReload) -> Self {
        self.reload = Some(reload);
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    /// Run one task.
    pub fn run(&self, task: TaskId) -> Result<TaskOutput, TaskError> {
        let ctx = &self.ctx;
        match task {
            TaskId::Clean => fs::clean(ctx),
            TaskId::Copy => fs::copy_static(ctx),
            TaskId::Styles => styles::run(ctx, self.reload.as_ref()),
            TaskId::Html => html::run(ctx),
            TaskId::Scripts => scripts::run(ctx),
            TaskId::OptimizeImages => images::optimize(ctx),
            TaskId::CopyImages => images::copy(ctx),
            TaskId::ChangedImages => images::changed(ctx),
            TaskId::Webp => webp::run(ctx),
            TaskId::Svg => svg::run(ctx),
            TaskId::Sprite => sprite::run(ctx),
        }
    }
}

impl TaskRunner for Tasks {
    fn run_task(&self, task: TaskId) -> Result<TaskOutput, TaskError> {
        let span = tracing::info_span!("task", %task);
        let _guard = span.enter();
        self.run(task)
    }
}
