//! Command-line interface implementation
//!
//! `sitepipe` with no task runs the development flow (build, serve, watch),
//! `sitepipe build` runs the one-shot production build, and `sitepipe <task>`
//! runs a single graph task without its dependencies.

mod build;
mod dev;

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::build::{flows, BuildContext, BuildMode, ConsoleProgress, JsonProgress, ProgressReporter, TaskGraph};
use crate::config::loader::{find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::config::{default_config, ConfigError};
use crate::tasks::{TaskId, UnknownTask};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Sitepipe - static-site asset pipeline with dev server and live reload
#[derive(Parser, Debug)]
#[command(name = "sitepipe")]
#[command(about = "Sitepipe - build static-site assets, serve them with live reload")]
#[command(version)]
pub struct Cli {
    /// What to run: `build`, `default`, or a single task
    /// (clean, copy, styles, html, scripts, optimize-images, copy-images,
    /// changed-images, webp, svg, sprite). Defaults to `default`.
    pub task: Option<String>,

    /// Path to site.toml (default: search upwards from the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the source directory
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Override the output directory
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Override the dev server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum tasks running at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Emit progress as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Show each task as it starts
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the task graph without running it
    #[arg(long)]
    pub dry_run: bool,
}

/// A resolved command-line invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build, serve and watch
    Default,
    /// One-shot production build
    Build,
    /// One graph task on its own
    Task(TaskId),
}

impl Command {
    pub fn from_name(name: Option<&str>) -> Result<Self, UnknownTask> {
        match name {
            None | Some("default") => Ok(Command::Default),
            Some("build") => Ok(Command::Build),
            Some(task) => task.parse().map(Command::Task),
        }
    }

    fn mode(self) -> BuildMode {
        match self {
            Command::Default => BuildMode::Development,
            Command::Build | Command::Task(_) => BuildMode::Production,
        }
    }

    fn graph(self, ctx: &BuildContext) -> TaskGraph {
        match self {
            Command::Task(task) => TaskGraph::single(task),
            Command::Default | Command::Build => flows::graph_for(ctx),
        }
    }
}

/// Parse arguments, set up diagnostics and run.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);
    run_with(cli)
}

pub fn run_with(cli: Cli) -> ExitCode {
    let command = match Command::from_name(cli.task.as_deref()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = TaskId::ALL.iter().map(|t| t.name()).collect();
            eprintln!("Available: build, default, {}", names.join(", "));
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let ctx = match load_context(&cli, command.mode()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let graph = command.graph(&ctx);
    if cli.dry_run {
        return build::dry_run(&ctx, &graph);
    }

    let options = RunOptions { json: cli.json, verbose: cli.verbose };
    match command {
        Command::Default => dev::run_dev(ctx, &graph, options),
        Command::Build | Command::Task(_) => build::run_build(ctx, &graph, options),
    }
}

/// Output settings shared by the build and dev flows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunOptions {
    pub json: bool,
    pub verbose: bool,
}

impl RunOptions {
    pub fn reporter(self) -> Box<dyn ProgressReporter> {
        if self.json {
            Box::new(JsonProgress::new())
        } else {
            Box::new(ConsoleProgress::new().with_verbose(self.verbose))
        }
    }
}

/// Load configuration, apply flag overrides and pick the project root.
fn load_context(cli: &Cli, mode: BuildMode) -> Result<BuildContext, ConfigError> {
    let config_path = cli.config.clone().or_else(find_config);

    let (mut config, project_root) = match config_path {
        Some(path) => {
            if cli.verbose {
                eprintln!("Using config: {}", path.display());
            }
            let config = load_config(Some(&path))?;
            (config, project_root_of(&path))
        }
        None => {
            if cli.verbose {
                eprintln!("No site.toml found, using defaults");
            }
            (default_config(), std::env::current_dir()?)
        }
    };

    let overrides = CliOverrides {
        out: cli.out.clone(),
        src: cli.src.clone(),
        port: cli.port,
        jobs: cli.jobs,
    };
    merge_cli_overrides(&mut config, &overrides);

    Ok(BuildContext::new(config, project_root).with_mode(mode))
}

fn project_root_of(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_name() {
        assert_eq!(Command::from_name(None), Ok(Command::Default));
        assert_eq!(Command::from_name(Some("default")), Ok(Command::Default));
        assert_eq!(Command::from_name(Some("build")), Ok(Command::Build));
        assert_eq!(Command::from_name(Some("optimize-images")), Ok(Command::Task(TaskId::OptimizeImages)));
        assert!(Command::from_name(Some("deploy")).is_err());
    }

    #[test]
    fn test_command_mode() {
        assert_eq!(Command::Default.mode(), BuildMode::Development);
        assert_eq!(Command::Build.mode(), BuildMode::Production);
        assert_eq!(Command::Task(TaskId::Styles).mode(), BuildMode::Production);
    }

    #[test]
    fn test_single_task_graph_has_no_dependencies() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/site"));
        let graph = Command::Task(TaskId::Sprite).graph(&ctx);
        assert_eq!(graph.tasks(), &[TaskId::Sprite]);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "sitepipe", "build", "--out", "dist", "--port", "8080", "-j", "2", "--json", "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.task.as_deref(), Some("build"));
        assert_eq!(cli.out, Some(PathBuf::from("dist")));
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.jobs, Some(2));
        assert!(cli.json && cli.dry_run && !cli.verbose);

        assert!(Cli::try_parse_from(["sitepipe", "--port", "not-a-port"]).is_err());
    }

    #[test]
    fn test_project_root_of() {
        assert_eq!(project_root_of(Path::new("/site/site.toml")), PathBuf::from("/site"));
        assert_eq!(project_root_of(Path::new("site.toml")), PathBuf::from("."));
    }
}
