//! Build context containing configuration and paths for a run.

use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Which flow a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// One-shot production build; failures end the process.
    Production,
    /// Build, serve and watch; failures are logged and the process continues.
    Development,
}

/// Build context containing configuration and paths for a build operation.
///
/// The context is cheap to clone and is shared by every task of a run.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: SiteConfig,
    /// Project root directory (where site.toml is located)
    project_root: PathBuf,
    /// Production or development flow
    mode: BuildMode,
}

impl BuildContext {
    /// Create a new build context in production mode.
    ///
    /// # Arguments
    /// - `config` - The loaded configuration
    /// - `project_root` - The project root directory
    pub fn new(config: SiteConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, mode: BuildMode::Production }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source directory (resolved to absolute path).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Map a source-relative path into the output directory.
    pub fn output_path(&self, relative: &Path) -> PathBuf {
        self.out_dir().join(relative)
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Set the build mode.
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Number of tasks the scheduler may run at once.
    pub fn jobs(&self) -> usize {
        match self.config.build.jobs {
            0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            n => n,
        }
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }
}
