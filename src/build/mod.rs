//! Build pipeline for sitepipe
//!
//! Turns a source tree into a deployable output tree by running graph tasks.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Discovery**: Find source files using glob patterns from config
//! - **Planning**: Pick a [`TaskGraph`] for the flow (production or development)
//! - **Execution**: Run the graph with the [`Scheduler`], reporting progress
//!
//! # Example
//!
//! ```ignore
//! use sitepipe::build::{flows, BuildContext, ConsoleProgress, Scheduler};
//! use sitepipe::config::load_config;
//! use sitepipe::tasks::Tasks;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root);
//! let graph = flows::production_graph();
//!
//! let result = Scheduler::new().run(&graph, &Tasks::new(context), &ConsoleProgress::new())?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod flows;
pub mod graph;
pub mod progress;
pub mod result;
pub mod scheduler;

pub use context::*;
pub use discovery::*;
pub use graph::*;
pub use progress::*;
pub use result::*;
pub use scheduler::*;
