//! Sitepipe - static-site asset pipeline
//!
//! This library provides functionality to:
//! - Run asset tasks (Sass, HTML, JavaScript, raster images, WebP, SVG,
//!   icon sprites) from a source tree into an output tree
//! - Order those tasks as a dependency graph and run it in parallel
//! - Serve the output with live reload and rebuild on source changes

pub mod build;
pub mod cli;
pub mod config;
pub mod logging;
pub mod server;
pub mod tasks;
pub mod watch;
