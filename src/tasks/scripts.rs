//! Scripts task: minify each file to `<stem><suffix>` (default `.min.js`).
//!
//! Files already named with the suffix (`vendor.min.js`) are copied as-is.

use crate::build::{BuildContext, FileSet};
use crate::tasks::fs::{discover, output_paths, read, with_suffix, write_atomic};
use crate::tasks::{TaskError, TaskOutput};
use minify_js::{Session, TopLevelMode};
use std::path::{Path, PathBuf};

pub fn run(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let config = &ctx.config().scripts;
    let files = discover(ctx, &FileSet::new(&config.patterns))?;
    let out_dir = ctx.out_dir();

    let dests = output_paths(&files, &out_dir, |relative| output_name(relative, &config.suffix))?;

    for (file, dest) in files.iter().zip(&dests) {
        let source = read(&file.path)?;
        if is_minified(&file.relative, &config.suffix) {
            write_atomic(dest, &source)?;
        } else {
            write_atomic(dest, &minify_script(&file.path, &source)?)?;
        }
    }

    Ok(TaskOutput::new(dests))
}

fn is_minified(relative: &Path, suffix: &str) -> bool {
    relative.file_name().is_some_and(|name| name.to_string_lossy().ends_with(suffix))
}

/// `js/app.js` → `js/app.min.js`; `js/vendor.min.js` keeps its name.
fn output_name(relative: &Path, suffix: &str) -> PathBuf {
    if is_minified(relative, suffix) {
        relative.to_path_buf()
    } else {
        with_suffix(relative, suffix)
    }
}

/// Minify one script. Comments are dropped by the minifier.
pub fn minify_script(path: &Path, source: &[u8]) -> Result<Vec<u8>, TaskError> {
    let session = Session::new();
    let mut out = Vec::with_capacity(source.len());
    minify_js::minify(&session, TopLevelMode::Global, source, &mut out).map_err(|e| {
        TaskError::Script { path: path.to_path_buf(), message: format!("{:?}", e) }
    })?;
    Ok(out)
}
