//! Filesystem tasks and helpers shared by every task.

use crate::build::{BuildContext, FileSet, SourceFile};
use crate::tasks::{TaskError, TaskOutput};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Delete the output directory. A missing directory is not an error.
///
/// Paths are compared after resolving `..` and symlinks; an output directory
/// that is, or contains, the source directory or the project root is refused.
pub fn clean(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let out_dir = ctx.out_dir();
    let resolved = match fs::canonicalize(&out_dir) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TaskOutput::default()),
        Err(e) => return Err(TaskError::io(out_dir, e)),
    };

    let protected_dirs =
        [(ctx.src_dir(), "source directory"), (ctx.project_root().to_path_buf(), "project root")];
    for (protected, what) in protected_dirs {
        let Ok(protected) = fs::canonicalize(&protected) else {
            continue;
        };
        if protected.starts_with(&resolved) {
            return Err(TaskError::io(
                &out_dir,
                io::Error::new(io::ErrorKind::InvalidInput, format!("refusing to delete the {}", what)),
            ));
        }
    }

    match fs::remove_dir_all(&resolved) {
        Ok(()) => {
            tracing::debug!(dir = %resolved.display(), "removed output directory");
            Ok(TaskOutput::default())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TaskOutput::default()),
        Err(e) => Err(TaskError::io(out_dir, e)),
    }
}

/// Copy static assets (fonts, favicons) to the same relative paths.
pub fn copy_static(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let files = discover(ctx, &FileSet::new(&ctx.config().copy.patterns))?;
    let out_dir = ctx.out_dir();

    let mut outputs = Vec::with_capacity(files.len());
    for file in &files {
        let dest = file.output_in(&out_dir);
        copy_file(&file.path, &dest)?;
        outputs.push(dest);
    }

    Ok(TaskOutput::new(outputs))
}

/// Resolve a file set against the source directory.
pub fn discover(ctx: &BuildContext, set: &FileSet) -> Result<Vec<SourceFile>, TaskError> {
    Ok(set.discover(&ctx.src_dir())?)
}

/// Read a source file.
pub fn read(path: &Path) -> Result<Vec<u8>, TaskError> {
    fs::read(path).map_err(|e| TaskError::io(path, e))
}

/// Read a UTF-8 source file.
pub fn read_to_string(path: &Path) -> Result<String, TaskError> {
    fs::read_to_string(path).map_err(|e| TaskError::io(path, e))
}

/// Byte-for-byte copy through [`write_atomic`].
pub fn copy_file(src: &Path, dest: &Path) -> Result<(), TaskError> {
    let bytes = read(src)?;
    write_atomic(dest, &bytes)
}

/// Write `bytes` to `dest` via a temp file in the same directory, so readers
/// never see a partial file.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<(), TaskError> {
    let parent = dest.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent).map_err(|e| TaskError::io(&parent, e))?;

    let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| TaskError::io(&parent, e))?;
    tmp.write_all(bytes).map_err(|e| TaskError::io(dest, e))?;
    tmp.persist(dest).map_err(|e| TaskError::io(dest, e.error))?;
    Ok(())
}

/// Output path of each source file, in order, failing when two sources map to
/// the same output.
pub fn output_paths(
    files: &[SourceFile],
    out_dir: &Path,
    name: impl Fn(&Path) -> PathBuf,
) -> Result<Vec<PathBuf>, TaskError> {
    let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
    let mut dests = Vec::with_capacity(files.len());
    for file in files {
        let dest = out_dir.join(name(&file.relative));
        if let Some(first) = claimed.insert(dest.clone(), &file.path) {
            return Err(TaskError::OutputConflict {
                first: first.to_path_buf(),
                second: file.path.clone(),
                dest,
            });
        }
        dests.push(dest);
    }
    Ok(dests)
}

/// Replace the extension of a relative path, e.g. `js/app.js` → `js/app.min.js`
/// for suffix `.min.js`.
pub fn with_suffix(relative: &Path, suffix: &str) -> PathBuf {
    let stem = relative.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    relative.with_file_name(format!("{}{}", stem, suffix))
}
