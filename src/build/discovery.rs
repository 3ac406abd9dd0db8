//! Source file discovery for the build system.
//!
//! Resolves include/exclude glob patterns relative to the source directory.
//! Patterns support `{a,b}` alternation on top of the usual `*`, `**`, `?`
//! and `[...]` syntax.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Error during source discovery.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    InvalidPattern(String, glob::PatternError),
    /// IO error during file enumeration
    Io(std::io::Error),
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::InvalidPattern(pattern, err) => {
                write!(f, "Invalid glob pattern '{}': {}", pattern, err)
            }
            DiscoveryError::Io(err) => write!(f, "IO error during discovery: {}", err),
        }
    }
}

impl std::error::Error for DiscoveryError {}

impl From<std::io::Error> for DiscoveryError {
    fn from(err: std::io::Error) -> Self {
        DiscoveryError::Io(err)
    }
}

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to the source directory
    pub relative: PathBuf,
}

impl SourceFile {
    /// Destination under `out_dir` at the same relative path.
    pub fn output_in(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(&self.relative)
    }
}

/// Include and exclude globs, relative to a base directory.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl FileSet {
    pub fn new(include: &[String]) -> Self {
        Self { include: include.to_vec(), exclude: vec![] }
    }

    /// Add exclude patterns.
    pub fn excluding(mut self, exclude: &[String]) -> Self {
        self.exclude.extend_from_slice(exclude);
        self
    }

    /// Find every regular file under `base_dir` matched by an include pattern
    /// and no exclude pattern, sorted by path.
    ///
    /// A missing `base_dir` yields an empty set.
    pub fn discover(&self, base_dir: &Path) -> Result<Vec<SourceFile>, DiscoveryError> {
        let excludes = compile_patterns(&self.exclude)?;
        let mut found = BTreeMap::new();

        for pattern in &self.include {
            for path in discover_files(base_dir, pattern)? {
                let Ok(relative) = path.strip_prefix(base_dir) else {
                    continue;
                };
                if matches_any(&excludes, relative) {
                    continue;
                }
                let relative = relative.to_path_buf();
                found.entry(relative.clone()).or_insert(SourceFile { path, relative });
            }
        }

        Ok(found.into_values().collect())
    }
}

/// Discover files matching one glob pattern (braces allowed) under `base_dir`.
///
/// # Returns
/// Matching regular files, sorted.
pub fn discover_files(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let base = Pattern::escape(&base_dir.to_string_lossy());
    let mut files = Vec::new();

    for expanded in expand_braces(pattern) {
        let full_pattern = format!("{}/{}", base.trim_end_matches('/'), expanded);
        let paths = glob::glob_with(&full_pattern, MATCH_OPTIONS)
            .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;

        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("error reading path: {}", e),
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Compile patterns (with braces expanded) for path matching.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, DiscoveryError> {
    let mut compiled = Vec::new();
    for pattern in patterns {
        for expanded in expand_braces(pattern) {
            compiled.push(
                Pattern::new(&expanded)
                    .map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?,
            );
        }
    }
    Ok(compiled)
}

/// Whether any pattern matches a relative path (`/`-separated).
pub fn matches_any(patterns: &[Pattern], relative: &Path) -> bool {
    let normalized = relative.to_string_lossy().replace('\\', "/");
    patterns.iter().any(|p| p.matches_with(&normalized, MATCH_OPTIONS))
}

/// Expand `{a,b}` alternations into plain glob patterns.
///
/// Nested groups are supported. Unbalanced braces are left as literal text.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = first_group(pattern) else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut expanded = Vec::new();
    for alternative in split_alternatives(&pattern[open + 1..close]) {
        let candidate = format!("{}{}{}", prefix, alternative, suffix);
        expanded.extend(expand_braces(&candidate));
    }
    expanded
}

/// Byte offsets of the first balanced `{...}` group.
fn first_group(pattern: &str) -> Option<(usize, usize)> {
    let open = pattern.find('{')?;
    let mut depth = 0usize;
    for (i, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + i));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split the inside of a group on top-level commas.
fn split_alternatives(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}
