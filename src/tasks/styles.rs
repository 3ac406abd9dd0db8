//! Stylesheet task: Sass → prefixed, minified CSS with a source map.
//!
//! `grass` compiles the entry point, `lightningcss` adds vendor prefixes for
//! the configured browsers and minifies. `grass` does not emit source maps,
//! so the map produced here points into the compiled CSS, which is embedded
//! as `sourcesContent` under the entry's name.

use crate::build::BuildContext;
use crate::config::{parse_browser_version, BrowserTargets};
use crate::server::LiveReload;
use crate::tasks::fs::write_atomic;
use crate::tasks::{TaskError, TaskOutput};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::{Path, PathBuf};

/// Minified stylesheet plus its optional source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCss {
    pub code: String,
    pub map: Option<String>,
}

pub fn run(ctx: &BuildContext, reload: Option<&LiveReload>) -> Result<TaskOutput, TaskError> {
    let config = &ctx.config().styles;
    let src_dir = ctx.src_dir();
    let entry = src_dir.join(&config.entry);

    if !entry.is_file() {
        return Ok(TaskOutput::skipped(format!("entry {} not found", entry.display())));
    }

    let load_paths: Vec<PathBuf> = config.load_paths.iter().map(|p| src_dir.join(p)).collect();
    let css = compile_sass(&entry, &load_paths)?;

    let dest = ctx.output_path(&config.output);
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "style.min.css".to_string());
    let map_name = format!("{}.map", file_name);

    let source_name = config.entry.to_string_lossy().replace('\\', "/");
    let compiled = minify_css(
        &css,
        &entry,
        &source_name,
        browser_targets(&config.browsers),
        config.source_map,
    )?;

    let mut outputs = vec![dest.clone()];
    match compiled.map {
        Some(map) => {
            let code = format!("{}\n/*# sourceMappingURL={} */\n", compiled.code, map_name);
            write_atomic(&dest, code.as_bytes())?;
            let map_path = dest.with_file_name(&map_name);
            write_atomic(&map_path, map.as_bytes())?;
            outputs.push(map_path);
        }
        None => write_atomic(&dest, compiled.code.as_bytes())?,
    }

    if let Some(reload) = reload {
        reload.css(&url_path(&config.output));
    }

    Ok(TaskOutput::new(outputs))
}

/// Compile a Sass entry point to expanded CSS.
pub fn compile_sass(entry: &Path, load_paths: &[PathBuf]) -> Result<String, TaskError> {
    let mut options = grass::Options::default().quiet(true);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }
    for path in load_paths {
        options = options.load_path(path);
    }

    grass::from_path(entry, &options)
        .map_err(|e| TaskError::Sass { path: entry.to_path_buf(), message: e.to_string() })
}

/// Prefix and minify CSS, optionally producing a source map.
pub fn minify_css(
    css: &str,
    path: &Path,
    source_name: &str,
    targets: Targets,
    with_map: bool,
) -> Result<CompiledCss, TaskError> {
    let css_error = |message: String| TaskError::Css { path: path.to_path_buf(), message };

    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions { filename: source_name.to_string(), ..ParserOptions::default() },
    )
    .map_err(|e| css_error(e.to_string()))?;

    stylesheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| css_error(e.to_string()))?;

    let mut source_map = SourceMap::new("/");
    if with_map {
        let index = source_map.add_source(source_name);
        source_map
            .set_source_content(index as usize, css)
            .map_err(|e| css_error(format!("{:?}", e)))?;
    }

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: if with_map { Some(&mut source_map) } else { None },
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| css_error(e.to_string()))?;

    let map = if with_map {
        Some(source_map.to_json(None).map_err(|e| css_error(format!("{:?}", e)))?)
    } else {
        None
    };

    Ok(CompiledCss { code: printed.code, map })
}

/// Convert configured browser versions to lightningcss targets.
pub fn browser_targets(config: &BrowserTargets) -> Targets {
    let version = |v: &Option<String>| v.as_deref().and_then(parse_browser_version);
    Targets::from(Browsers {
        android: version(&config.android),
        chrome: version(&config.chrome),
        edge: version(&config.edge),
        firefox: version(&config.firefox),
        ios_saf: version(&config.ios_saf),
        opera: version(&config.opera),
        safari: version(&config.safari),
        samsung: version(&config.samsung),
        ..Browsers::default()
    })
}

/// URL path of an output-relative file, e.g. `/css/style.min.css`.
fn url_path(relative: &Path) -> String {
    format!("/{}", relative.to_string_lossy().replace('\\', "/").trim_start_matches('/'))
}
