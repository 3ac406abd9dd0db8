//! SVG task: strip non-rendering markup from standalone SVG files.
//!
//! Removed: comments, processing instructions and the XML declaration, the
//! doctype, `<metadata>` elements, elements and attributes in editor
//! namespaces, and whitespace-only text outside text content. Everything
//! else is written back unchanged.

use crate::build::{BuildContext, FileSet};
use crate::tasks::fs::{discover, read_to_string, write_atomic};
use crate::tasks::{TaskError, TaskOutput};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;

/// Namespace prefixes written by vector editors.
const EDITOR_PREFIXES: &[&[u8]] = &[b"inkscape", b"sodipodi", b"sketch", b"serif"];

/// Elements whose whitespace is rendered.
const TEXT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textPath"];

pub fn run(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let config = &ctx.config().svg;
    let files = discover(ctx, &FileSet::new(&config.patterns).excluding(&config.exclude))?;
    let out_dir = ctx.out_dir();

    let mut outputs = Vec::with_capacity(files.len());
    for file in &files {
        let optimized = optimize(&file.path, &read_to_string(&file.path)?)?;
        let dest = file.output_in(&out_dir);
        write_atomic(&dest, optimized.as_bytes())?;
        outputs.push(dest);
    }

    Ok(TaskOutput::new(outputs))
}

/// Optimize one SVG document.
pub fn optimize(path: &Path, source: &str) -> Result<String, TaskError> {
    let mut reader = Reader::from_str(source);
    let mut writer = Writer::new(Vec::with_capacity(source.len()));
    // Depth inside an element being dropped
    let mut skipping = 0usize;
    // One entry per open written element: whether its whitespace is kept
    let mut keep_space: Vec<bool> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| svg_error(path, e))?;
        match event {
            Event::Eof => break,
            Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) => {}
            Event::Start(e) => {
                if skipping > 0 || is_dropped_element(&e) {
                    skipping += 1;
                } else {
                    let inherited = keep_space.last().copied().unwrap_or(false);
                    keep_space.push(inherited || preserves_space(path, &e)?);
                    write(&mut writer, path, Event::Start(strip_attributes(path, &e)?))?;
                }
            }
            Event::Empty(e) => {
                if skipping == 0 && !is_dropped_element(&e) {
                    write(&mut writer, path, Event::Empty(strip_attributes(path, &e)?))?;
                }
            }
            Event::End(e) => {
                if skipping > 0 {
                    skipping -= 1;
                } else {
                    keep_space.pop();
                    write(&mut writer, path, Event::End(e))?;
                }
            }
            Event::Text(t) => {
                let kept = keep_space.last().copied().unwrap_or(false);
                if skipping == 0 && (kept || !t.iter().all(u8::is_ascii_whitespace)) {
                    write(&mut writer, path, Event::Text(t))?;
                }
            }
            other => {
                if skipping == 0 {
                    write(&mut writer, path, other)?;
                }
            }
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| svg_error(path, e))
}

fn is_dropped_element(e: &BytesStart<'_>) -> bool {
    let name = e.name();
    name.as_ref() == b"metadata"
        || name.prefix().is_some_and(|p| EDITOR_PREFIXES.contains(&p.as_ref()))
}

/// Text content elements and anything marked `xml:space="preserve"`.
fn preserves_space(path: &Path, e: &BytesStart<'_>) -> Result<bool, TaskError> {
    if TEXT_ELEMENTS.contains(&e.local_name().as_ref()) {
        return Ok(true);
    }
    let space = e.try_get_attribute("xml:space").map_err(|err| svg_error(path, err))?;
    Ok(space.is_some_and(|attr| attr.value.as_ref() == b"preserve"))
}

fn is_editor_attribute(key: &[u8]) -> bool {
    let (prefix, local) = match key.iter().position(|&b| b == b':') {
        Some(i) => (&key[..i], &key[i + 1..]),
        None => return false,
    };
    EDITOR_PREFIXES.contains(&prefix) || (prefix == b"xmlns" && EDITOR_PREFIXES.contains(&local))
}

/// Copy an element start, dropping editor attributes and namespace declarations.
fn strip_attributes(path: &Path, e: &BytesStart<'_>) -> Result<BytesStart<'static>, TaskError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut stripped = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|err| svg_error(path, err))?;
        if !is_editor_attribute(attr.key.as_ref()) {
            stripped.push_attribute(attr);
        }
    }
    Ok(stripped.into_owned())
}

fn write(writer: &mut Writer<Vec<u8>>, path: &Path, event: Event<'_>) -> Result<(), TaskError> {
    writer.write_event(event).map_err(|e| svg_error(path, e))
}

pub(crate) fn svg_error(path: &Path, err: impl std::fmt::Display) -> TaskError {
    TaskError::Svg { path: path.to_path_buf(), message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs;
    use tempfile::TempDir;

    const INKSCAPE: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!-- Created with Inkscape (http://www.inkscape.org/) -->
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg"
     xmlns:inkscape="http://www.inkscape.org/namespaces/inkscape"
     xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd"
     width="24" height="24" viewBox="0 0 24 24" inkscape:version="1.3">
  <sodipodi:namedview id="namedview1" pagecolor="#ffffff">
    <inkscape:grid type="xygrid"/>
  </sodipodi:namedview>
  <metadata>
    <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"><title>x</title></rdf:RDF>
  </metadata>
  <g inkscape:label="Layer 1" inkscape:groupmode="layer" id="layer1">
    <path d="M0 0h24v24H0z" fill="#ff0000"/>
    <text x="2" y="20">Hi &amp; bye</text>
  </g>
</svg>
"##;

    #[test]
    fn test_optimize_strips_non_rendering_markup() {
        let out = optimize(Path::new("logo.svg"), INKSCAPE).unwrap();

        assert!(out.starts_with("<svg"));
        assert!(!out.contains("<?xml"));
        assert!(!out.contains("<!--"));
        assert!(!out.contains("DOCTYPE"));
        assert!(!out.contains("metadata"));
        assert!(!out.contains("inkscape"));
        assert!(!out.contains("sodipodi"));
        assert!(!out.contains('\n'));
        assert!(out.contains(r#"viewBox="0 0 24 24""#));
        assert!(out.contains(r##"<path d="M0 0h24v24H0z" fill="#ff0000"/>"##));
        assert!(out.contains("Hi &amp; bye"));
        assert!(out.contains(r#"<g id="layer1">"#));
        assert!(out.len() < INKSCAPE.len());
    }

    #[test]
    fn test_optimize_is_stable() {
        let once = optimize(Path::new("a.svg"), INKSCAPE).unwrap();
        let twice = optimize(Path::new("a.svg"), &once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_optimize_malformed() {
        let err = optimize(Path::new("bad.svg"), "<svg><g></svg>").unwrap_err();
        assert!(matches!(err, TaskError::Svg { .. }));
        assert!(err.to_string().contains("bad.svg"));
    }

    #[test]
    fn test_optimize_keeps_space_between_text_spans() {
        let svg = "<svg>\n  <text x=\"0\" y=\"10\"><tspan>Hello</tspan> <tspan>world</tspan></text>\n</svg>";
        let out = optimize(Path::new("label.svg"), svg).unwrap();
        assert_eq!(
            out,
            r#"<svg><text x="0" y="10"><tspan>Hello</tspan> <tspan>world</tspan></text></svg>"#
        );
    }

    #[test]
    fn test_optimize_keeps_space_under_xml_space_preserve() {
        let svg = "<svg><g xml:space=\"preserve\"><desc>a</desc> <desc>b</desc></g>\n</svg>";
        let out = optimize(Path::new("pre.svg"), svg).unwrap();
        assert!(out.contains("</desc> <desc>"));
        assert!(out.ends_with("</g></svg>"));
    }

    #[test]
    fn test_is_editor_attribute() {
        assert!(is_editor_attribute(b"inkscape:label"));
        assert!(is_editor_attribute(b"xmlns:sodipodi"));
        assert!(!is_editor_attribute(b"xlink:href"));
        assert!(!is_editor_attribute(b"fill"));
    }

    #[test]
    fn test_svg_task_skips_icons_and_favicons() {
        let temp = TempDir::new().unwrap();
        let img = temp.path().join("source/img");
        for dir in ["icons", "favicons", "illustrations"] {
            fs::create_dir_all(img.join(dir)).unwrap();
        }
        let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\"><!-- c --><rect width=\"1\" height=\"1\"/></svg>";
        fs::write(img.join("logo.svg"), svg).unwrap();
        fs::write(img.join("illustrations/map.svg"), svg).unwrap();
        fs::write(img.join("icons/menu.svg"), svg).unwrap();
        fs::write(img.join("favicons/favicon.svg"), svg).unwrap();

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let output = run(&ctx).unwrap();

        assert_eq!(output.outputs.len(), 2);
        let written = fs::read_to_string(temp.path().join("build/img/logo.svg")).unwrap();
        assert!(!written.contains("<!--"));
        assert!(!temp.path().join("build/img/icons/menu.svg").exists());
    }
}
