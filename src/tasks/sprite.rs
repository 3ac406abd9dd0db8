//! Sprite task: bundle icon SVGs into one sheet of `<symbol>` elements.
//!
//! Each icon is optimized like a standalone SVG, then its root `<svg>`
//! becomes a `<symbol>` whose id is the sanitized file stem. Ids inside an
//! icon are prefixed with the symbol id, and `url(#..)` / `href="#.."`
//! references to them are rewritten. Symbol ids and prefixed inner ids share
//! one namespace, so no id appears twice in the sheet.

use crate::build::{BuildContext, FileSet};
use crate::tasks::fs::{discover, read_to_string, write_atomic};
use crate::tasks::svg::{optimize, svg_error};
use crate::tasks::{TaskError, TaskOutput};
use once_cell::sync::Lazy;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

static URL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(\s*(['"]?)#([^'")\s]+)(['"]?)\s*\)"#).unwrap());

pub fn run(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let config = &ctx.config().sprite;
    let files = discover(ctx, &FileSet::new(&config.patterns))?;
    if files.is_empty() {
        return Ok(TaskOutput::skipped("no icons found"));
    }

    let mut icons = Vec::with_capacity(files.len());
    for file in &files {
        let optimized = optimize(&file.path, &read_to_string(&file.path)?)?;
        icons.push((file.path.clone(), optimized));
    }

    let sprite = build_sprite(&icons)?;
    let dest = ctx.output_path(&config.output);
    write_atomic(&dest, sprite.as_bytes())?;
    tracing::debug!(icons = icons.len(), dest = %dest.display(), "wrote sprite");

    Ok(TaskOutput::new(vec![dest]))
}

/// Build a sprite document from `(path, svg source)` pairs, in order.
pub fn build_sprite(icons: &[(PathBuf, String)]) -> Result<String, TaskError> {
    let mut used = HashSet::new();
    // Symbol ids are claimed first so they stay equal to the file stems
    let symbol_ids: Vec<String> =
        icons.iter().map(|(path, _)| unique_id(symbol_id(path), &mut used)).collect();

    let mut symbols = Writer::new(Vec::new());
    let mut uses_xlink = false;

    for ((path, source), id) in icons.iter().zip(&symbol_ids) {
        let renamed = inner_ids(path, source, id, &mut used)?;
        uses_xlink |= source.contains("xlink:");
        append_symbol(&mut symbols, path, id, source, &renamed)?;
    }

    let mut root = BytesStart::new("svg");
    root.push_attribute(("xmlns", SVG_NS));
    if uses_xlink {
        root.push_attribute(("xmlns:xlink", XLINK_NS));
    }

    let sprite_path = Path::new("sprite.svg");
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(root)).map_err(|e| svg_error(sprite_path, e))?;
    writer.get_mut().extend_from_slice(&symbols.into_inner());
    writer.write_event(Event::End(BytesEnd::new("svg"))).map_err(|e| svg_error(sprite_path, e))?;

    String::from_utf8(writer.into_inner()).map_err(|e| svg_error(sprite_path, e))
}

/// Symbol id for an icon: its file stem with anything outside
/// `[A-Za-z0-9_-]` replaced by `-`.
pub fn symbol_id(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let id: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();

    match id.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => id,
        _ => format!("icon-{}", id),
    }
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    let mut id = base.clone();
    let mut n = 2;
    while used.contains(&id) {
        id = format!("{}-{}", base, n);
        n += 1;
    }
    used.insert(id.clone());
    id
}

/// Root attributes that only make sense on a standalone document.
fn is_root_only(key: &[u8]) -> bool {
    matches!(key, b"xmlns" | b"xmlns:xlink" | b"width" | b"height" | b"x" | b"y" | b"version" | b"id")
}

/// New names for the ids defined inside an icon: `<symbol>-<id>`, made
/// unique against every id already in the sheet.
fn inner_ids(
    path: &Path,
    source: &str,
    symbol: &str,
    used: &mut HashSet<String>,
) -> Result<HashMap<String, String>, TaskError> {
    let mut renamed = HashMap::new();
    for id in collect_ids(path, source)? {
        if !renamed.contains_key(&id) {
            let new_id = unique_id(format!("{}-{}", symbol, id), used);
            renamed.insert(id, new_id);
        }
    }
    Ok(renamed)
}

fn append_symbol(
    writer: &mut Writer<Vec<u8>>,
    path: &Path,
    id: &str,
    source: &str,
    ids: &HashMap<String, String>,
) -> Result<(), TaskError> {
    let mut reader = Reader::from_str(source);
    let mut depth = 0usize;
    let mut symbol_written = false;
    let mut write = |event: Event<'_>| writer.write_event(event).map_err(|e| svg_error(path, e));

    loop {
        match reader.read_event().map_err(|e| svg_error(path, e))? {
            Event::Eof => break,
            Event::Start(e) if depth == 0 => {
                write(Event::Start(symbol_start(path, &e, id, ids)?))?;
                symbol_written = true;
                depth = 1;
            }
            Event::Empty(e) if depth == 0 => {
                write(Event::Empty(symbol_start(path, &e, id, ids)?))?;
                symbol_written = true;
                break;
            }
            Event::Start(e) => {
                write(Event::Start(rewrite_element(path, &e, ids)?))?;
                depth += 1;
            }
            Event::Empty(e) => write(Event::Empty(rewrite_element(path, &e, ids)?))?,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 {
                    write(Event::End(BytesEnd::new("symbol")))?;
                    break;
                }
                write(Event::End(e))?;
            }
            Event::Text(t) if depth > 0 => {
                let text = rewrite_urls(&String::from_utf8_lossy(&t), ids);
                write(Event::Text(BytesText::from_escaped(text)))?;
            }
            other if depth > 0 => write(other)?,
            _ => {}
        }
    }

    match depth {
        0 if symbol_written => Ok(()),
        0 => Err(svg_error(path, "no root element")),
        _ => Err(svg_error(path, "unexpected end of document")),
    }
}

/// The icon's root `<svg>` turned into `<symbol id=..>`.
fn symbol_start(
    path: &Path,
    root: &BytesStart<'_>,
    id: &str,
    ids: &HashMap<String, String>,
) -> Result<BytesStart<'static>, TaskError> {
    if root.name().as_ref() != b"svg" {
        return Err(svg_error(path, "root element is not <svg>"));
    }

    let mut symbol = BytesStart::new("symbol");
    symbol.push_attribute(("id", id));
    for attr in root.attributes() {
        let attr = attr.map_err(|e| svg_error(path, e))?;
        if !is_root_only(attr.key.as_ref()) {
            let value = rewrite_urls(&String::from_utf8_lossy(&attr.value), ids);
            symbol.push_attribute(Attribute { key: attr.key, value: Cow::Owned(value.into_bytes()) });
        }
    }
    Ok(symbol.into_owned())
}

fn rewrite_element(
    path: &Path,
    e: &BytesStart<'_>,
    ids: &HashMap<String, String>,
) -> Result<BytesStart<'static>, TaskError> {
    let mut rewritten = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| svg_error(path, err))?;
        let value = String::from_utf8_lossy(&attr.value);
        let local = value.strip_prefix('#').and_then(|target| ids.get(target));
        let value = match (attr.key.as_ref(), local) {
            (b"id", _) => ids.get(&*value).cloned().unwrap_or_else(|| value.into_owned()),
            (b"href" | b"xlink:href", Some(target)) => format!("#{}", target),
            _ => rewrite_urls(&value, ids),
        };
        rewritten.push_attribute(Attribute { key: attr.key, value: Cow::Owned(value.into_bytes()) });
    }
    Ok(rewritten.into_owned())
}

/// Point `url(#id)` references at the renamed ids of the same icon.
fn rewrite_urls(value: &str, ids: &HashMap<String, String>) -> String {
    URL_REF
        .replace_all(value, |caps: &Captures<'_>| match ids.get(&caps[2]) {
            Some(target) => format!("url({}#{}{})", &caps[1], target, &caps[3]),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Every `id` attribute value below the root, in document order.
fn collect_ids(path: &Path, source: &str) -> Result<Vec<String>, TaskError> {
    let mut reader = Reader::from_str(source);
    let mut ids = Vec::new();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| svg_error(path, e))?;
        let element = match &event {
            Event::Eof => break,
            Event::Start(e) => {
                depth += 1;
                e
            }
            Event::Empty(e) => e,
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                continue;
            }
            _ => continue,
        };
        // The root id is replaced by the symbol id
        let is_root = match event {
            Event::Start(_) => depth == 1,
            _ => depth == 0,
        };
        if is_root {
            continue;
        }
        for attr in element.attributes() {
            let attr = attr.map_err(|e| svg_error(path, e))?;
            if attr.key.as_ref() == b"id" {
                let id = String::from_utf8_lossy(&attr.value).into_owned();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use std::fs;
    use tempfile::TempDir;

    const MENU: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24" id="root"><defs><clipPath id="clip"><rect width="24" height="24"/></clipPath></defs><g clip-path="url(#clip)"><path d="M3 6h18"/></g></svg>"##;
    const CLOSE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" viewBox="0 0 16 16"><defs><path id="clip" d="M0 0l16 16"/></defs><use xlink:href="#clip"/><use href="#elsewhere"/></svg>"##;

    fn icons() -> Vec<(PathBuf, String)> {
        vec![
            (PathBuf::from("img/icons/menu.svg"), MENU.to_string()),
            (PathBuf::from("img/icons/close.svg"), CLOSE.to_string()),
        ]
    }

    /// Element names and id values, checking the document is well formed.
    fn parse(doc: &str) -> (Vec<String>, Vec<String>) {
        let mut reader = Reader::from_str(doc);
        let (mut names, mut ids) = (vec![], vec![]);
        loop {
            match reader.read_event().unwrap() {
                Event::Eof => break,
                Event::Start(e) | Event::Empty(e) => {
                    names.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                    for attr in e.attributes() {
                        let attr = attr.unwrap();
                        if attr.key.as_ref() == b"id" {
                            ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                }
                _ => {}
            }
        }
        (names, ids)
    }

    #[test]
    fn test_sprite_one_symbol_per_icon_with_unique_ids() {
        let sprite = build_sprite(&icons()).unwrap();
        let (names, ids) = parse(&sprite);

        assert_eq!(names[0], "svg");
        assert_eq!(names.iter().filter(|n| *n == "symbol").count(), 2);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len(), "duplicate ids in {}", sprite);
        assert!(ids.contains(&"menu".to_string()));
        assert!(ids.contains(&"close".to_string()));
    }

    #[test]
    fn test_sprite_rewrites_local_references() {
        let sprite = build_sprite(&icons()).unwrap();

        assert!(sprite.contains(r#"clip-path="url(#menu-clip)""#));
        assert!(sprite.contains(r##"xlink:href="#close-clip""##));
        assert!(sprite.contains(r##"href="#elsewhere""##));
        assert!(sprite.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#));
    }

    #[test]
    fn test_symbol_keeps_view_box_only() {
        let sprite = build_sprite(&icons()[..1]).unwrap();

        assert!(sprite.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg"><symbol id="menu" viewBox="0 0 24 24">"#));
        assert!(!sprite.contains("xmlns:xlink"));
        assert!(!sprite.contains(r#"id="root""#));
        assert!(sprite.ends_with("</symbol></svg>"));
    }

    #[test]
    fn test_symbol_ids_are_sanitized_and_deduplicated() {
        let svg = "<svg viewBox=\"0 0 1 1\"/>".to_string();
        let sprite = build_sprite(&[
            (PathBuf::from("a b.svg"), svg.clone()),
            (PathBuf::from("a-b.svg"), svg.clone()),
            (PathBuf::from("2x.svg"), svg),
        ])
        .unwrap();
        let (_, ids) = parse(&sprite);
        assert_eq!(ids, vec!["a-b", "a-b-2", "icon-2x"]);
    }

    #[test]
    fn test_inner_id_never_shadows_another_symbol() {
        let sprite = build_sprite(&[
            (PathBuf::from("img/icons/menu.svg"), MENU.to_string()),
            (PathBuf::from("img/icons/menu-clip.svg"), "<svg viewBox=\"0 0 1 1\"/>".to_string()),
        ])
        .unwrap();
        let (_, ids) = parse(&sprite);

        assert_eq!(ids, vec!["menu", "menu-clip-2", "menu-clip"]);
        assert!(sprite.contains(r#"clip-path="url(#menu-clip-2)""#));
    }

    #[test]
    fn test_sprite_rejects_empty_icon() {
        let err = build_sprite(&[
            (PathBuf::from("menu.svg"), MENU.to_string()),
            (PathBuf::from("blank.svg"), " \n".to_string()),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("blank.svg"));
        assert!(err.to_string().contains("no root element"));
    }

    #[test]
    fn test_sprite_rejects_non_svg_root() {
        let err = build_sprite(&[(PathBuf::from("bad.svg"), "<html/>".to_string())]).unwrap_err();
        assert!(err.to_string().contains("bad.svg"));
    }

    #[test]
    fn test_sprite_task_writes_single_file() {
        let temp = TempDir::new().unwrap();
        let icons_dir = temp.path().join("source/img/icons");
        fs::create_dir_all(&icons_dir).unwrap();
        fs::write(icons_dir.join("menu.svg"), format!("<?xml version=\"1.0\"?>\n<!-- menu -->\n{}", MENU))
            .unwrap();
        fs::write(icons_dir.join("close.svg"), CLOSE).unwrap();

        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let output = run(&ctx).unwrap();

        let dest = temp.path().join("build/img/sprite.svg");
        assert_eq!(output.outputs, vec![dest.clone()]);
        let sprite = fs::read_to_string(dest).unwrap();
        assert!(!sprite.contains("<!--"));
        assert_eq!(parse(&sprite).0.iter().filter(|n| *n == "symbol").count(), 2);
    }

    #[test]
    fn test_sprite_task_without_icons() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        let output = run(&ctx).unwrap();
        assert!(output.skipped);
        assert!(!temp.path().join("build/img/sprite.svg").exists());
    }
}
