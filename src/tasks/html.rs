//! HTML task: collapse whitespace in top-level pages.

use crate::build::{BuildContext, FileSet};
use crate::tasks::fs::{discover, read, write_atomic};
use crate::tasks::{TaskError, TaskOutput};
use minify_html::Cfg;

pub fn run(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let files = discover(ctx, &FileSet::new(&ctx.config().html.patterns))?;
    let out_dir = ctx.out_dir();
    let cfg = whitespace_only();

    let mut outputs = Vec::with_capacity(files.len());
    for file in &files {
        let minified = minify_html::minify(&read(&file.path)?, &cfg);
        let dest = file.output_in(&out_dir);
        write_atomic(&dest, &minified)?;
        outputs.push(dest);
    }

    Ok(TaskOutput::new(outputs))
}

/// Collapse whitespace while leaving markup structure, comments, inline
/// scripts and styles alone.
fn whitespace_only() -> Cfg {
    let mut cfg = Cfg::new();
    cfg.do_not_minify_doctype = true;
    cfg.keep_closing_tags = true;
    cfg.keep_comments = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_input_type_text_attr = true;
    cfg.keep_spaces_between_attributes = true;
    cfg.ensure_spec_compliant_unquoted_attribute_values = true;
    cfg.minify_css = false;
    cfg.minify_js = false;
    cfg
}
