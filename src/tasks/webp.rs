//! WebP task: one `.webp` rendition next to each raster output.

use crate::build::BuildContext;
use crate::config::WebpConfig;
use crate::tasks::fs::{discover, output_paths, read, with_suffix, write_atomic};
use crate::tasks::images::{image_error, raster_set};
use crate::tasks::{TaskError, TaskOutput};
use rayon::prelude::*;
use std::path::Path;

pub fn run(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let files = discover(ctx, &raster_set(&ctx.config().images))?;
    let config = &ctx.config().webp;
    let out_dir = ctx.out_dir();

    // `hero.png` and `hero.jpg` would share `hero.webp`
    let dests = output_paths(&files, &out_dir, |relative| with_suffix(relative, ".webp"))?;

    let outputs = files
        .par_iter()
        .zip(dests)
        .map(|(file, dest)| {
            let encoded = encode(&file.path, &read(&file.path)?, config)?;
            write_atomic(&dest, &encoded)?;
            Ok(dest)
        })
        .collect::<Result<Vec<_>, TaskError>>()?;

    Ok(TaskOutput::new(outputs))
}

/// Decode any raster format `image` understands and encode it as WebP.
pub fn encode(path: &Path, bytes: &[u8], config: &WebpConfig) -> Result<Vec<u8>, TaskError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| image_error(path, e))?;
    let rgba = decoded.to_rgba8();

    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
    let memory = encoder
        .encode_simple(config.lossless, config.quality)
        .map_err(|e| image_error(path, format!("WebP encoding failed: {:?}", e)))?;
    Ok(memory.to_vec())
}
