//! Raster image tasks.
//!
//! Three policies share one input set (`images.patterns` minus
//! `images.exclude`): recompress everything, copy everything, or recompress
//! only what changed since the last run. Files are processed in parallel.

use crate::build::{BuildContext, FileSet, SourceFile};
use crate::config::ImagesConfig;
use crate::tasks::fs::{copy_file, discover, read, write_atomic};
use crate::tasks::{TaskError, TaskOutput};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageFormat};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// The raster input set shared by the image tasks and WebP conversion.
pub fn raster_set(config: &ImagesConfig) -> FileSet {
    FileSet::new(&config.patterns).excluding(&config.exclude)
}

/// Recompress every image; an output is never larger than its source.
pub fn optimize(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let files = discover(ctx, &raster_set(&ctx.config().images))?;
    Ok(TaskOutput::new(recompress_all(ctx, &files)?))
}

/// Copy every image unchanged.
pub fn copy(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let files = discover(ctx, &raster_set(&ctx.config().images))?;
    let out_dir = ctx.out_dir();

    let outputs = files
        .par_iter()
        .map(|file| {
            let dest = file.output_in(&out_dir);
            copy_file(&file.path, &dest)?;
            Ok(dest)
        })
        .collect::<Result<Vec<_>, TaskError>>()?;

    Ok(TaskOutput::new(outputs))
}

/// Recompress only images whose output is missing or older than the source.
pub fn changed(ctx: &BuildContext) -> Result<TaskOutput, TaskError> {
    let files = discover(ctx, &raster_set(&ctx.config().images))?;
    let out_dir = ctx.out_dir();

    let stale: Vec<SourceFile> =
        files.iter().filter(|f| is_stale(&f.path, &f.output_in(&out_dir))).cloned().collect();

    if stale.is_empty() && !files.is_empty() {
        return Ok(TaskOutput::skipped(format!("{} images up to date", files.len())));
    }

    tracing::debug!(stale = stale.len(), total = files.len(), "recompressing changed images");
    Ok(TaskOutput::new(recompress_all(ctx, &stale)?))
}

fn recompress_all(ctx: &BuildContext, files: &[SourceFile]) -> Result<Vec<PathBuf>, TaskError> {
    let config = &ctx.config().images;
    let out_dir = ctx.out_dir();

    files
        .par_iter()
        .map(|file| {
            let bytes = read(&file.path)?;
            let optimized = recompress(&file.path, &bytes, config.jpeg_quality, config.png_level)?;
            let dest = file.output_in(&out_dir);
            write_atomic(&dest, &optimized)?;
            Ok(dest)
        })
        .collect()
}

/// Whether `dest` is missing or older than `src`.
pub fn is_stale(src: &Path, dest: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified());
    match (modified(src), modified(dest)) {
        (Ok(src_time), Ok(dest_time)) => src_time > dest_time,
        _ => true,
    }
}

/// Recompress PNG or JPEG bytes, keeping the original when that is smaller.
///
/// Other formats are returned unchanged.
pub fn recompress(
    path: &Path,
    bytes: &[u8],
    jpeg_quality: u8,
    png_level: u8,
) -> Result<Vec<u8>, TaskError> {
    let optimized = match ImageFormat::from_path(path) {
        Ok(ImageFormat::Png) => optimize_png(path, bytes, png_level)?,
        Ok(ImageFormat::Jpeg) => optimize_jpeg(path, bytes, jpeg_quality)?,
        _ => return Ok(bytes.to_vec()),
    };

    if optimized.len() < bytes.len() {
        Ok(optimized)
    } else {
        Ok(bytes.to_vec())
    }
}

fn optimize_png(path: &Path, bytes: &[u8], level: u8) -> Result<Vec<u8>, TaskError> {
    oxipng::optimize_from_memory(bytes, &oxipng::Options::from_preset(level))
        .map_err(|e| image_error(path, e))
}

fn optimize_jpeg(path: &Path, bytes: &[u8], quality: u8) -> Result<Vec<u8>, TaskError> {
    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| image_error(path, e))?;
    let rgb = decoded.to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| image_error(path, e))?;
    Ok(out)
}

pub(crate) fn image_error(path: &Path, err: impl std::fmt::Display) -> TaskError {
    TaskError::Image { path: path.to_path_buf(), message: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::fs;
    use std::io::Cursor;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(96, 64, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, ((x + y) % 256) as u8]))
    }

    fn png_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbImage::from_pixel(64, 64, Rgb([200, 30, 30]))
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn jpeg_bytes() -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        gradient().write_to(&mut out, ImageOutputFormat::Jpeg(100)).unwrap();
        out.into_inner()
    }

    fn site() -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        let img = temp.path().join("source/img");
        fs::create_dir_all(img.join("photos")).unwrap();
        fs::create_dir_all(img.join("favicons")).unwrap();
        fs::write(img.join("logo.png"), png_bytes()).unwrap();
        fs::write(img.join("photos/beach.jpg"), jpeg_bytes()).unwrap();
        fs::write(img.join("favicons/icon-32.png"), png_bytes()).unwrap();
        let ctx = BuildContext::new(default_config(), temp.path().to_path_buf());
        (temp, ctx)
    }

    #[test]
    fn test_optimize_never_grows_and_keeps_paths() {
        let (temp, ctx) = site();
        let output = optimize(&ctx).unwrap();
        assert_eq!(output.outputs.len(), 2);

        for relative in ["img/logo.png", "img/photos/beach.jpg"] {
            let src = fs::metadata(temp.path().join("source").join(relative)).unwrap().len();
            let out = fs::metadata(temp.path().join("build").join(relative)).unwrap().len();
            assert!(out <= src, "{} grew from {} to {}", relative, src, out);
        }
        assert!(!temp.path().join("build/img/favicons/icon-32.png").exists());
    }

    #[test]
    fn test_optimize_output_still_decodes() {
        let (temp, ctx) = site();
        optimize(&ctx).unwrap();
        let png = image::open(temp.path().join("build/img/logo.png")).unwrap();
        assert_eq!((png.width(), png.height()), (64, 64));
        let jpg = image::open(temp.path().join("build/img/photos/beach.jpg")).unwrap();
        assert_eq!((jpg.width(), jpg.height()), (96, 64));
    }

    #[test]
    fn test_recompress_keeps_smaller_original() {
        let once = recompress(Path::new("a.png"), &png_bytes(), 75, 2).unwrap();
        let twice = recompress(Path::new("a.png"), &once, 75, 6).unwrap();
        assert!(twice.len() <= once.len());
    }

    #[test]
    fn test_recompress_corrupt_png_is_an_error() {
        let err = recompress(Path::new("broken.png"), b"not a png", 75, 2).unwrap_err();
        assert!(matches!(err, TaskError::Image { .. }));
        assert!(err.to_string().contains("broken.png"));
    }

    #[test]
    fn test_copy_is_byte_identical() {
        let (temp, ctx) = site();
        copy(&ctx).unwrap();
        assert_eq!(
            fs::read(temp.path().join("build/img/photos/beach.jpg")).unwrap(),
            jpeg_bytes()
        );
    }

    #[test]
    fn test_changed_only_touches_stale_images() {
        let (temp, ctx) = site();
        assert_eq!(changed(&ctx).unwrap().outputs.len(), 2);

        let second = changed(&ctx).unwrap();
        assert!(second.skipped);

        let src = temp.path().join("source/img/logo.png");
        let future = SystemTime::now() + Duration::from_secs(60);
        fs::File::options().write(true).open(&src).unwrap().set_modified(future).unwrap();

        let third = changed(&ctx).unwrap();
        assert_eq!(third.outputs, vec![temp.path().join("build/img/logo.png")]);
    }

    #[test]
    fn test_is_stale_missing_output() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.png");
        fs::write(&src, b"x").unwrap();
        assert!(is_stale(&src, &temp.path().join("missing.png")));
    }
}
