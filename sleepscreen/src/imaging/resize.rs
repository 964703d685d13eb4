//! Letterboxed resize to the Paper Pro portrait resolution

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb, RgbImage};
use tracing::debug;

use crate::errors::ManagerError;
use crate::filesys::dir::Dir;
use crate::utils::unique_file_name;

/// Display width in portrait orientation
pub const TARGET_WIDTH: u32 = 1620;

/// Display height in portrait orientation
pub const TARGET_HEIGHT: u32 = 2160;

/// Produces a PNG at the device resolution from an arbitrary source image
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Returns the path of the newly written PNG; the source is left untouched
    async fn resize_to_target(&self, source: &Path) -> Result<PathBuf, ManagerError>;
}

/// Scales the source to fit 1620×2160, centred on a white canvas
#[derive(Debug, Clone)]
pub struct PaperProResizer {
    output_dir: Dir,
}

impl PaperProResizer {
    pub fn new(output_dir: Dir) -> Self {
        Self { output_dir }
    }
}

impl Default for PaperProResizer {
    fn default() -> Self {
        Self::new(Dir::scratch())
    }
}

/// Size and offset of a `src_w`×`src_h` image fitted inside the target
/// without cropping: `(width, height, x, y)`
pub fn fit_within(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> (u32, u32, u32, u32) {
    let ratio = f64::min(
        target_w as f64 / src_w.max(1) as f64,
        target_h as f64 / src_h.max(1) as f64,
    );
    let w = ((src_w as f64 * ratio) as u32).clamp(1, target_w);
    let h = ((src_h as f64 * ratio) as u32).clamp(1, target_h);
    (w, h, (target_w - w) / 2, (target_h - h) / 2)
}

fn render(source: &Path, dest: &Path) -> Result<(), ManagerError> {
    let src = image::open(source)?;
    let (w, h, x, y) = fit_within(src.width(), src.height(), TARGET_WIDTH, TARGET_HEIGHT);

    let scaled = src.resize_exact(w, h, FilterType::CatmullRom).to_rgb8();
    let mut canvas = RgbImage::from_pixel(TARGET_WIDTH, TARGET_HEIGHT, Rgb([255, 255, 255]));
    imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);

    canvas.save_with_format(dest, ImageFormat::Png)?;
    Ok(())
}

#[async_trait]
impl ImagePipeline for PaperProResizer {
    async fn resize_to_target(&self, source: &Path) -> Result<PathBuf, ManagerError> {
        self.output_dir.create().await?;

        let dest = self
            .output_dir
            .path()
            .join(unique_file_name("rm_suspended", "png"));
        let source = source.to_path_buf();
        let target = dest.clone();

        tokio::task::spawn_blocking(move || render(&source, &target)).await??;

        debug!("Resized image written to {}", dest.display());
        Ok(dest)
    }
}
