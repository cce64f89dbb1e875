//! Responsive image variants
//!
//! The generator only produces local files; storing them and recording them on
//! the media item is done by [`crate::FileManipulator`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use image::GenericImageView;
use medialib_core::models::{file_stem, Media};

use crate::image::ImageTransformer;

/// One generated variant on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsiveVariant {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ResponsiveImageGenerator: Send + Sync {
    /// Write variants of `image_file` into `output_dir`.
    ///
    /// Variant file names must follow [`responsive_file_name`] so they can be
    /// found again when the variants for `conversion_name` are replaced.
    async fn generate(
        &self,
        media: &Media,
        image_file: &Path,
        conversion_name: &str,
        output_dir: &Path,
    ) -> anyhow::Result<Vec<ResponsiveVariant>>;
}

/// `{stem}___{conversion}_{width}_{height}.{extension}`
pub fn responsive_file_name(
    media_file_name: &str,
    conversion_name: &str,
    width: u32,
    height: u32,
    extension: &str,
) -> String {
    format!(
        "{}___{}_{}_{}.{}",
        file_stem(media_file_name),
        conversion_name,
        width,
        height,
        extension
    )
}

/// Downscales by a fixed factor until the width drops below `min_width`.
#[derive(Debug, Clone, Copy)]
pub struct WidthStepResponsiveImageGenerator {
    min_width: u32,
    step: f64,
}

impl WidthStepResponsiveImageGenerator {
    pub fn new(min_width: u32, step: f64) -> Self {
        Self {
            min_width: min_width.max(1),
            step: step.clamp(0.1, 0.95),
        }
    }

    /// Widths to generate for an image `original_width` wide, largest first.
    pub fn widths(&self, original_width: u32) -> Vec<u32> {
        let mut widths = Vec::new();
        let mut width = original_width as f64;
        while width.round() as u32 >= self.min_width {
            let rounded = width.round() as u32;
            if widths.last() != Some(&rounded) {
                widths.push(rounded);
            }
            width *= self.step;
        }
        if widths.is_empty() && original_width > 0 {
            widths.push(original_width);
        }
        widths
    }
}

impl Default for WidthStepResponsiveImageGenerator {
    fn default() -> Self {
        Self::new(100, 0.7)
    }
}

#[async_trait]
impl ResponsiveImageGenerator for WidthStepResponsiveImageGenerator {
    async fn generate(
        &self,
        media: &Media,
        image_file: &Path,
        conversion_name: &str,
        output_dir: &Path,
    ) -> anyhow::Result<Vec<ResponsiveVariant>> {
        let generator = *self;
        let image_file = image_file.to_path_buf();
        let output_dir = output_dir.to_path_buf();
        let media_file_name = media.file_name.clone();
        let conversion_name = conversion_name.to_string();

        tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ResponsiveVariant>> {
            let img = image::open(&image_file)
                .with_context(|| format!("Failed to decode {}", image_file.display()))?;
            let format = ImageTransformer::format_for_path(&image_file).unwrap_or(image::ImageFormat::Jpeg);
            let extension = format.extensions_str().first().copied().unwrap_or("jpg");
            let (original_width, _) = img.dimensions();

            let mut variants = Vec::new();
            for width in generator.widths(original_width) {
                let resized = img.resize(width, u32::MAX, image::imageops::FilterType::Lanczos3);
                let (width, height) = resized.dimensions();
                let path = output_dir.join(responsive_file_name(
                    &media_file_name,
                    &conversion_name,
                    width,
                    height,
                    extension,
                ));
                std::fs::write(&path, ImageTransformer::encode(&resized, format, None)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                variants.push(ResponsiveVariant {
                    path,
                    width,
                    height,
                });
            }
            Ok(variants)
        })
        .await
        .context("Responsive image task panicked")?
    }
}
