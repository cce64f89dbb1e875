use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use medialib_core::models::Conversion;
use medialib_core::GeneratorKind;

use super::{sibling_with_extension, StillImageGenerator};

/// Formats the manipulation engine reads directly.
const PASSTHROUGH_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

const MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/pjpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/x-ms-bmp",
    "image/tiff",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageGenerator;

impl ImageGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StillImageGenerator for ImageGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Image
    }

    fn media_type(&self) -> &'static str {
        "image"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        MIME_TYPES
    }

    fn requirements_are_installed(&self) -> bool {
        true
    }

    async fn convert(&self, file: &Path, _conversion: Option<&Conversion>) -> anyhow::Result<PathBuf> {
        let extension = file
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_lowercase();

        if PASSTHROUGH_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(file.to_path_buf());
        }

        let source = file.to_path_buf();
        let target = sibling_with_extension(file, "png");
        let output = target.clone();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let img = image::open(&source)
                .with_context(|| format!("Failed to decode {}", source.display()))?;
            img.save_with_format(&output, image::ImageFormat::Png)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            Ok(())
        })
        .await
        .context("Image normalisation task panicked")??;

        tracing::debug!(source = %file.display(), target = %target.display(), "Normalised image to PNG");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{Rgb, RgbImage};
    use medialib_core::models::Media;
    use tempfile::tempdir;

    #[tokio::test]
    async fn native_formats_pass_through() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("photo.jpg");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&file).unwrap();

        let result = ImageGenerator.convert(&file, None).await.unwrap();
        assert_eq!(result, file);
    }

    #[tokio::test]
    async fn bmp_is_normalised_to_png() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("scan.bmp");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&file).unwrap();

        let result = ImageGenerator.convert(&file, None).await.unwrap();
        assert_eq!(result, dir.path().join("scan.png"));
        assert_eq!(::image::open(&result).unwrap().width(), 4);
    }

    #[test]
    fn recognises_by_extension_or_mime() {
        let by_extension = Media::new("default", "a.JPEG", "public", "public");
        assert!(ImageGenerator.can_convert(&by_extension));

        let mut by_mime = Media::new("default", "upload", "public", "public");
        by_mime.mime_type = Some("image/png".to_string());
        assert!(ImageGenerator.can_convert(&by_mime));

        let other = Media::new("default", "notes.txt", "public", "public");
        assert!(!ImageGenerator.can_convert(&other));
    }
}
