//! Still-image generators
//!
//! A generator turns a source file into an image the manipulation chain can
//! work on: images pass through (or are normalised to PNG), videos yield one
//! frame, PDFs one rasterised page.

mod command;
mod image;
mod pdf;
mod registry;
mod video;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use medialib_core::models::{Conversion, Media};
use medialib_core::GeneratorKind;

pub use self::command::binary_is_available;
pub use self::image::ImageGenerator;
pub use self::pdf::PdfGenerator;
pub use self::registry::ImageGeneratorRegistry;
pub use self::video::VideoGenerator;

/// Produces a representative still image for one family of source files.
#[async_trait]
pub trait StillImageGenerator: Send + Sync {
    fn kind(&self) -> GeneratorKind;

    /// Media type reported for files this generator recognises.
    fn media_type(&self) -> &'static str;

    fn supported_extensions(&self) -> &'static [&'static str];

    fn supported_mime_types(&self) -> &'static [&'static str];

    /// `false` when an external binary the generator shells out to is missing.
    fn requirements_are_installed(&self) -> bool;

    /// Path of a still image derived from `file`, possibly `file` itself.
    async fn convert(&self, file: &Path, conversion: Option<&Conversion>) -> anyhow::Result<PathBuf>;

    fn can_handle_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.supported_extensions().contains(&extension.as_str())
    }

    fn can_handle_mime(&self, mime_type: &str) -> bool {
        let mime_type = mime_type.to_lowercase();
        self.supported_mime_types().contains(&mime_type.as_str())
    }

    fn can_convert(&self, media: &Media) -> bool {
        if !self.requirements_are_installed() {
            return false;
        }
        if self.can_handle_extension(&media.extension()) {
            return true;
        }
        media
            .mime_type
            .as_deref()
            .map(|mime| self.can_handle_mime(mime))
            .unwrap_or(false)
    }
}

/// `file` with its extension replaced, in the same directory.
pub(crate) fn sibling_with_extension(file: &Path, extension: &str) -> PathBuf {
    file.with_extension(extension)
}
