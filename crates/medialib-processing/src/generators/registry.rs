use std::sync::Arc;

use medialib_core::constants::MEDIA_TYPE_OTHER;
use medialib_core::models::Media;
use medialib_core::{GeneratorKind, MediaLibraryConfig};

use super::{ImageGenerator, PdfGenerator, StillImageGenerator, VideoGenerator};

/// The configured generators, in configuration order.
#[derive(Clone, Default)]
pub struct ImageGeneratorRegistry {
    generators: Vec<Arc<dyn StillImageGenerator>>,
}

impl ImageGeneratorRegistry {
    pub fn new(generators: Vec<Arc<dyn StillImageGenerator>>) -> Self {
        Self { generators }
    }

    /// Build one generator per configured kind; duplicates are ignored.
    pub fn from_config(config: &MediaLibraryConfig) -> Self {
        let mut registry = Self::default();
        for kind in &config.generators {
            if registry.get(*kind).is_some() {
                continue;
            }
            let generator: Arc<dyn StillImageGenerator> = match kind {
                GeneratorKind::Image => Arc::new(ImageGenerator::new()),
                GeneratorKind::Video => Arc::new(VideoGenerator::new(
                    config.ffmpeg_path.clone(),
                    config.ffprobe_path.clone(),
                )),
                GeneratorKind::Pdf => Arc::new(PdfGenerator::new(config.pdftoppm_path.clone())),
            };
            tracing::debug!(
                generator = %kind,
                installed = generator.requirements_are_installed(),
                "Image generator registered"
            );
            registry.generators.push(generator);
        }
        registry
    }

    pub fn get(&self, kind: GeneratorKind) -> Option<Arc<dyn StillImageGenerator>> {
        self.generators
            .iter()
            .find(|generator| generator.kind() == kind)
            .cloned()
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn StillImageGenerator>> {
        self.generators
            .iter()
            .find(|generator| generator.can_handle_extension(extension))
            .cloned()
    }

    pub fn for_mime_type(&self, mime_type: &str) -> Option<Arc<dyn StillImageGenerator>> {
        self.generators
            .iter()
            .find(|generator| generator.can_handle_mime(mime_type))
            .cloned()
    }

    /// First generator that can convert `media` right now.
    pub fn for_media(&self, media: &Media) -> Option<Arc<dyn StillImageGenerator>> {
        self.generators
            .iter()
            .find(|generator| generator.can_convert(media))
            .cloned()
    }

    /// `image`, `video`, `pdf`, or `other`: by extension first, then by mime type.
    pub fn media_type(&self, media: &Media) -> &'static str {
        self.for_extension(&media.extension())
            .or_else(|| {
                media
                    .mime_type
                    .as_deref()
                    .and_then(|mime| self.for_mime_type(mime))
            })
            .map(|generator| generator.media_type())
            .unwrap_or(MEDIA_TYPE_OTHER)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl std::fmt::Debug for ImageGeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<GeneratorKind> = self.generators.iter().map(|g| g.kind()).collect();
        f.debug_struct("ImageGeneratorRegistry")
            .field("generators", &kinds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(file_name: &str, mime_type: Option<&str>) -> Media {
        let mut media = Media::new("default", file_name, "public", "public");
        media.mime_type = mime_type.map(str::to_string);
        media
    }

    #[test]
    fn builds_configured_kinds_once() {
        let config = MediaLibraryConfig {
            generators: vec![GeneratorKind::Image, GeneratorKind::Pdf, GeneratorKind::Image],
            ..MediaLibraryConfig::default()
        };
        let registry = ImageGeneratorRegistry::from_config(&config);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(GeneratorKind::Video).is_none());
    }

    #[test]
    fn media_type_prefers_extension_then_mime() {
        let registry = ImageGeneratorRegistry::from_config(&MediaLibraryConfig::default());

        assert_eq!(registry.media_type(&media("a.png", Some("application/pdf"))), "image");
        assert_eq!(registry.media_type(&media("upload", Some("application/pdf"))), "pdf");
        assert_eq!(registry.media_type(&media("clip.MOV", None)), "video");
        assert_eq!(registry.media_type(&media("notes.txt", Some("text/plain"))), "other");
    }

    #[test]
    fn unsupported_media_has_no_generator() {
        let registry = ImageGeneratorRegistry::from_config(&MediaLibraryConfig::default());
        assert!(registry.for_media(&media("notes.txt", Some("text/plain"))).is_none());
        assert_eq!(
            registry.for_media(&media("a.jpg", None)).map(|g| g.kind()),
            Some(GeneratorKind::Image)
        );
    }
}
