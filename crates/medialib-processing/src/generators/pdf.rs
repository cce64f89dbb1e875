use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use medialib_core::models::Conversion;
use medialib_core::GeneratorKind;

use super::command::{binary_is_available, run};
use super::{sibling_with_extension, StillImageGenerator};

/// Rasterises one PDF page with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdfGenerator {
    pdftoppm_path: String,
}

impl PdfGenerator {
    pub fn new(pdftoppm_path: impl Into<String>) -> Self {
        Self {
            pdftoppm_path: pdftoppm_path.into(),
        }
    }
}

impl Default for PdfGenerator {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

#[async_trait]
impl StillImageGenerator for PdfGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Pdf
    }

    fn media_type(&self) -> &'static str {
        "pdf"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        &["application/pdf"]
    }

    fn requirements_are_installed(&self) -> bool {
        binary_is_available(&self.pdftoppm_path)
    }

    #[tracing::instrument(skip(self, conversion), fields(process.executable.name = "pdftoppm"))]
    async fn convert(&self, file: &Path, conversion: Option<&Conversion>) -> Result<PathBuf> {
        let page = conversion.map(Conversion::page_number).unwrap_or(1).max(1);
        let target = sibling_with_extension(file, "jpg");
        // pdftoppm appends the extension itself
        let prefix = sibling_with_extension(file, "");
        let prefix = prefix.to_string_lossy().trim_end_matches('.').to_string();

        run(
            &self.pdftoppm_path,
            &[
                "-jpeg".to_string(),
                "-f".to_string(),
                page.to_string(),
                "-l".to_string(),
                page.to_string(),
                "-singlefile".to_string(),
                file.to_string_lossy().to_string(),
                prefix,
            ],
        )
        .await?;

        if !target.is_file() {
            return Err(anyhow!("pdftoppm produced no image for page {} of {}", page, file.display()));
        }

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medialib_core::models::Media;

    #[test]
    fn recognises_pdf_by_mime() {
        let generator = PdfGenerator::default();
        assert!(generator.can_handle_mime("application/PDF"));
        assert!(generator.can_handle_extension("pdf"));

        if generator.requirements_are_installed() {
            let mut media = Media::new("default", "upload", "public", "public");
            media.mime_type = Some("application/pdf".to_string());
            assert!(generator.can_convert(&media));
        }
    }

    #[test]
    fn missing_binary_disables_generator() {
        let generator = PdfGenerator::new("/nonexistent/pdftoppm");
        let media = Media::new("default", "doc.pdf", "public", "public");
        assert!(!generator.can_convert(&media));
    }
}
