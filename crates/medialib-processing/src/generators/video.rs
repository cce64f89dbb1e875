use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use medialib_core::models::Conversion;
use medialib_core::GeneratorKind;

use super::command::{binary_is_available, run};
use super::{sibling_with_extension, StillImageGenerator};

const EXTENSIONS: &[&str] = &["webm", "mov", "mp4", "m4v", "avi", "mkv", "mpeg", "mpg", "wmv", "3gp"];

const MIME_TYPES: &[&str] = &[
    "video/webm",
    "video/mpeg",
    "video/mp4",
    "video/quicktime",
    "video/avi",
    "video/x-msvideo",
    "video/x-matroska",
    "video/x-ms-wmv",
    "video/3gpp",
];

/// Extracts one frame with ffmpeg.
#[derive(Debug, Clone)]
pub struct VideoGenerator {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl VideoGenerator {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Duration in seconds as reported by ffprobe.
    pub async fn probe_duration(&self, file: &Path) -> Result<f64> {
        let stdout = run(
            &self.ffprobe_path,
            &[
                "-v".to_string(),
                "error".to_string(),
                "-show_entries".to_string(),
                "format=duration".to_string(),
                "-of".to_string(),
                "default=noprint_wrappers=1:nokey=1".to_string(),
                file.to_string_lossy().to_string(),
            ],
        )
        .await?;

        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse::<f64>()
            .map_err(|e| anyhow!("Unexpected ffprobe duration `{}`: {}", text.trim(), e))
    }

    /// Requested second, or 0 when it lies beyond the end of the video.
    async fn seek_second(&self, file: &Path, requested: f64) -> f64 {
        if requested <= 0.0 {
            return 0.0;
        }
        match self.probe_duration(file).await {
            Ok(duration) if requested > duration => {
                tracing::debug!(
                    requested_second = requested,
                    duration = duration,
                    "Frame second beyond video duration, using first frame"
                );
                0.0
            }
            Ok(_) => requested,
            Err(e) => {
                tracing::warn!(error = %e, "Could not probe video duration");
                requested
            }
        }
    }
}

impl Default for VideoGenerator {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl StillImageGenerator for VideoGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Video
    }

    fn media_type(&self) -> &'static str {
        "video"
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn supported_mime_types(&self) -> &'static [&'static str] {
        MIME_TYPES
    }

    fn requirements_are_installed(&self) -> bool {
        binary_is_available(&self.ffmpeg_path) && binary_is_available(&self.ffprobe_path)
    }

    #[tracing::instrument(skip(self, conversion), fields(process.executable.name = "ffmpeg"))]
    async fn convert(&self, file: &Path, conversion: Option<&Conversion>) -> Result<PathBuf> {
        let requested = conversion.map(Conversion::video_frame_second).unwrap_or(0.0);
        let second = self.seek_second(file, requested).await;
        let target = sibling_with_extension(file, "jpg");

        run(
            &self.ffmpeg_path,
            &[
                "-y".to_string(),
                "-ss".to_string(),
                format!("{:.3}", second),
                "-i".to_string(),
                file.to_string_lossy().to_string(),
                "-frames:v".to_string(),
                "1".to_string(),
                "-q:v".to_string(),
                "2".to_string(),
                target.to_string_lossy().to_string(),
            ],
        )
        .await?;

        if !target.is_file() {
            return Err(anyhow!("ffmpeg produced no frame for {}", file.display()));
        }

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medialib_core::models::Media;
    use tempfile::tempdir;

    #[test]
    fn missing_binaries_disable_generator() {
        let generator = VideoGenerator::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe");
        assert!(!generator.requirements_are_installed());

        let media = Media::new("default", "clip.mp4", "public", "public");
        assert!(generator.can_handle_extension("MP4"));
        assert!(!generator.can_convert(&media));
    }

    #[tokio::test]
    async fn extracts_frame_when_ffmpeg_is_installed() {
        let generator = VideoGenerator::default();
        if !generator.requirements_are_installed() {
            return;
        }

        let dir = tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        let made = run(
            "ffmpeg",
            &[
                "-y", "-f", "lavfi", "-i", "color=c=red:s=32x24:d=1", "-pix_fmt", "yuv420p",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .chain(std::iter::once(clip.to_string_lossy().to_string()))
            .collect::<Vec<_>>(),
        )
        .await;
        if made.is_err() {
            return;
        }

        let conversion = Conversion::new("thumb").extract_video_frame_at_second(30.0);
        let frame = generator.convert(&clip, Some(&conversion)).await.unwrap();
        assert_eq!(frame, dir.path().join("clip.jpg"));
        assert!(frame.is_file());
    }
}
