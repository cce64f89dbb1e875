//! Image transformer - applies a manipulation chain to one image
//!
//! Steps run in declared order. Consecutive `width` and `height` steps are
//! merged into one aspect-preserving resize so `width(100).height(100)` means
//! "fit inside 100x100" rather than two separate resizes.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use medialib_core::models::{CropPosition, Fit, Manipulation, Manipulations};

use crate::image::orientation::ImageOrientation;

const DEFAULT_JPEG_QUALITY: u8 = 90;
const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Applies manipulation chains with the `image` crate
pub struct ImageTransformer;

impl ImageTransformer {
    /// Decode `input`, apply `manipulations`, and write the result to `output`.
    ///
    /// The output encoding follows `output`'s extension, falling back to the
    /// input's when the output extension is not an image format.
    pub fn transform_file(input: &Path, output: &Path, manipulations: &Manipulations) -> Result<()> {
        let img = image::ImageReader::open(input)
            .with_context(|| format!("Failed to open {}", input.display()))?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("Failed to decode {}", input.display()))?;

        let transformed = Self::apply(img, manipulations)?;

        let format = Self::format_for_path(output)
            .or_else(|| Self::format_for_path(input))
            .unwrap_or(ImageFormat::Png);
        let data = Self::encode(&transformed, format, manipulations.quality())?;

        std::fs::write(output, data)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        Ok(())
    }

    /// Apply every step of `manipulations` to `img`.
    pub fn apply(mut img: DynamicImage, manipulations: &Manipulations) -> Result<DynamicImage> {
        let mut pending_width: Option<u32> = None;
        let mut pending_height: Option<u32> = None;

        for step in manipulations.iter() {
            match step {
                Manipulation::Width { width } => {
                    pending_width = Some(*width);
                    continue;
                }
                Manipulation::Height { height } => {
                    pending_height = Some(*height);
                    continue;
                }
                _ => {}
            }

            img = Self::resize_to(img, pending_width.take(), pending_height.take());
            img = Self::apply_step(img, step)?;
        }

        Ok(Self::resize_to(img, pending_width, pending_height))
    }

    fn apply_step(img: DynamicImage, step: &Manipulation) -> Result<DynamicImage> {
        tracing::trace!(manipulation = step.name(), "Applying manipulation");

        let result = match step {
            Manipulation::Width { width } => Self::resize_to(img, Some(*width), None),
            Manipulation::Height { height } => Self::resize_to(img, None, Some(*height)),
            Manipulation::Fit { fit, width, height } => Self::fit(img, *fit, *width, *height),
            Manipulation::Crop {
                position,
                width,
                height,
            } => Self::crop(img, *position, *width, *height)?,
            Manipulation::ManualCrop {
                width,
                height,
                x,
                y,
            } => Self::manual_crop(img, *width, *height, *x, *y)?,
            Manipulation::Rotate { degrees } => ImageOrientation::rotate_by_angle(img, *degrees),
            Manipulation::Flip { direction } => ImageOrientation::flip(img, *direction),
            Manipulation::Greyscale => img.grayscale(),
            Manipulation::Sepia => Self::sepia(&img),
            Manipulation::Blur { amount } if *amount > 0.0 => img.blur(amount.min(100.0)),
            Manipulation::Sharpen { amount } if *amount > 0.0 => {
                img.unsharpen(amount.min(100.0) / 10.0, 1)
            }
            Manipulation::Brightness { amount } => img.brighten((*amount).clamp(-100, 100) * 255 / 100),
            Manipulation::Contrast { amount } => img.adjust_contrast(amount.clamp(-100.0, 100.0)),
            Manipulation::Blur { .. }
            | Manipulation::Sharpen { .. }
            | Manipulation::Format { .. }
            | Manipulation::Quality { .. } => img,
        };

        Ok(result)
    }

    fn resize_to(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
        match (width, height) {
            (Some(width), Some(height)) => img.resize(width.max(1), height.max(1), RESIZE_FILTER),
            (Some(width), None) => {
                let (current_width, current_height) = img.dimensions();
                let height = scaled(current_height, width, current_width);
                img.resize_exact(width.max(1), height, RESIZE_FILTER)
            }
            (None, Some(height)) => {
                let (current_width, current_height) = img.dimensions();
                let width = scaled(current_width, height, current_height);
                img.resize_exact(width, height.max(1), RESIZE_FILTER)
            }
            (None, None) => img,
        }
    }

    fn fit(img: DynamicImage, fit: Fit, width: u32, height: u32) -> DynamicImage {
        let (width, height) = (width.max(1), height.max(1));
        match fit {
            Fit::Contain => img.resize(width, height, RESIZE_FILTER),
            Fit::Max => {
                let (current_width, current_height) = img.dimensions();
                if current_width <= width && current_height <= height {
                    img
                } else {
                    img.resize(width, height, RESIZE_FILTER)
                }
            }
            Fit::Fill => {
                let resized = img.resize(width, height, RESIZE_FILTER).to_rgba8();
                let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
                let x = (width - resized.width()) / 2;
                let y = (height - resized.height()) / 2;
                image::imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
                DynamicImage::ImageRgba8(canvas)
            }
            Fit::Stretch => img.resize_exact(width, height, RESIZE_FILTER),
            Fit::Crop => img.resize_to_fill(width, height, RESIZE_FILTER),
        }
    }

    /// Cover `width` x `height` and cut the overflow at `position`.
    fn crop(img: DynamicImage, position: CropPosition, width: u32, height: u32) -> Result<DynamicImage> {
        if width == 0 || height == 0 {
            return Err(anyhow!("Crop dimensions must be positive, got {}x{}", width, height));
        }

        let (current_width, current_height) = img.dimensions();
        let scale = f64::max(
            width as f64 / current_width as f64,
            height as f64 / current_height as f64,
        );
        let cover_width = ((current_width as f64 * scale).ceil() as u32).max(width);
        let cover_height = ((current_height as f64 * scale).ceil() as u32).max(height);
        let covered = img.resize_exact(cover_width, cover_height, RESIZE_FILTER);

        let spare_x = cover_width - width;
        let spare_y = cover_height - height;
        let (x, y) = match position {
            CropPosition::TopLeft => (0, 0),
            CropPosition::Top => (spare_x / 2, 0),
            CropPosition::TopRight => (spare_x, 0),
            CropPosition::Left => (0, spare_y / 2),
            CropPosition::Center => (spare_x / 2, spare_y / 2),
            CropPosition::Right => (spare_x, spare_y / 2),
            CropPosition::BottomLeft => (0, spare_y),
            CropPosition::Bottom => (spare_x / 2, spare_y),
            CropPosition::BottomRight => (spare_x, spare_y),
        };

        Ok(covered.crop_imm(x, y, width, height))
    }

    fn manual_crop(img: DynamicImage, width: u32, height: u32, x: u32, y: u32) -> Result<DynamicImage> {
        let (current_width, current_height) = img.dimensions();
        if x >= current_width || y >= current_height {
            return Err(anyhow!(
                "Crop origin {}x{} lies outside a {}x{} image",
                x,
                y,
                current_width,
                current_height
            ));
        }
        let width = width.min(current_width - x);
        let height = height.min(current_height - y);
        Ok(img.crop_imm(x, y, width, height))
    }

    fn sepia(img: &DynamicImage) -> DynamicImage {
        let mut buffer = img.to_rgba8();
        for pixel in buffer.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let (r, g, b) = (r as f32, g as f32, b as f32);
            let tone = |rw: f32, gw: f32, bw: f32| (r * rw + g * gw + b * bw).min(255.0) as u8;
            *pixel = Rgba([
                tone(0.393, 0.769, 0.189),
                tone(0.349, 0.686, 0.168),
                tone(0.272, 0.534, 0.131),
                a,
            ]);
        }
        DynamicImage::ImageRgba8(buffer)
    }

    /// Encode `img`; JPEG output drops the alpha channel.
    pub fn encode(img: &DynamicImage, format: ImageFormat, quality: Option<u8>) -> Result<Vec<u8>> {
        let (width, height) = img.dimensions();
        let mut buffer = Vec::with_capacity((width * height * 3) as usize);
        let mut cursor = Cursor::new(&mut buffer);

        match format {
            ImageFormat::Jpeg => {
                let quality = quality.unwrap_or(DEFAULT_JPEG_QUALITY).clamp(1, 100);
                JpegEncoder::new_with_quality(&mut cursor, quality).encode_image(&img.to_rgb8())?;
            }
            ImageFormat::Png => img.write_to(&mut cursor, format)?,
            other => DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut cursor, other)?,
        }

        Ok(buffer)
    }

    pub fn format_for_path(path: &Path) -> Option<ImageFormat> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Self::format_for_extension)
    }

    pub fn format_for_extension(extension: &str) -> Option<ImageFormat> {
        match extension.to_lowercase().as_str() {
            "pjpg" => Some(ImageFormat::Jpeg),
            other => ImageFormat::from_extension(other),
        }
    }
}

fn scaled(length: u32, target: u32, reference: u32) -> u32 {
    if reference == 0 {
        return 1;
    }
    ((length as f64 * target as f64 / reference as f64).round() as u32).max(1)
}
