use image::{imageops, DynamicImage, Rgba};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use medialib_core::models::FlipDirection;

/// Image orientation operations (rotation and flipping)
pub struct ImageOrientation;

impl ImageOrientation {
    /// Rotate clockwise by `degrees`.
    ///
    /// Right angles swap dimensions as expected; any other angle rotates about
    /// the center on a canvas of the original size with transparent corners.
    pub fn rotate_by_angle(img: DynamicImage, degrees: u16) -> DynamicImage {
        match degrees % 360 {
            0 => img,
            90 => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
            180 => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
            270 => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
            other => {
                let theta = (other as f32).to_radians();
                DynamicImage::ImageRgba8(rotate_about_center(
                    &img.to_rgba8(),
                    theta,
                    Interpolation::Bilinear,
                    Rgba([0, 0, 0, 0]),
                ))
            }
        }
    }

    pub fn flip(img: DynamicImage, direction: FlipDirection) -> DynamicImage {
        match direction {
            FlipDirection::Horizontal => Self::apply_flip_horizontal(img),
            FlipDirection::Vertical => Self::apply_flip_vertical(img),
            FlipDirection::Both => Self::apply_flip_vertical(Self::apply_flip_horizontal(img)),
        }
    }

    /// Apply horizontal flip (mirror)
    pub fn apply_flip_horizontal(img: DynamicImage) -> DynamicImage {
        DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()))
    }

    /// Apply vertical flip
    pub fn apply_flip_vertical(img: DynamicImage) -> DynamicImage {
        DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()))
    }
}
