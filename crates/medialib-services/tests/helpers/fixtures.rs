use std::path::Path;

use image::{Rgb, RgbImage};

/// Write a solid-colour png of the given size.
pub fn write_png(path: &Path, width: u32, height: u32) {
    RgbImage::from_pixel(width, height, Rgb([40, 90, 160]))
        .save(path)
        .unwrap();
}

/// Decode stored bytes and return their dimensions.
pub fn dimensions(bytes: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory(bytes).unwrap();
    (image.width(), image.height())
}
