//! Image manipulation
//!
//! - Orientation (rotate, flip)
//! - Manipulation chains applied to a decoded image and written back to disk

pub mod orientation;
pub mod transformer;

pub use orientation::ImageOrientation;
pub use transformer::ImageTransformer;
