//! medialib processing library
//!
//! Still-image generators for images, videos, and PDFs, the manipulation
//! engine, responsive variants, and [`FileManipulator`], which runs
//! conversions for stored media.

pub mod generators;
pub mod image;
mod manipulator;
pub mod responsive;

// Re-export commonly used types
pub use self::generators::{
    binary_is_available, ImageGenerator, ImageGeneratorRegistry, PdfGenerator,
    StillImageGenerator, VideoGenerator,
};
pub use self::image::{ImageOrientation, ImageTransformer};
pub use self::manipulator::FileManipulator;
pub use self::responsive::{
    responsive_file_name, ResponsiveImageGenerator, ResponsiveVariant,
    WidthStepResponsiveImageGenerator,
};
