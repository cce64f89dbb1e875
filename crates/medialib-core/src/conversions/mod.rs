//! Conversion registration and per-media resolution.

mod collection;
mod file_namer;
mod registry;
mod resolver;

pub use collection::ConversionCollection;
pub use file_namer::{ConversionFileNamer, DefaultConversionFileNamer};
pub use registry::{register_all_media_conversions, ConversionRegistry};
pub use resolver::ConversionResolver;
