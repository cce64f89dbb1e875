//! Shared constants

/// Media type reported when no generator recognises a file.
pub const MEDIA_TYPE_OTHER: &str = "other";

/// Custom property path under which per-conversion completion flags live.
pub const GENERATED_CONVERSIONS_KEY: &str = "generated_conversions";

/// Key in the manipulations map that targets every conversion.
pub const WILDCARD_CONVERSION: &str = "*";

/// Extensions for which `keep_original_image_format` is honoured.
pub const KEEPABLE_IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "pjpg", "png", "gif"];

/// Output format new conversions start with.
pub const DEFAULT_CONVERSION_FORMAT: &str = "jpg";

/// Custom property set on media whose collection asks for responsive images.
pub const GENERATE_RESPONSIVE_IMAGES_KEY: &str = "generate_responsive_images";

/// Conversion name under which responsive variants of the original are recorded.
pub const RESPONSIVE_ORIGINAL_CONVERSION: &str = "media_library_original";
