//! Error types module
//!
//! `MediaLibraryError` is the error returned by every public medialib operation.
//! The storage and repository crates provide `From` conversions for their own
//! error enums so `?` works across crate boundaries.

use std::io;

use uuid::Uuid;

use crate::models::OwnerRef;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Describes how an error should be reported and whether retrying can help.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "FILE_IS_TOO_BIG")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// One conversion that failed during a synchronous run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    pub conversion: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaLibraryError {
    #[error("File `{path}` does not exist")]
    FileDoesNotExist { path: String },

    #[error("File `{path}` has a size of {size} bytes which is greater than the maximum allowed {max} bytes")]
    FileIsTooBig { path: String, size: u64, max: u64 },

    #[error("There is no filesystem disk named `{0}`")]
    DiskDoesNotExist(String),

    #[error("{}", unacceptable_message(.file, .collection, .owner))]
    FileUnacceptableForCollection {
        file: String,
        collection: String,
        owner: Option<OwnerRef>,
    },

    #[error("There is no conversion named `{0}`")]
    InvalidConversion(String),

    #[error("Invalid path generator: {0}")]
    InvalidPathGenerator(String),

    #[error("Media not found: {0}")]
    MediaNotFound(Uuid),

    #[error("{} conversion(s) failed for media {media_id}", .failures.len())]
    ConversionsFailed {
        media_id: Uuid,
        failures: Vec<ConversionFailure>,
    },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Media conversion error: {0}")]
    MediaConversion(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Job dispatch error: {0}")]
    JobDispatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type MediaLibraryResult<T> = Result<T, MediaLibraryError>;

fn unacceptable_message(file: &str, collection: &str, owner: &Option<OwnerRef>) -> String {
    match owner {
        Some(owner) => format!(
            "The file with properties `{}` was not accepted into the collection named `{}` of model `{}` with id `{}`",
            file, collection, owner.model_type, owner.model_key
        ),
        None => format!(
            "The file with properties `{}` was not accepted into the collection named `{}`",
            file, collection
        ),
    }
}

impl From<anyhow::Error> for MediaLibraryError {
    fn from(err: anyhow::Error) -> Self {
        MediaLibraryError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for MediaLibraryError {
    fn from(err: io::Error) -> Self {
        MediaLibraryError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for MediaLibraryError {
    fn from(err: serde_json::Error) -> Self {
        MediaLibraryError::InvalidInput(format!("JSON error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn static_metadata(err: &MediaLibraryError) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        MediaLibraryError::FileDoesNotExist { .. } => (
            "FILE_DOES_NOT_EXIST",
            false,
            Some("Check the source path"),
            LogLevel::Debug,
        ),
        MediaLibraryError::FileIsTooBig { .. } => (
            "FILE_IS_TOO_BIG",
            false,
            Some("Reduce the file size or raise MEDIA_MAX_FILE_SIZE_MB"),
            LogLevel::Debug,
        ),
        MediaLibraryError::DiskDoesNotExist(_) => (
            "DISK_DOES_NOT_EXIST",
            false,
            Some("Add the disk to MEDIA_DISKS"),
            LogLevel::Warn,
        ),
        MediaLibraryError::FileUnacceptableForCollection { .. } => (
            "FILE_UNACCEPTABLE_FOR_COLLECTION",
            false,
            Some("Check the collection's accepted mime types"),
            LogLevel::Debug,
        ),
        MediaLibraryError::InvalidConversion(_) => (
            "INVALID_CONVERSION",
            false,
            Some("Register the conversion before requesting it"),
            LogLevel::Debug,
        ),
        MediaLibraryError::InvalidPathGenerator(_) => (
            "INVALID_PATH_GENERATOR",
            false,
            Some("Set MEDIA_PATH_GENERATOR to a supported value"),
            LogLevel::Error,
        ),
        MediaLibraryError::MediaNotFound(_) => (
            "MEDIA_NOT_FOUND",
            false,
            Some("Verify the media id exists"),
            LogLevel::Debug,
        ),
        MediaLibraryError::ConversionsFailed { .. } => (
            "CONVERSIONS_FAILED",
            true,
            Some("Regenerate the missing conversions"),
            LogLevel::Error,
        ),
        MediaLibraryError::ImageProcessing(_) => (
            "IMAGE_PROCESSING_ERROR",
            false,
            Some("Check image format and try a different file"),
            LogLevel::Warn,
        ),
        MediaLibraryError::MediaConversion(_) => (
            "MEDIA_CONVERSION_ERROR",
            true,
            Some("Check that ffmpeg and pdftoppm are installed"),
            LogLevel::Error,
        ),
        MediaLibraryError::Storage(_) => (
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        MediaLibraryError::Database(_) => (
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        MediaLibraryError::JobDispatch(_) => (
            "JOB_DISPATCH_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        MediaLibraryError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check parameters and try again"),
            LogLevel::Debug,
        ),
        MediaLibraryError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Fix the configuration and restart"),
            LogLevel::Error,
        ),
        MediaLibraryError::Internal(_) | MediaLibraryError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl MediaLibraryError {
    /// Whether this error was raised by input validation, before anything was stored.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MediaLibraryError::FileDoesNotExist { .. }
                | MediaLibraryError::FileIsTooBig { .. }
                | MediaLibraryError::DiskDoesNotExist(_)
                | MediaLibraryError::FileUnacceptableForCollection { .. }
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for MediaLibraryError {
    fn error_code(&self) -> &'static str {
        static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        static_metadata(self).3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_file_too_big() {
        let err = MediaLibraryError::FileIsTooBig {
            path: "/tmp/big.jpg".to_string(),
            size: 2048,
            max: 1024,
        };
        assert_eq!(err.error_code(), "FILE_IS_TOO_BIG");
        assert!(!err.is_recoverable());
        assert!(err.is_validation());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert!(err.to_string().contains("2048"));
        assert!(err.to_string().contains("1024"));
    }

    #[test]
    fn test_unacceptable_message_names_owner() {
        let err = MediaLibraryError::FileUnacceptableForCollection {
            file: "name = a.txt, size = 3, mime_type = text/plain".to_string(),
            collection: "avatars".to_string(),
            owner: Some(OwnerRef::new("user", "42")),
        };
        let message = err.to_string();
        assert!(message.contains("`avatars`"));
        assert!(message.contains("model `user` with id `42`"));

        let err = MediaLibraryError::FileUnacceptableForCollection {
            file: "a.txt".to_string(),
            collection: "avatars".to_string(),
            owner: None,
        };
        assert!(!err.to_string().contains("model"));
    }

    #[test]
    fn test_conversions_failed_is_recoverable() {
        let err = MediaLibraryError::ConversionsFailed {
            media_id: Uuid::new_v4(),
            failures: vec![ConversionFailure {
                conversion: "thumb".to_string(),
                message: "decode failed".to_string(),
            }],
        };
        assert!(err.is_recoverable());
        assert!(!err.is_validation());
        assert!(err.to_string().starts_with("1 conversion(s) failed"));
    }

    #[test]
    fn test_detailed_message_includes_source() {
        let err: MediaLibraryError =
            anyhow::anyhow!("inner").context("outer").into();
        let details = err.detailed_message();
        assert!(details.contains("outer"));
    }
}
