//! Job failure classification
//!
//! Handlers return `anyhow::Error`; wrapping it in [`JobError`] tells the queue
//! whether another attempt can help. Errors that are not a `JobError` are
//! retried.

use medialib_core::{ErrorMetadata, MediaLibraryError};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0:#}")]
    Recoverable(anyhow::Error),

    #[error("{0:#}")]
    Unrecoverable(anyhow::Error),
}

impl JobError {
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        JobError::Recoverable(err.into())
    }

    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        JobError::Unrecoverable(err.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, JobError::Recoverable(_))
    }

    /// Classify a library error by its metadata.
    pub fn from_media_error(err: MediaLibraryError) -> Self {
        if err.is_recoverable() {
            JobError::Recoverable(err.into())
        } else {
            JobError::Unrecoverable(err.into())
        }
    }
}

/// Whether a handler error should stop further attempts.
pub fn is_unrecoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<JobError>()
        .map(|je| !je.is_recoverable())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn unrecoverable_job_error_detected() {
        let err: anyhow::Error = JobError::unrecoverable(anyhow::anyhow!("bad config")).into();
        assert!(is_unrecoverable(&err));
    }

    #[test]
    fn recoverable_job_error_detected() {
        let err: anyhow::Error = JobError::recoverable(anyhow::anyhow!("network")).into();
        assert!(!is_unrecoverable(&err));
    }

    #[test]
    fn non_job_error_treated_as_recoverable() {
        let err: anyhow::Error = anyhow::anyhow!("generic error");
        assert!(!is_unrecoverable(&err));
    }

    #[test]
    fn media_errors_follow_metadata() {
        let missing = JobError::from_media_error(MediaLibraryError::MediaNotFound(Uuid::new_v4()));
        assert!(!missing.is_recoverable());

        let storage = JobError::from_media_error(MediaLibraryError::Storage("timeout".into()));
        assert!(storage.is_recoverable());
    }
}
