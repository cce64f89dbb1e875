use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use medialib_core::{Job, JobDispatcher, JobId, MediaLibraryError, MediaLibraryResult};
use uuid::Uuid;

use crate::context::{empty_context_weak, JobHandlerContext};

/// Runs every job on the caller's task before `dispatch` returns.
///
/// Handler failures surface as `MediaLibraryError::JobDispatch`.
pub struct InlineJobDispatcher {
    context: RwLock<Weak<dyn JobHandlerContext>>,
}

impl InlineJobDispatcher {
    pub fn new(context: Weak<dyn JobHandlerContext>) -> Self {
        Self {
            context: RwLock::new(context),
        }
    }

    /// Point the dispatcher at the context built after it.
    pub fn set_context(&self, context: Weak<dyn JobHandlerContext>) {
        *self
            .context
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = context;
    }

    fn context(&self) -> Option<Arc<dyn JobHandlerContext>> {
        self.context
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upgrade()
    }
}

impl Default for InlineJobDispatcher {
    fn default() -> Self {
        Self::new(empty_context_weak())
    }
}

#[async_trait]
impl JobDispatcher for InlineJobDispatcher {
    async fn dispatch(&self, job: Job) -> MediaLibraryResult<JobId> {
        let ctx = self.context().ok_or_else(|| {
            MediaLibraryError::JobDispatch("JobHandlerContext was dropped".to_string())
        })?;
        let id = Uuid::new_v4();
        tracing::debug!(job_id = %id, job = %job, "Running job inline");
        ctx.dispatch_job(&job)
            .await
            .map_err(|e| MediaLibraryError::JobDispatch(format!("{:#}", e)))?;
        Ok(id)
    }
}

impl std::fmt::Debug for InlineJobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineJobDispatcher")
            .field("has_context", &self.context().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        jobs: Mutex<Vec<Job>>,
    }

    #[async_trait]
    impl JobHandlerContext for Recorder {
        async fn dispatch_job(self: Arc<Self>, job: &Job) -> anyhow::Result<serde_json::Value> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn runs_job_before_returning() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = InlineJobDispatcher::default();
        let context: Arc<dyn JobHandlerContext> = recorder.clone();
        dispatcher.set_context(Arc::downgrade(&context));

        let job = Job::GenerateResponsiveImages {
            media_id: Uuid::new_v4(),
        };
        dispatcher.dispatch(job.clone()).await.unwrap();
        assert_eq!(*recorder.jobs.lock().unwrap(), vec![job]);
    }

    #[tokio::test]
    async fn missing_context_is_a_dispatch_error() {
        let err = InlineJobDispatcher::default()
            .dispatch(Job::GenerateResponsiveImages {
                media_id: Uuid::new_v4(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MediaLibraryError::JobDispatch(_)));
    }
}
