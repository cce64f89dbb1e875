//! Job handler context trait
//!
//! The media library implements this trait. The worker calls `dispatch_job`
//! when a job runs; the implementation matches on the job and invokes the
//! conversion or responsive-image handler.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Weak};

use medialib_core::Job;

/// Context for job dispatch.
///
/// The worker holds a weak reference so the queue does not keep the library
/// alive, and upgrades it for each job.
#[async_trait]
pub trait JobHandlerContext: Send + Sync {
    /// Run `job` and return a summary stored on its record.
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value>;
}

/// Placeholder used before the real context exists. Dispatch always errors.
struct NoopContext;

#[async_trait]
impl JobHandlerContext for NoopContext {
    async fn dispatch_job(self: Arc<Self>, _job: &Job) -> Result<serde_json::Value> {
        Err(anyhow!("NoopContext: no handler context available"))
    }
}

/// A weak reference that never upgrades. Use when building a queue before the
/// library that handles its jobs.
pub fn empty_context_weak() -> Weak<dyn JobHandlerContext> {
    let n: Arc<dyn JobHandlerContext> = Arc::new(NoopContext);
    Arc::downgrade(&n)
}
