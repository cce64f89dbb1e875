//! medialib worker library
//!
//! Background execution of conversion and responsive-image jobs.

pub mod context;
pub mod error;
pub mod inline;
pub mod queue;

pub use context::{empty_context_weak, JobHandlerContext};
pub use error::{is_unrecoverable, JobError};
pub use inline::InlineJobDispatcher;
pub use queue::{JobFinishedSender, JobQueue, JobQueueConfig, JobRecord, MAX_RETRY_BACKOFF_SECS};
