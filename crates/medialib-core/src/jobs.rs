//! Background job model.
//!
//! Jobs carry ids only; handlers reload the media record when they run, so a
//! job dispatched before a later update still sees the current state.

use std::fmt::{Display, Formatter, Result as FmtResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MediaLibraryResult;

pub type JobId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    PerformConversions {
        media_id: Uuid,
        conversion_names: Vec<String>,
        only_missing: bool,
    },
    GenerateResponsiveImages {
        media_id: Uuid,
    },
}

impl Job {
    pub fn media_id(&self) -> Uuid {
        match self {
            Job::PerformConversions { media_id, .. } | Job::GenerateResponsiveImages { media_id } => {
                *media_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Job::PerformConversions { .. } => "perform_conversions",
            Job::GenerateResponsiveImages { .. } => "generate_responsive_images",
        }
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}({})", self.kind(), self.media_id())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Scheduled,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Accepts jobs for asynchronous execution.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: Job) -> MediaLibraryResult<JobId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_serializes_with_type_tag() {
        let media_id = Uuid::new_v4();
        let job = Job::PerformConversions {
            media_id,
            conversion_names: vec!["thumb".to_string()],
            only_missing: true,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "perform_conversions");
        assert_eq!(value["conversion_names"][0], "thumb");

        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back.media_id(), media_id);
    }

    #[test]
    fn display_names_kind_and_media() {
        let media_id = Uuid::new_v4();
        let job = Job::GenerateResponsiveImages { media_id };
        assert_eq!(job.to_string(), format!("generate_responsive_images({})", media_id));
    }
}
