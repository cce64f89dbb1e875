//! Job handling
//!
//! The queue calls back into the library through [`JobHandlerContext`]. Each
//! handler reloads the media record, so a job sees updates made after it was
//! dispatched. A record deleted in the meantime fails the job without retries.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use medialib_core::{Conversion, Job, Media, MediaLibraryError};
use medialib_worker::{JobError, JobHandlerContext};
use serde_json::json;
use uuid::Uuid;

use crate::library::MediaLibrary;

#[async_trait]
impl JobHandlerContext for MediaLibrary {
    async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value> {
        match job {
            Job::PerformConversions {
                media_id,
                conversion_names,
                only_missing,
            } => {
                self.handle_perform_conversions(*media_id, conversion_names, *only_missing)
                    .await
            }
            Job::GenerateResponsiveImages { media_id } => {
                self.handle_generate_responsive_images(*media_id).await
            }
        }
    }
}

impl MediaLibrary {
    async fn reload_for_job(&self, media_id: Uuid) -> Result<Media> {
        match self.repository.find(media_id).await {
            Ok(Some(media)) => Ok(media),
            Ok(None) => Err(JobError::unrecoverable(MediaLibraryError::MediaNotFound(media_id)).into()),
            Err(e) => Err(JobError::from_media_error(e.into()).into()),
        }
    }

    async fn handle_perform_conversions(
        &self,
        media_id: Uuid,
        conversion_names: &[String],
        only_missing: bool,
    ) -> Result<serde_json::Value> {
        let mut media = self.reload_for_job(media_id).await?;
        let collection = self.resolver.conversion_collection(&media);
        let conversions: Vec<Conversion> = collection
            .get_conversions(&media.collection_name)
            .into_iter()
            .filter(|conversion| conversion_names.iter().any(|name| name == conversion.name()))
            .cloned()
            .collect();

        if conversions.len() < conversion_names.len() {
            tracing::warn!(
                media_id = %media_id,
                requested = ?conversion_names,
                found = conversions.len(),
                "Some queued conversions are no longer registered"
            );
        }

        self.manipulator
            .perform_conversions(&conversions, &mut media, only_missing)
            .await
            .map_err(JobError::from_media_error)?;

        Ok(json!({
            "media_id": media_id,
            "conversions": conversions.iter().map(Conversion::name).collect::<Vec<_>>(),
        }))
    }

    async fn handle_generate_responsive_images(&self, media_id: Uuid) -> Result<serde_json::Value> {
        let mut media = self.reload_for_job(media_id).await?;
        self.manipulator
            .generate_responsive_images(&mut media)
            .await
            .map_err(JobError::from_media_error)?;

        let reloaded = self.reload_for_job(media_id).await?;
        let variants = reloaded
            .responsive_images_for(medialib_core::constants::RESPONSIVE_ORIGINAL_CONVERSION)
            .map(|set| set.urls().len())
            .unwrap_or(0);
        Ok(json!({ "media_id": media_id, "variants": variants }))
    }
}
