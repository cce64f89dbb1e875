//! Operations on stored media: lookup, deletion, copy and move, manipulation
//! updates, renames, regeneration, and URLs.

use std::sync::Arc;

use medialib_core::constants::GENERATED_CONVERSIONS_KEY;
use medialib_core::models::{ManipulationOverrides, MediaList};
use medialib_core::{
    Conversion, FileSource, HasMedia, Media, MediaLibraryError, MediaLibraryEvent,
    MediaLibraryResult, OwnerRef,
};
use uuid::Uuid;

use crate::file_adder::FileAdder;
use crate::library::MediaLibrary;

impl MediaLibrary {
    pub async fn find_media(&self, media_id: Uuid) -> MediaLibraryResult<Media> {
        Ok(self.repository.get(media_id).await?)
    }

    /// Media of one collection, oldest first.
    pub async fn get_media(
        &self,
        owner: Option<&OwnerRef>,
        collection_name: &str,
    ) -> MediaLibraryResult<MediaList> {
        Ok(self
            .repository
            .get_collection(owner, collection_name)
            .await?
            .into())
    }

    pub async fn get_first_media(
        &self,
        owner: Option<&OwnerRef>,
        collection_name: &str,
    ) -> MediaLibraryResult<Option<Media>> {
        Ok(self
            .get_media(owner, collection_name)
            .await?
            .into_vec()
            .into_iter()
            .next())
    }

    /// Persist changes made directly on a media record, such as custom properties.
    pub async fn save_media(&self, media: &Media) -> MediaLibraryResult<Media> {
        let mut media = media.clone();
        media.touch();
        Ok(self.repository.save(&media).await?)
    }

    /// Delete the record and every file stored for it.
    pub async fn delete_media(&self, media_id: Uuid) -> MediaLibraryResult<()> {
        let media = self.find_media(media_id).await?;
        self.remove(&media).await
    }

    async fn remove(&self, media: &Media) -> MediaLibraryResult<()> {
        let conversions = self.resolver.conversion_collection(media);
        let resolved: Vec<&Conversion> = conversions.iter().collect();
        self.filesystem.remove_all_files(media, &resolved).await?;
        self.repository.delete(media.id).await?;
        tracing::info!(
            media_id = %media.id,
            collection = %media.collection_name,
            "Media deleted"
        );
        Ok(())
    }

    pub async fn clear_media_collection(
        &self,
        owner: Option<&OwnerRef>,
        collection_name: &str,
    ) -> MediaLibraryResult<()> {
        for media in self.repository.get_collection(owner, collection_name).await? {
            self.remove(&media).await?;
        }

        self.events
            .dispatch(MediaLibraryEvent::CollectionHasBeenCleared {
                collection_name: collection_name.to_string(),
                owner: owner.cloned(),
            });
        Ok(())
    }

    /// Delete every item of the collection except `keep`. An empty `keep`
    /// clears the whole collection.
    pub async fn clear_media_collection_except(
        &self,
        owner: Option<&OwnerRef>,
        collection_name: &str,
        keep: &[Uuid],
    ) -> MediaLibraryResult<()> {
        if keep.is_empty() {
            return self.clear_media_collection(owner, collection_name).await;
        }

        for media in self.repository.get_collection(owner, collection_name).await? {
            if !keep.contains(&media.id) {
                self.remove(&media).await?;
            }
        }
        Ok(())
    }

    /// Add a copy of the media's original to `collection_name` of `target`.
    ///
    /// The copy goes through the regular ingestion path, so collection rules
    /// apply and conversions are derived again. `target` must already be saved.
    pub async fn copy_media(
        self: &Arc<Self>,
        media_id: Uuid,
        target: Option<Arc<dyn HasMedia>>,
        collection_name: &str,
        disk_name: Option<&str>,
    ) -> MediaLibraryResult<Media> {
        if let Some(target) = &target {
            if !target.exists() {
                return Err(MediaLibraryError::InvalidInput(format!(
                    "cannot copy media to an unsaved {}",
                    target.model_type()
                )));
            }
        }

        let media = self.find_media(media_id).await?;
        let mut builder = tempfile::Builder::new();
        builder.prefix("medialib-copy-");
        let temp_dir = match &self.config.temporary_directory {
            Some(base) => {
                tokio::fs::create_dir_all(base).await?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        let local = self
            .filesystem
            .copy_from_media_library(&media, &temp_dir.path().join(&media.file_name))
            .await?;

        let mut custom_properties = media.custom_properties.clone();
        custom_properties.forget(GENERATED_CONVERSIONS_KEY);

        let copy = FileAdder::new(self.clone(), FileSource::Local(local))
            .set_subject(target)
            .using_name(media.name.clone())
            .using_file_name(media.file_name.clone())
            .with_custom_properties(custom_properties)
            .to_media_collection(collection_name, disk_name)
            .await?;

        tracing::info!(media_id = %media.id, copy_id = %copy.id, "Media copied");
        Ok(copy)
    }

    /// Copy, then delete the original record and its files.
    pub async fn move_media(
        self: &Arc<Self>,
        media_id: Uuid,
        target: Option<Arc<dyn HasMedia>>,
        collection_name: &str,
        disk_name: Option<&str>,
    ) -> MediaLibraryResult<Media> {
        let moved = self
            .copy_media(media_id, target, collection_name, disk_name)
            .await?;
        self.delete_media(media_id).await?;
        Ok(moved)
    }

    /// Replace the stored manipulation overrides and derive the files again.
    pub async fn update_manipulations(
        &self,
        media_id: Uuid,
        manipulations: ManipulationOverrides,
    ) -> MediaLibraryResult<Media> {
        let mut media = self.find_media(media_id).await?;
        if media.manipulations == manipulations {
            return Ok(media);
        }

        media.manipulations = manipulations;
        media.touch();
        let mut media = self.repository.save(&media).await?;
        self.manipulator
            .create_derived_files(&mut media, &[], false)
            .await?;
        self.find_media(media_id).await
    }

    /// Rename the original and its derived files.
    pub async fn rename_file(
        &self,
        media_id: Uuid,
        new_file_name: &str,
    ) -> MediaLibraryResult<Media> {
        if new_file_name.is_empty() {
            return Err(MediaLibraryError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }

        let mut media = self.find_media(media_id).await?;
        let previous = std::mem::replace(&mut media.file_name, new_file_name.to_string());

        let collection = self.resolver.conversion_collection(&media);
        let conversions = collection.get_conversions(&media.collection_name);
        self.filesystem
            .sync_file_names(&media, &previous, &conversions)
            .await?;

        media.touch();
        let media = self.repository.save(&media).await?;
        tracing::info!(
            media_id = %media.id,
            from = %previous,
            to = %media.file_name,
            "Media file renamed"
        );
        Ok(media)
    }

    /// Derive files again, optionally limited to some conversions or to the
    /// ones whose file is missing. Unknown names fail before anything runs.
    #[tracing::instrument(skip(self))]
    pub async fn regenerate(
        &self,
        media_id: Uuid,
        only_conversion_names: &[String],
        only_missing: bool,
    ) -> MediaLibraryResult<Media> {
        let mut media = self.find_media(media_id).await?;
        let collection = self.resolver.conversion_collection(&media);
        for name in only_conversion_names {
            collection.get_by_name(name)?;
        }

        self.manipulator
            .create_derived_files(&mut media, only_conversion_names, only_missing)
            .await?;
        self.find_media(media_id).await
    }

    /// Local path of the original, or of a conversion when `conversion_name` is given.
    pub fn path(&self, media: &Media, conversion_name: Option<&str>) -> MediaLibraryResult<String> {
        match conversion_name.filter(|name| !name.is_empty()) {
            Some(name) => {
                let collection = self.resolver.conversion_collection(media);
                self.filesystem.path(media, Some(collection.get_by_name(name)?))
            }
            None => self.filesystem.path(media, None),
        }
    }

    pub fn url(&self, media: &Media, conversion_name: Option<&str>) -> MediaLibraryResult<String> {
        match conversion_name.filter(|name| !name.is_empty()) {
            Some(name) => {
                let collection = self.resolver.conversion_collection(media);
                self.filesystem.url(media, Some(collection.get_by_name(name)?))
            }
            None => self.filesystem.url(media, None),
        }
    }

    /// URLs of the responsive variants recorded for `conversion_name`.
    pub fn responsive_image_urls(&self, media: &Media, conversion_name: &str) -> Vec<String> {
        media
            .responsive_images_for(conversion_name)
            .map(|set| set.urls().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
