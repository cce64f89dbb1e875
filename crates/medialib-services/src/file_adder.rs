//! File ingestion
//!
//! A [`FileAdder`] collects the options for one new file and commits it with
//! [`FileAdder::to_media_collection`]. Validation (existence, size, disks)
//! happens before anything is stored; the collection's accept rules are
//! checked when the item is processed, which for an unsaved subject is
//! deferred until [`MediaLibrary::process_unattached_media`].

use std::path::Path;
use std::sync::Arc;

use medialib_core::models::{file_stem, ManipulationOverrides, PropertyBag};
use medialib_core::{
    FileSource, HasMedia, Media, MediaLibraryError, MediaLibraryEvent, MediaLibraryResult,
    OwnerRef, PendingAttachment, PendingFile, RemoteFile,
};
use serde_json::Value;
use uuid::Uuid;

use crate::library::MediaLibrary;

pub type FileNameSanitizer = dyn Fn(&str) -> String + Send + Sync;

/// Replaces `#`, `/`, `\` and spaces with `-`.
pub fn default_sanitizer(file_name: &str) -> String {
    file_name.replace(['#', '/', '\\', ' '], "-")
}

pub struct FileAdder {
    library: Arc<MediaLibrary>,
    subject: Option<Arc<dyn HasMedia>>,
    source: FileSource,
    file_name: String,
    media_name: String,
    preserve_original: bool,
    custom_properties: PropertyBag,
    manipulations: ManipulationOverrides,
    conversions_disk_name: Option<String>,
    order: Option<i64>,
    generate_responsive_images: bool,
    sanitizer: Arc<FileNameSanitizer>,
}

impl FileAdder {
    pub fn new(library: Arc<MediaLibrary>, source: FileSource) -> Self {
        let file_name = source.file_name();
        let media_name = file_stem(&file_name).to_string();
        Self {
            library,
            subject: None,
            source,
            file_name,
            media_name,
            preserve_original: false,
            custom_properties: PropertyBag::new(),
            manipulations: ManipulationOverrides::new(),
            conversions_disk_name: None,
            order: None,
            generate_responsive_images: false,
            sanitizer: Arc::new(default_sanitizer),
        }
    }

    pub fn set_subject(mut self, subject: Option<Arc<dyn HasMedia>>) -> Self {
        self.subject = subject;
        self
    }

    /// Keep the source file (or remote object) after it was copied.
    pub fn preserving_original(mut self) -> Self {
        self.preserve_original = true;
        self
    }

    pub fn using_name(mut self, name: impl Into<String>) -> Self {
        self.media_name = name.into();
        self
    }

    /// Stored file name, sanitized on commit.
    pub fn using_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_custom_properties(mut self, custom_properties: PropertyBag) -> Self {
        self.custom_properties = custom_properties;
        self
    }

    pub fn with_custom_property(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.custom_properties.set(path, value);
        self
    }

    pub fn with_manipulations(mut self, manipulations: ManipulationOverrides) -> Self {
        self.manipulations = manipulations;
        self
    }

    pub fn storing_conversions_on_disk(mut self, disk_name: impl Into<String>) -> Self {
        self.conversions_disk_name = Some(disk_name.into());
        self
    }

    pub fn set_order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_responsive_images(mut self) -> Self {
        self.generate_responsive_images = true;
        self
    }

    pub fn sanitizing_file_name<F>(mut self, sanitizer: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.sanitizer = Arc::new(sanitizer);
        self
    }

    /// Commit the file to `collection_name`.
    ///
    /// `disk_name` overrides the collection's disk and the configured default.
    /// For a subject that has not been saved yet the returned media is not
    /// persisted; it is parked on the subject until
    /// [`MediaLibrary::process_unattached_media`] runs.
    #[tracing::instrument(skip(self), fields(source = %self.source))]
    pub async fn to_media_collection(
        self,
        collection_name: &str,
        disk_name: Option<&str>,
    ) -> MediaLibraryResult<Media> {
        let (size, mime_type) = self.inspect_source().await?;

        let subject = self.subject.clone();
        let collection = self
            .library
            .resolver
            .media_collections(subject.as_deref())
            .get(collection_name)
            .cloned();

        let disk = disk_name
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| collection.as_ref().and_then(|c| c.disk_name.clone()))
            .unwrap_or_else(|| self.library.config.disk_name.clone());
        self.ensure_disk_exists(&disk)?;

        let conversions_disk = self
            .conversions_disk_name
            .clone()
            .or_else(|| collection.as_ref().and_then(|c| c.conversions_disk_name.clone()))
            .unwrap_or_else(|| disk.clone());
        self.ensure_disk_exists(&conversions_disk)?;

        let file_name = (self.sanitizer)(&self.file_name);
        let mut media = Media::new(collection_name, file_name, disk, conversions_disk);
        media.name = self.media_name.clone();
        media.mime_type = Some(mime_type);
        media.size = size;
        media.custom_properties = self.custom_properties.clone();
        media.manipulations = self.manipulations.clone();
        media.order_column = self.order;
        if self.generate_responsive_images {
            media.set_generate_responsive_images(true);
        }

        match subject {
            Some(subject) if !subject.exists() => {
                tracing::debug!(
                    media_id = %media.id,
                    model_type = %subject.model_type(),
                    collection = %collection_name,
                    "Subject not saved yet, parking media"
                );
                subject.unattached_media().push(PendingAttachment {
                    media: media.clone(),
                    source: self.source,
                    preserve_original: self.preserve_original,
                });
                Ok(media)
            }
            Some(subject) => {
                media.set_owner(subject.owner_ref().as_ref());
                self.library
                    .process_media_item(
                        media,
                        &self.source,
                        self.preserve_original,
                        Some(&subject),
                    )
                    .await
            }
            None => {
                self.library
                    .process_media_item(media, &self.source, self.preserve_original, None)
                    .await
            }
        }
    }

    /// Size and mime type of the source, failing when it is missing or too big.
    async fn inspect_source(&self) -> MediaLibraryResult<(u64, String)> {
        let max = self.library.config.max_file_size;
        match &self.source {
            FileSource::Local(path) => {
                let metadata = match tokio::fs::metadata(path).await {
                    Ok(metadata) if metadata.is_file() => metadata,
                    _ => {
                        return Err(MediaLibraryError::FileDoesNotExist {
                            path: path.display().to_string(),
                        })
                    }
                };
                if metadata.len() > max {
                    return Err(MediaLibraryError::FileIsTooBig {
                        path: path.display().to_string(),
                        size: metadata.len(),
                        max,
                    });
                }
                Ok((metadata.len(), guess_mime_type(path)))
            }
            FileSource::Remote(remote) => {
                let disk = self.library.filesystem.disk(&remote.disk)?;
                if !disk.exists(&remote.key).await? {
                    return Err(MediaLibraryError::FileDoesNotExist {
                        path: remote.key.clone(),
                    });
                }
                let size = disk.content_length(&remote.key).await?;
                if size > max {
                    return Err(MediaLibraryError::FileIsTooBig {
                        path: remote.key.clone(),
                        size,
                        max,
                    });
                }
                Ok((size, disk.content_type(&remote.key).await?))
            }
        }
    }

    fn ensure_disk_exists(&self, disk_name: &str) -> MediaLibraryResult<()> {
        if self.library.filesystem.disks().has_disk(disk_name) {
            Ok(())
        } else {
            Err(MediaLibraryError::DiskDoesNotExist(disk_name.to_string()))
        }
    }
}

impl std::fmt::Debug for FileAdder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAdder")
            .field("source", &self.source)
            .field("file_name", &self.file_name)
            .field("media_name", &self.media_name)
            .field("preserve_original", &self.preserve_original)
            .field("conversions_disk_name", &self.conversions_disk_name)
            .finish_non_exhaustive()
    }
}

fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

impl MediaLibrary {
    /// Accept, persist and store one media item, then derive its files.
    ///
    /// Inline conversion failures are returned after the collection size limit
    /// was enforced; the stored original is kept.
    #[tracing::instrument(skip(self, media, source, owner), fields(media_id = %media.id, collection = %media.collection_name))]
    pub(crate) async fn process_media_item(
        &self,
        media: Media,
        source: &FileSource,
        preserve_original: bool,
        owner: Option<&Arc<dyn HasMedia>>,
    ) -> MediaLibraryResult<Media> {
        let collection = self
            .resolver
            .media_collections(owner.map(|o| o.as_ref()))
            .get(&media.collection_name)
            .cloned();

        let pending = PendingFile::new(
            media.file_name.clone(),
            media.size,
            media.mime_type.clone().unwrap_or_default(),
        );
        if let Some(collection) = &collection {
            if !collection.accepts(&pending, owner.map(|o| o.as_ref())) {
                return Err(MediaLibraryError::FileUnacceptableForCollection {
                    file: pending.to_string(),
                    collection: collection.name.clone(),
                    owner: media.owner(),
                });
            }
        }

        if let Some(owner) = owner {
            if self.resolver.owners().get(owner.model_type()).is_none() {
                tracing::debug!(model_type = %owner.model_type(), "Owner type not registered, registering it");
                self.resolver.owners().register(owner.clone());
            }
        }

        let mut media = media;
        if collection
            .as_ref()
            .map(|c| c.generate_responsive_images)
            .unwrap_or(false)
        {
            media.set_generate_responsive_images(true);
        }

        let mut media = self.repository.save(&media).await?;

        let stored = match source {
            FileSource::Local(path) => self.filesystem.add(path, &media, None).await,
            FileSource::Remote(remote) => self.filesystem.add_remote(remote, &media, None).await,
        };
        if let Err(e) = stored {
            tracing::error!(media_id = %media.id, error = %e, "Failed to store original, removing record");
            self.repository.delete(media.id).await?;
            return Err(e);
        }

        tracing::info!(
            media_id = %media.id,
            disk = %media.disk,
            file_name = %media.file_name,
            size_bytes = media.size,
            "Media added"
        );
        self.events
            .dispatch(MediaLibraryEvent::MediaHasBeenAdded {
                media: media.clone(),
            });

        if !preserve_original {
            self.remove_source(source).await?;
        }

        let derived = self
            .manipulator
            .create_derived_files(&mut media, &[], false)
            .await;

        if let Some(limit) = collection.and_then(|c| c.collection_size_limit) {
            self.enforce_collection_size_limit(&media, limit).await?;
        }

        derived?;
        Ok(self.repository.find(media.id).await?.unwrap_or(media))
    }

    async fn remove_source(&self, source: &FileSource) -> MediaLibraryResult<()> {
        match source {
            FileSource::Local(path) => {
                tokio::fs::remove_file(path).await?;
            }
            FileSource::Remote(RemoteFile { key, disk }) => {
                self.filesystem.disk(disk)?.delete(key).await?;
            }
        }
        tracing::debug!(source = %source, "Source file removed");
        Ok(())
    }

    /// Delete the oldest items of the media's collection beyond the newest `limit`.
    async fn enforce_collection_size_limit(
        &self,
        media: &Media,
        limit: usize,
    ) -> MediaLibraryResult<()> {
        let owner = media.owner();
        let items = self
            .repository
            .get_collection(owner.as_ref(), &media.collection_name)
            .await?;
        if items.len() <= limit {
            return Ok(());
        }

        let keep: Vec<Uuid> = items.iter().rev().take(limit).map(|m| m.id).collect();
        tracing::info!(
            collection = %media.collection_name,
            limit = limit,
            removing = items.len() - keep.len(),
            "Collection size limit reached"
        );
        self.clear_media_collection_except(owner.as_ref(), &media.collection_name, &keep)
            .await
    }

    /// Process the attachments parked on `subject` before it was saved.
    ///
    /// Every attachment is attempted; the first failure is returned afterwards.
    pub async fn process_unattached_media(
        &self,
        subject: &Arc<dyn HasMedia>,
    ) -> MediaLibraryResult<Vec<Media>> {
        let owner: OwnerRef = subject.owner_ref().ok_or_else(|| {
            MediaLibraryError::InvalidInput(format!(
                "{} has not been saved yet",
                subject.model_type()
            ))
        })?;

        let mut processed = Vec::new();
        let mut first_error = None;
        for attachment in subject.unattached_media().take() {
            let mut media = attachment.media;
            media.set_owner(Some(&owner));
            match self
                .process_media_item(media, &attachment.source, attachment.preserve_original, Some(subject))
                .await
            {
                Ok(media) => processed.push(media),
                Err(e) => {
                    tracing::warn!(owner = %owner, error = %e, "Failed to process parked media");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(processed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sanitizer_replaces_separators() {
        assert_eq!(default_sanitizer("my file#1/a\\b.jpg"), "my-file-1-a-b.jpg");
        assert_eq!(default_sanitizer("plain.png"), "plain.png");
    }
}
