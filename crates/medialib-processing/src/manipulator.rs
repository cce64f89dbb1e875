//! Conversion execution
//!
//! [`FileManipulator`] turns resolved conversions into stored files: the
//! original is copied into a scratch directory once, each conversion runs its
//! generator and manipulation chain there, and the result is uploaded to the
//! conversion's disk before the media item is marked.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use medialib_core::constants::RESPONSIVE_ORIGINAL_CONVERSION;
use medialib_core::models::{file_extension, Conversion, Media, ResponsiveImage, ResponsiveImageSet};
use medialib_core::{
    ConversionFailure, ConversionResolver, EventDispatcher, GeneratorKind, Job, JobDispatcher,
    MediaLibraryError, MediaLibraryEvent, MediaLibraryResult,
};
use medialib_db::MediaRepository;
use medialib_storage::{FileKind, Filesystem};
use tempfile::TempDir;
use tokio::fs;
use uuid::Uuid;

use crate::generators::{ImageGeneratorRegistry, StillImageGenerator};
use crate::image::ImageTransformer;
use crate::responsive::ResponsiveImageGenerator;

pub struct FileManipulator {
    filesystem: Arc<Filesystem>,
    repository: Arc<dyn MediaRepository>,
    generators: Arc<ImageGeneratorRegistry>,
    resolver: ConversionResolver,
    events: EventDispatcher,
    dispatcher: Arc<dyn JobDispatcher>,
    responsive: Option<Arc<dyn ResponsiveImageGenerator>>,
    temporary_directory: Option<PathBuf>,
}

impl FileManipulator {
    pub fn new(
        filesystem: Arc<Filesystem>,
        repository: Arc<dyn MediaRepository>,
        generators: Arc<ImageGeneratorRegistry>,
        resolver: ConversionResolver,
        events: EventDispatcher,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            filesystem,
            repository,
            generators,
            resolver,
            events,
            dispatcher,
            responsive: None,
            temporary_directory: None,
        }
    }

    pub fn with_responsive_image_generator(
        mut self,
        generator: Option<Arc<dyn ResponsiveImageGenerator>>,
    ) -> Self {
        self.responsive = generator;
        self
    }

    /// Scratch directories are created under `directory` instead of the system temp dir.
    pub fn with_temporary_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.temporary_directory = directory;
        self
    }

    pub fn filesystem(&self) -> &Arc<Filesystem> {
        &self.filesystem
    }

    pub fn repository(&self) -> &Arc<dyn MediaRepository> {
        &self.repository
    }

    pub fn generators(&self) -> &Arc<ImageGeneratorRegistry> {
        &self.generators
    }

    pub fn resolver(&self) -> &ConversionResolver {
        &self.resolver
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn dispatcher(&self) -> &Arc<dyn JobDispatcher> {
        &self.dispatcher
    }

    /// Generate derived files for `media`.
    ///
    /// Non-queued conversions run inline; queued ones go out as a single
    /// `PerformConversions` job. An empty `only_conversion_names` selects every
    /// conversion and also requests responsive variants of the original when
    /// the media asks for them.
    #[tracing::instrument(skip(self, media), fields(media_id = %media.id))]
    pub async fn create_derived_files(
        &self,
        media: &mut Media,
        only_conversion_names: &[String],
        only_missing: bool,
    ) -> MediaLibraryResult<()> {
        let collection = self.resolver.conversion_collection(media);
        let selected: Vec<Conversion> = collection
            .get_conversions(&media.collection_name)
            .into_iter()
            .filter(|conversion| {
                only_conversion_names.is_empty()
                    || only_conversion_names
                        .iter()
                        .any(|name| name == conversion.name())
            })
            .cloned()
            .collect();

        let (queued, non_queued): (Vec<Conversion>, Vec<Conversion>) = selected
            .into_iter()
            .partition(|conversion| conversion.should_be_queued());

        let inline_result = self
            .perform_conversions(&non_queued, media, only_missing)
            .await;

        if !queued.is_empty() {
            let conversion_names: Vec<String> =
                queued.iter().map(|c| c.name().to_string()).collect();
            let job_id = self
                .dispatcher
                .dispatch(Job::PerformConversions {
                    media_id: media.id,
                    conversion_names: conversion_names.clone(),
                    only_missing,
                })
                .await?;
            tracing::debug!(
                media_id = %media.id,
                job_id = %job_id,
                conversions = ?conversion_names,
                "Queued conversions dispatched"
            );
        }

        if only_conversion_names.is_empty() && self.wants_responsive_images(media) {
            self.dispatcher
                .dispatch(Job::GenerateResponsiveImages { media_id: media.id })
                .await?;
        }

        inline_result
    }

    fn wants_responsive_images(&self, media: &Media) -> bool {
        media.should_generate_responsive_images()
            && self
                .generators
                .get(GeneratorKind::Image)
                .map(|generator| generator.can_convert(media))
                .unwrap_or(false)
    }

    /// Run `conversions` for `media` now.
    ///
    /// A failing conversion does not stop the others; every failure is
    /// reported together once all conversions ran.
    pub async fn perform_conversions(
        &self,
        conversions: &[Conversion],
        media: &mut Media,
        only_missing: bool,
    ) -> MediaLibraryResult<()> {
        let mut pending: Vec<&Conversion> = Vec::with_capacity(conversions.len());
        for conversion in conversions {
            if only_missing && self.filesystem.conversion_exists(media, conversion).await? {
                tracing::debug!(
                    media_id = %media.id,
                    conversion = %conversion.name(),
                    "Conversion already exists, skipping"
                );
                continue;
            }
            pending.push(conversion);
        }

        if pending.is_empty() {
            return Ok(());
        }

        let Some(generator) = self.generators.for_media(media) else {
            tracing::debug!(
                media_id = %media.id,
                file_name = %media.file_name,
                "No image generator can convert this media"
            );
            return Ok(());
        };

        let work_dir = self.scratch_directory()?;
        let copied_original = self
            .filesystem
            .copy_from_media_library(media, &work_dir.path().join(scratch_name(media)))
            .await?;

        let mut failures = Vec::new();
        for conversion in pending {
            if let Err(e) = self
                .perform_conversion(conversion, media, generator.as_ref(), &copied_original, work_dir.path())
                .await
            {
                tracing::error!(
                    media_id = %media.id,
                    conversion = %conversion.name(),
                    error = %e,
                    "Conversion failed"
                );
                failures.push(ConversionFailure {
                    conversion: conversion.name().to_string(),
                    message: e.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MediaLibraryError::ConversionsFailed {
                media_id: media.id,
                failures,
            })
        }
    }

    async fn perform_conversion(
        &self,
        conversion: &Conversion,
        media: &mut Media,
        generator: &dyn StillImageGenerator,
        copied_original: &Path,
        work_dir: &Path,
    ) -> MediaLibraryResult<()> {
        let start = Instant::now();
        self.events.dispatch(MediaLibraryEvent::ConversionWillStart {
            media: media.clone(),
            conversion: conversion.clone(),
            copied_original_file: copied_original.display().to_string(),
        });

        let still = generator
            .convert(copied_original, Some(conversion))
            .await
            .map_err(|e| MediaLibraryError::MediaConversion(format!("{:#}", e)))?;
        let manipulated = self.perform_manipulations(media, conversion, &still).await?;

        let file_name = self.filesystem.conversion_file_name(media, conversion);
        let renamed = work_dir.join(&file_name);
        if manipulated == copied_original {
            fs::copy(&manipulated, &renamed).await?;
        } else if manipulated != renamed {
            fs::rename(&manipulated, &renamed).await?;
        }

        if conversion.should_generate_responsive_images() {
            self.store_responsive_images(media, &renamed, conversion.name())
                .await?;
        }

        let disk_name = self
            .filesystem
            .conversion_disk_name(media, conversion)
            .to_string();
        self.filesystem
            .copy_to_media_library(&renamed, media, FileKind::Conversion, &file_name, &disk_name)
            .await?;

        let conversion_name = conversion.name().to_string();
        self.update_media(media, |fresh| {
            fresh.mark_as_conversion_generated(&conversion_name, true)
        })
        .await?;

        tracing::info!(
            media_id = %media.id,
            conversion = %conversion.name(),
            disk = %disk_name,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Conversion completed"
        );

        self.events
            .dispatch(MediaLibraryEvent::ConversionHasBeenCompleted {
                media: media.clone(),
                conversion: conversion.clone(),
            });
        Ok(())
    }

    /// Apply the conversion's chain to `image_file`.
    ///
    /// An empty chain returns `image_file` itself without copying. Otherwise
    /// the result is written next to it under a fresh name with the
    /// conversion's result extension.
    pub async fn perform_manipulations(
        &self,
        media: &Media,
        conversion: &Conversion,
        image_file: &Path,
    ) -> MediaLibraryResult<PathBuf> {
        let manipulations = conversion.manipulations_for(&media.collection_name);
        if manipulations.is_empty() {
            return Ok(image_file.to_path_buf());
        }

        let extension =
            conversion.result_extension(file_extension(&media.file_name), &media.collection_name);
        let base_name = format!("{}{}", Uuid::new_v4().simple(), conversion.name());
        let file_name = if extension.is_empty() {
            base_name
        } else {
            format!("{}.{}", base_name, extension)
        };
        let output = image_file
            .parent()
            .map(|dir| dir.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name));

        let input = image_file.to_path_buf();
        let target = output.clone();
        let manipulations = manipulations.clone();
        tokio::task::spawn_blocking(move || {
            ImageTransformer::transform_file(&input, &target, &manipulations)
        })
        .await
        .map_err(|e| MediaLibraryError::Internal(format!("Manipulation task failed: {}", e)))?
        .map_err(|e| MediaLibraryError::ImageProcessing(format!("{:#}", e)))?;

        Ok(output)
    }

    /// Regenerate the responsive variants of the original.
    ///
    /// A no-op when no responsive generator is configured or the original is
    /// not an image.
    #[tracing::instrument(skip(self, media), fields(media_id = %media.id))]
    pub async fn generate_responsive_images(&self, media: &mut Media) -> MediaLibraryResult<()> {
        if self.responsive.is_none() {
            tracing::info!(media_id = %media.id, "No responsive image generator configured, skipping");
            return Ok(());
        }

        let Some(generator) = self
            .generators
            .get(GeneratorKind::Image)
            .filter(|generator| generator.can_convert(media))
        else {
            tracing::debug!(media_id = %media.id, "Original is not an image, skipping responsive images");
            return Ok(());
        };

        let work_dir = self.scratch_directory()?;
        let copied_original = self
            .filesystem
            .copy_from_media_library(media, &work_dir.path().join(scratch_name(media)))
            .await?;
        let still = generator
            .convert(&copied_original, None)
            .await
            .map_err(|e| MediaLibraryError::MediaConversion(format!("{:#}", e)))?;

        self.store_responsive_images(media, &still, RESPONSIVE_ORIGINAL_CONVERSION)
            .await?;

        self.events
            .dispatch(MediaLibraryEvent::ResponsiveImagesGenerated {
                media: media.clone(),
            });
        Ok(())
    }

    async fn store_responsive_images(
        &self,
        media: &mut Media,
        image_file: &Path,
        conversion_name: &str,
    ) -> MediaLibraryResult<()> {
        let Some(generator) = self.responsive.clone() else {
            tracing::debug!(
                media_id = %media.id,
                conversion = %conversion_name,
                "No responsive image generator configured, skipping"
            );
            return Ok(());
        };

        self.filesystem
            .remove_responsive_images(media, conversion_name)
            .await?;

        let output_dir = image_file
            .parent()
            .map(|dir| dir.join(format!("responsive-{}", conversion_name)))
            .unwrap_or_else(|| PathBuf::from(format!("responsive-{}", conversion_name)));
        fs::create_dir_all(&output_dir).await?;

        let variants = generator
            .generate(media, image_file, conversion_name, &output_dir)
            .await
            .map_err(|e| MediaLibraryError::ImageProcessing(format!("{:#}", e)))?;

        let disk_name = media.conversions_disk.clone();
        let disk = self.filesystem.disk(&disk_name)?;
        let mut images = Vec::with_capacity(variants.len());
        for variant in variants {
            let file_name = variant
                .path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let key = self
                .filesystem
                .copy_to_media_library(
                    &variant.path,
                    media,
                    FileKind::ResponsiveImage,
                    &file_name,
                    &disk_name,
                )
                .await?;
            images.push(ResponsiveImage {
                url: disk.url(&key),
                file_name,
                width: variant.width,
                height: variant.height,
            });
        }

        tracing::info!(
            media_id = %media.id,
            conversion = %conversion_name,
            variants = images.len(),
            "Responsive images stored"
        );

        let conversion_name = conversion_name.to_string();
        self.update_media(media, move |fresh| {
            fresh.responsive_images.insert(
                conversion_name,
                ResponsiveImageSet {
                    images,
                    placeholder: None,
                },
            );
        })
        .await
    }

    /// Apply `change` to the stored record and refresh `media` from the result.
    ///
    /// Working on the stored copy keeps flags written by concurrent jobs.
    async fn update_media<F>(&self, media: &mut Media, change: F) -> MediaLibraryResult<()>
    where
        F: FnOnce(&mut Media),
    {
        let mut fresh = self
            .repository
            .find(media.id)
            .await?
            .unwrap_or_else(|| media.clone());
        change(&mut fresh);
        fresh.touch();
        *media = self.repository.save(&fresh).await?;
        Ok(())
    }

    fn scratch_directory(&self) -> MediaLibraryResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("medialib-");
        let dir = match &self.temporary_directory {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

impl std::fmt::Debug for FileManipulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManipulator")
            .field("generators", &self.generators)
            .field("responsive", &self.responsive.is_some())
            .field("temporary_directory", &self.temporary_directory)
            .finish()
    }
}

fn scratch_name(media: &Media) -> String {
    let extension = media.extension();
    let stem = Uuid::new_v4().simple().to_string();
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}
