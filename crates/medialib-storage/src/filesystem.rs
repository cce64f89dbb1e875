//! Media-aware file operations across named disks.
//!
//! Where a file lives is decided here: the original goes to `media.disk` under
//! the path generator's directory, derived files go to the conversion's disk
//! (or `media.conversions_disk`) under the conversions directory.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use medialib_core::{
    ConversionFileNamer, Conversion, Media, MediaLibraryError, MediaLibraryResult, PathGenerator,
};
use medialib_core::models::RemoteFile;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::StreamReader;

use crate::factory::DiskManager;
use crate::traits::{ByteStream, Storage, StorageError};

/// Which directory of a media item a file belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Original,
    Conversion,
    ResponsiveImage,
}

#[derive(Clone)]
pub struct Filesystem {
    disks: DiskManager,
    path_generator: Arc<dyn PathGenerator>,
    file_namer: Arc<dyn ConversionFileNamer>,
}

impl Filesystem {
    pub fn new(
        disks: DiskManager,
        path_generator: Arc<dyn PathGenerator>,
        file_namer: Arc<dyn ConversionFileNamer>,
    ) -> Self {
        Self {
            disks,
            path_generator,
            file_namer,
        }
    }

    pub fn disks(&self) -> &DiskManager {
        &self.disks
    }

    pub fn disk(&self, name: &str) -> MediaLibraryResult<Arc<dyn Storage>> {
        Ok(self.disks.disk(name)?)
    }

    pub fn path_generator(&self) -> &Arc<dyn PathGenerator> {
        &self.path_generator
    }

    pub fn file_namer(&self) -> &Arc<dyn ConversionFileNamer> {
        &self.file_namer
    }

    // -- keys

    pub fn original_key(&self, media: &Media) -> String {
        format!("{}{}", self.path_generator.get_path(media), media.file_name)
    }

    pub fn conversion_file_name(&self, media: &Media, conversion: &Conversion) -> String {
        self.file_namer.conversion_file(conversion, media)
    }

    pub fn conversion_key(&self, media: &Media, conversion: &Conversion) -> String {
        format!(
            "{}{}",
            self.path_generator.get_path_for_conversions(media),
            self.conversion_file_name(media, conversion)
        )
    }

    /// Disk a conversion is stored on: its own override, else the media's conversions disk.
    pub fn conversion_disk_name<'a>(&self, media: &'a Media, conversion: &'a Conversion) -> &'a str {
        conversion.disk_name().unwrap_or(&media.conversions_disk)
    }

    fn directory_for(&self, media: &Media, kind: FileKind) -> String {
        match kind {
            FileKind::Original => self.path_generator.get_path(media),
            FileKind::Conversion => self.path_generator.get_path_for_conversions(media),
            FileKind::ResponsiveImage => self.path_generator.get_path_for_responsive_images(media),
        }
    }

    // -- writes

    /// Store a local file as the original of `media`.
    pub async fn add(
        &self,
        local_path: &Path,
        media: &Media,
        target_file_name: Option<&str>,
    ) -> MediaLibraryResult<String> {
        let file_name = target_file_name.unwrap_or(&media.file_name);
        self.copy_to_media_library(local_path, media, FileKind::Original, file_name, &media.disk)
            .await
    }

    /// Stream a file from another disk into the original slot of `media`.
    pub async fn add_remote(
        &self,
        remote: &RemoteFile,
        media: &Media,
        target_file_name: Option<&str>,
    ) -> MediaLibraryResult<String> {
        let source = self.disk(&remote.disk)?;
        let target = self.disk(&media.disk)?;
        let key = format!(
            "{}{}",
            self.directory_for(media, FileKind::Original),
            target_file_name.unwrap_or(&media.file_name)
        );

        let content_type = source.content_type(&remote.key).await?;
        let stream = source.download_stream(&remote.key).await?;
        let size = target
            .upload_stream(&key, &content_type, stream_to_reader(stream))
            .await?;

        tracing::info!(
            media_id = %media.id,
            disk = %media.disk,
            source_disk = %remote.disk,
            key = %key,
            size_bytes = size,
            "Remote file copied into media library"
        );

        Ok(key)
    }

    /// Store a local file in one of `media`'s directories on `disk_name`.
    pub async fn copy_to_media_library(
        &self,
        local_path: &Path,
        media: &Media,
        kind: FileKind,
        target_file_name: &str,
        disk_name: &str,
    ) -> MediaLibraryResult<String> {
        let disk = self.disk(disk_name)?;
        let key = format!("{}{}", self.directory_for(media, kind), target_file_name);
        let content_type = match kind {
            FileKind::Original => media.mime_type.clone(),
            _ => None,
        }
        .unwrap_or_else(|| {
            mime_guess::from_path(target_file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let file = fs::File::open(local_path).await.map_err(|e| {
            MediaLibraryError::Storage(format!(
                "Failed to open {}: {}",
                local_path.display(),
                e
            ))
        })?;
        let start = std::time::Instant::now();
        let size = disk
            .upload_stream(&key, &content_type, Box::pin(file))
            .await?;

        tracing::info!(
            media_id = %media.id,
            disk = %disk_name,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored file in media library"
        );

        Ok(key)
    }

    /// Write the original of `media` to `destination` on the local filesystem.
    pub async fn copy_from_media_library(
        &self,
        media: &Media,
        destination: &Path,
    ) -> MediaLibraryResult<PathBuf> {
        let mut stream = self.get_stream(media).await?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(destination).await?;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        Ok(destination.to_path_buf())
    }

    /// Copy the original of `from` into the original slot of `to`, across disks if needed.
    pub async fn copy_original(&self, from: &Media, to: &Media) -> MediaLibraryResult<String> {
        let target = self.disk(&to.disk)?;
        let key = self.original_key(to);
        let content_type = to
            .mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let stream = self.get_stream(from).await?;
        target
            .upload_stream(&key, &content_type, stream_to_reader(stream))
            .await?;
        Ok(key)
    }

    pub async fn get_stream(&self, media: &Media) -> MediaLibraryResult<ByteStream> {
        let disk = self.disk(&media.disk)?;
        Ok(disk.download_stream(&self.original_key(media)).await?)
    }

    // -- removal

    /// Delete the original and every derived file of `media`.
    ///
    /// `conversions` are the ones resolved for `media`; their disk overrides
    /// are cleared along with the media's own disks.
    pub async fn remove_all_files(
        &self,
        media: &Media,
        conversions: &[&Conversion],
    ) -> MediaLibraryResult<()> {
        let media_disk = self.disk(&media.disk)?;
        media_disk
            .delete_prefix(&self.path_generator.get_path(media))
            .await?;

        let conversions_directory = self.path_generator.get_path_for_conversions(media);
        let conversions_disk = self.disk(&media.conversions_disk)?;
        conversions_disk.delete_prefix(&conversions_directory).await?;
        conversions_disk
            .delete_prefix(&self.path_generator.get_path_for_responsive_images(media))
            .await?;

        let mut override_disks: Vec<&str> = conversions
            .iter()
            .map(|conversion| self.conversion_disk_name(media, conversion))
            .filter(|name| *name != media.conversions_disk)
            .collect();
        override_disks.sort_unstable();
        override_disks.dedup();
        for name in &override_disks {
            self.disk(name)?.delete_prefix(&conversions_directory).await?;
        }

        tracing::info!(
            media_id = %media.id,
            disk = %media.disk,
            conversions_disk = %media.conversions_disk,
            override_disks = ?override_disks,
            "Removed all media files"
        );
        Ok(())
    }

    pub async fn remove_conversion(
        &self,
        media: &Media,
        conversion: &Conversion,
    ) -> MediaLibraryResult<()> {
        let disk = self.disk(self.conversion_disk_name(media, conversion))?;
        disk.delete(&self.conversion_key(media, conversion)).await?;
        Ok(())
    }

    /// Delete the responsive variants generated for `conversion_name`.
    pub async fn remove_responsive_images(
        &self,
        media: &Media,
        conversion_name: &str,
    ) -> MediaLibraryResult<()> {
        let disk = self.disk(&media.conversions_disk)?;
        let directory = self.path_generator.get_path_for_responsive_images(media);

        for key in disk.list(&directory).await? {
            let file_name = key.rsplit('/').next().unwrap_or(&key);
            if responsive_conversion_name(file_name) == Some(conversion_name) {
                disk.delete(&key).await?;
            }
        }
        Ok(())
    }

    // -- lookups

    pub async fn conversion_exists(
        &self,
        media: &Media,
        conversion: &Conversion,
    ) -> MediaLibraryResult<bool> {
        let disk = self.disk(self.conversion_disk_name(media, conversion))?;
        Ok(disk.exists(&self.conversion_key(media, conversion)).await?)
    }

    /// Rename the original and derived files after `media.file_name` changed.
    pub async fn sync_file_names(
        &self,
        media: &Media,
        previous_file_name: &str,
        conversions: &[&Conversion],
    ) -> MediaLibraryResult<()> {
        if previous_file_name == media.file_name {
            return Ok(());
        }

        let mut previous = media.clone();
        previous.file_name = previous_file_name.to_string();

        let media_disk = self.disk(&media.disk)?;
        media_disk
            .rename(&self.original_key(&previous), &self.original_key(media))
            .await?;

        for conversion in conversions {
            let disk = self.disk(self.conversion_disk_name(media, conversion))?;
            let old_key = self.conversion_key(&previous, conversion);
            let new_key = self.conversion_key(media, conversion);
            if old_key == new_key {
                continue;
            }
            match disk.rename(&old_key, &new_key).await {
                Ok(()) => {}
                Err(StorageError::NotFound(_)) => {
                    tracing::debug!(
                        media_id = %media.id,
                        conversion = %conversion.name(),
                        "Conversion file missing, nothing to rename"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    /// Local path of the original or a conversion, or its key on disks without paths.
    pub fn path(&self, media: &Media, conversion: Option<&Conversion>) -> MediaLibraryResult<String> {
        let (disk, key) = self.locate(media, conversion)?;
        Ok(disk
            .local_path(&key)
            .map(|path| path.display().to_string())
            .unwrap_or(key))
    }

    pub fn url(&self, media: &Media, conversion: Option<&Conversion>) -> MediaLibraryResult<String> {
        let (disk, key) = self.locate(media, conversion)?;
        Ok(disk.url(&key))
    }

    fn locate(
        &self,
        media: &Media,
        conversion: Option<&Conversion>,
    ) -> MediaLibraryResult<(Arc<dyn Storage>, String)> {
        match conversion {
            Some(conversion) => Ok((
                self.disk(self.conversion_disk_name(media, conversion))?,
                self.conversion_key(media, conversion),
            )),
            None => Ok((self.disk(&media.disk)?, self.original_key(media))),
        }
    }
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("disks", &self.disks)
            .finish_non_exhaustive()
    }
}

fn stream_to_reader(stream: ByteStream) -> Pin<Box<dyn AsyncRead + Send + Unpin>> {
    let stream = stream.map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
    Box::pin(StreamReader::new(stream))
}

/// Conversion name encoded in a `{stem}___{conversion}_{width}_{height}.{ext}` file name.
fn responsive_conversion_name(file_name: &str) -> Option<&str> {
    let base = file_name.rsplit_once('.').map_or(file_name, |(base, _)| base);
    let mut parts = base.rsplitn(3, '_');
    let height = parts.next()?;
    let width = parts.next()?;
    let rest = parts.next()?;
    if height.parse::<u32>().is_err() || width.parse::<u32>().is_err() {
        return None;
    }
    rest.rsplit_once("___").map(|(_, name)| name)
}
