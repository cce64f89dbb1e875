use std::fmt;
use std::sync::Arc;

use crate::conversions::ConversionRegistry;
use crate::models::media::Media;
use crate::models::pending_file::PendingFile;
use crate::owner::HasMedia;

pub type AcceptsFileFn = dyn Fn(&PendingFile, Option<&dyn HasMedia>) -> bool + Send + Sync;
pub type ConversionRegistrationFn = dyn Fn(&Media, &mut ConversionRegistry) + Send + Sync;

/// Declarative definition of a named collection.
#[derive(Clone)]
pub struct MediaCollection {
    pub name: String,
    pub disk_name: Option<String>,
    pub conversions_disk_name: Option<String>,
    pub collection_size_limit: Option<usize>,
    pub generate_responsive_images: bool,
    accepts_mime_types: Vec<String>,
    accepts_file: Option<Arc<AcceptsFileFn>>,
    conversion_registrations: Option<Arc<ConversionRegistrationFn>>,
}

impl MediaCollection {
    pub fn create(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disk_name: None,
            conversions_disk_name: None,
            collection_size_limit: None,
            generate_responsive_images: false,
            accepts_mime_types: Vec::new(),
            accepts_file: None,
            conversion_registrations: None,
        }
    }

    pub fn use_disk(mut self, disk_name: impl Into<String>) -> Self {
        self.disk_name = Some(disk_name.into());
        self
    }

    pub fn store_conversions_on_disk(mut self, disk_name: impl Into<String>) -> Self {
        self.conversions_disk_name = Some(disk_name.into());
        self
    }

    pub fn accepts_file<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PendingFile, Option<&dyn HasMedia>) -> bool + Send + Sync + 'static,
    {
        self.accepts_file = Some(Arc::new(predicate));
        self
    }

    pub fn accepts_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepts_mime_types = mime_types
            .into_iter()
            .map(|mime| mime.into().to_lowercase())
            .collect();
        self
    }

    pub fn single_file(self) -> Self {
        self.only_keep_latest(1)
    }

    pub fn only_keep_latest(mut self, maximum_number_of_items: usize) -> Self {
        self.collection_size_limit = Some(maximum_number_of_items);
        self
    }

    pub fn with_responsive_images(mut self) -> Self {
        self.generate_responsive_images = true;
        self
    }

    pub fn register_media_conversions<F>(mut self, registration: F) -> Self
    where
        F: Fn(&Media, &mut ConversionRegistry) + Send + Sync + 'static,
    {
        self.conversion_registrations = Some(Arc::new(registration));
        self
    }

    /// Run this collection's conversion registration callback, if any.
    pub fn register_conversions(&self, media: &Media, registry: &mut ConversionRegistry) {
        if let Some(registration) = &self.conversion_registrations {
            registration(media, registry);
        }
    }

    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        self.accepts_mime_types.is_empty()
            || self
                .accepts_mime_types
                .iter()
                .any(|accepted| accepted.eq_ignore_ascii_case(mime_type))
    }

    pub fn accepts_pending_file(&self, file: &PendingFile, owner: Option<&dyn HasMedia>) -> bool {
        match &self.accepts_file {
            Some(predicate) => predicate(file, owner),
            None => true,
        }
    }

    /// Predicate and mime gate combined.
    pub fn accepts(&self, file: &PendingFile, owner: Option<&dyn HasMedia>) -> bool {
        self.accepts_pending_file(file, owner) && self.accepts_mime(&file.mime_type)
    }
}

impl fmt::Debug for MediaCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCollection")
            .field("name", &self.name)
            .field("disk_name", &self.disk_name)
            .field("conversions_disk_name", &self.conversions_disk_name)
            .field("collection_size_limit", &self.collection_size_limit)
            .field("generate_responsive_images", &self.generate_responsive_images)
            .field("accepts_mime_types", &self.accepts_mime_types)
            .finish_non_exhaustive()
    }
}

/// Collections registered by one registrar, unique by name.
///
/// Registering a name twice replaces the earlier definition in place.
#[derive(Debug, Clone, Default)]
pub struct MediaCollectionRegistry {
    collections: Vec<MediaCollection>,
}

impl MediaCollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_media_collection(&mut self, collection: MediaCollection) {
        match self
            .collections
            .iter_mut()
            .find(|existing| existing.name == collection.name)
        {
            Some(existing) => *existing = collection,
            None => self.collections.push(collection),
        }
    }

    /// Merge `other` into this registry; same-named entries from `other` win.
    pub fn merge(&mut self, other: MediaCollectionRegistry) {
        for collection in other.collections {
            self.add_media_collection(collection);
        }
    }

    pub fn get(&self, name: &str) -> Option<&MediaCollection> {
        self.collections.iter().find(|collection| collection.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaCollection> {
        self.collections.iter()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
