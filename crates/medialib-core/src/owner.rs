//! Owning records and their registration hooks.
//!
//! An owner is any application record that media can be attached to. Owners
//! declare collections and conversions through [`MediaRegistrar`], and are
//! registered by model type in an [`OwnerRegistry`] so a stored `Media` can be
//! traced back to the hooks of the record it belongs to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::conversions::ConversionRegistry;
use crate::models::{FileSource, Media, MediaCollectionRegistry, OwnerRef};

/// Collection and conversion registration hooks.
pub trait MediaRegistrar: Send + Sync {
    fn register_media_collections(&self, _collections: &mut MediaCollectionRegistry) {}

    fn register_media_conversions(&self, _media: &Media, _conversions: &mut ConversionRegistry) {}

    fn media_collections(&self) -> MediaCollectionRegistry {
        let mut collections = MediaCollectionRegistry::new();
        self.register_media_collections(&mut collections);
        collections
    }
}

/// Registrar without collections or conversions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMediaRegistrar;

impl MediaRegistrar for DefaultMediaRegistrar {}

/// A record that media can be attached to.
pub trait HasMedia: MediaRegistrar {
    fn model_type(&self) -> &str;

    /// `None` while the record has not been saved yet.
    fn model_key(&self) -> Option<String>;

    fn exists(&self) -> bool {
        self.model_key().is_some()
    }

    /// Attachments waiting for this record to be saved.
    fn unattached_media(&self) -> &UnattachedMedia;

    fn owner_ref(&self) -> Option<OwnerRef> {
        self.model_key()
            .map(|model_key| OwnerRef::new(self.model_type(), model_key))
    }
}

/// A media record parked until its owner exists.
#[derive(Debug, Clone)]
pub struct PendingAttachment {
    pub media: Media,
    pub source: FileSource,
    pub preserve_original: bool,
}

/// Queue of attachments added to an owner before it was saved.
#[derive(Debug, Default)]
pub struct UnattachedMedia {
    items: Mutex<Vec<PendingAttachment>>,
}

impl UnattachedMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, attachment: PendingAttachment) {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(attachment);
    }

    /// Remove and return every parked attachment in insertion order.
    pub fn take(&self) -> Vec<PendingAttachment> {
        std::mem::take(
            &mut *self
                .items
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owners reachable by model type.
#[derive(Clone, Default)]
pub struct OwnerRegistry {
    owners: Arc<RwLock<HashMap<String, Arc<dyn HasMedia>>>>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, owner: Arc<dyn HasMedia>) {
        let model_type = owner.model_type().to_string();
        self.owners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(model_type, owner);
    }

    pub fn get(&self, model_type: &str) -> Option<Arc<dyn HasMedia>> {
        self.owners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(model_type)
            .cloned()
    }

    /// Owner hooks for the record `media` is attached to, if its type is registered.
    pub fn for_media(&self, media: &Media) -> Option<Arc<dyn HasMedia>> {
        media
            .model_type
            .as_deref()
            .and_then(|model_type| self.get(model_type))
    }

    pub fn model_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .owners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for OwnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerRegistry")
            .field("model_types", &self.model_types())
            .finish()
    }
}
