use std::sync::Arc;

use crate::conversions::collection::ConversionCollection;
use crate::models::{Media, MediaCollection, MediaCollectionRegistry};
use crate::owner::{HasMedia, MediaRegistrar, OwnerRegistry};

/// Resolves the collection and conversion definitions that apply to a stored media item.
///
/// The owner is looked up by the media's model type in the [`OwnerRegistry`];
/// media whose owner type is not registered only see the library registrar.
#[derive(Clone)]
pub struct ConversionResolver {
    registrar: Arc<dyn MediaRegistrar>,
    owners: OwnerRegistry,
    queue_conversions_by_default: bool,
}

impl ConversionResolver {
    pub fn new(
        registrar: Arc<dyn MediaRegistrar>,
        owners: OwnerRegistry,
        queue_conversions_by_default: bool,
    ) -> Self {
        Self {
            registrar,
            owners,
            queue_conversions_by_default,
        }
    }

    pub fn registrar(&self) -> &Arc<dyn MediaRegistrar> {
        &self.registrar
    }

    pub fn owners(&self) -> &OwnerRegistry {
        &self.owners
    }

    pub fn queue_conversions_by_default(&self) -> bool {
        self.queue_conversions_by_default
    }

    pub fn owner_for(&self, media: &Media) -> Option<Arc<dyn HasMedia>> {
        self.owners.for_media(media)
    }

    pub fn conversion_collection(&self, media: &Media) -> ConversionCollection {
        let owner = self.owner_for(media);
        ConversionCollection::create_for_media(
            media,
            self.registrar.as_ref(),
            owner.as_deref(),
            self.queue_conversions_by_default,
        )
    }

    /// Collections visible to `owner`: the library registrar's, overridden by the owner's.
    pub fn media_collections(&self, owner: Option<&dyn HasMedia>) -> MediaCollectionRegistry {
        let mut collections = self.registrar.media_collections();
        if let Some(owner) = owner {
            collections.merge(owner.media_collections());
        }
        collections
    }

    /// Definition of the collection `media` is stored in, if one is registered.
    pub fn media_collection(&self, media: &Media) -> Option<MediaCollection> {
        let owner = self.owner_for(media);
        self.media_collections(owner.as_deref())
            .get(&media.collection_name)
            .cloned()
    }
}

impl std::fmt::Debug for ConversionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionResolver")
            .field("owners", &self.owners)
            .field(
                "queue_conversions_by_default",
                &self.queue_conversions_by_default,
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::ConversionRegistry;
    use crate::models::{Conversion, OwnerRef};
    use crate::owner::UnattachedMedia;

    struct Library;

    impl MediaRegistrar for Library {
        fn register_media_collections(&self, collections: &mut MediaCollectionRegistry) {
            collections.add_media_collection(MediaCollection::create("images").single_file());
        }

        fn register_media_conversions(&self, _media: &Media, conversions: &mut ConversionRegistry) {
            conversions.add_media_conversion(Conversion::new("preview"));
        }
    }

    struct Post {
        unattached: UnattachedMedia,
    }

    impl MediaRegistrar for Post {
        fn register_media_collections(&self, collections: &mut MediaCollectionRegistry) {
            collections.add_media_collection(MediaCollection::create("images").only_keep_latest(3));
        }

        fn register_media_conversions(&self, _media: &Media, conversions: &mut ConversionRegistry) {
            conversions.add_media_conversion(Conversion::new("thumb").non_queued());
        }
    }

    impl HasMedia for Post {
        fn model_type(&self) -> &str {
            "post"
        }

        fn model_key(&self) -> Option<String> {
            Some("1".to_string())
        }

        fn unattached_media(&self) -> &UnattachedMedia {
            &self.unattached
        }
    }

    fn resolver() -> ConversionResolver {
        let owners = OwnerRegistry::new();
        owners.register(Arc::new(Post {
            unattached: UnattachedMedia::new(),
        }));
        ConversionResolver::new(Arc::new(Library), owners, true)
    }

    #[test]
    fn owner_conversions_follow_library_conversions() {
        let mut media = Media::new("images", "a.jpg", "public", "public");
        media.set_owner(Some(&OwnerRef::new("post", "1")));

        let collection = resolver().conversion_collection(&media);
        assert_eq!(collection.conversion_names(), vec!["preview", "thumb"]);
        assert!(collection.get_by_name("preview").unwrap().should_be_queued());
        assert!(!collection.get_by_name("thumb").unwrap().should_be_queued());
    }

    #[test]
    fn unregistered_owner_type_sees_library_only() {
        let mut media = Media::new("images", "a.jpg", "public", "public");
        media.set_owner(Some(&OwnerRef::new("comment", "1")));

        let collection = resolver().conversion_collection(&media);
        assert_eq!(collection.conversion_names(), vec!["preview"]);
        assert_eq!(
            resolver().media_collection(&media).unwrap().collection_size_limit,
            Some(1)
        );
    }

    #[test]
    fn owner_collection_overrides_library_collection() {
        let mut media = Media::new("images", "a.jpg", "public", "public");
        media.set_owner(Some(&OwnerRef::new("post", "1")));

        let collection = resolver().media_collection(&media).unwrap();
        assert_eq!(collection.collection_size_limit, Some(3));
    }
}
