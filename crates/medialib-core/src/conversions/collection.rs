use crate::constants::WILDCARD_CONVERSION;
use crate::conversions::file_namer::ConversionFileNamer;
use crate::conversions::registry::register_all_media_conversions;
use crate::error::{MediaLibraryError, MediaLibraryResult};
use crate::models::{Conversion, Media};
use crate::owner::{HasMedia, MediaRegistrar};

/// Every conversion that applies to one media item, in resolution order.
///
/// Built from scratch on each call to [`ConversionCollection::create_for_media`]:
/// the media-level registrar first, then the owner's registrar appended without
/// de-duplication, then the media's stored manipulations prepended.
#[derive(Debug, Clone)]
pub struct ConversionCollection {
    media: Media,
    conversions: Vec<Conversion>,
}

impl ConversionCollection {
    pub fn create_for_media(
        media: &Media,
        registrar: &dyn MediaRegistrar,
        owner: Option<&dyn HasMedia>,
        queue_conversions_by_default: bool,
    ) -> Self {
        let mut conversions = register_all_media_conversions(registrar, media).into_vec();

        if media.has_owner() {
            if let Some(owner) = owner {
                conversions.extend(register_all_media_conversions(owner, media).into_vec());
            }
        }

        for conversion in conversions.iter_mut() {
            conversion.apply_queue_default(queue_conversions_by_default);
        }

        let mut collection = Self {
            media: media.clone(),
            conversions,
        };
        collection.add_manipulations_from_media();
        collection
    }

    fn add_manipulations_from_media(&mut self) {
        let collection_name = self.media.collection_name.clone();

        for entry in self.media.manipulations.iter() {
            if let Some(conversion) = self.conversions.iter_mut().find(|conversion| {
                conversion.name() == entry.conversion
                    && conversion.should_be_performed_on(&collection_name)
            }) {
                conversion.add_as_first_manipulations(&entry.manipulations);
            }

            if entry.conversion == WILDCARD_CONVERSION {
                for conversion in self.conversions.iter_mut() {
                    conversion.add_as_first_manipulations(&entry.manipulations);
                }
            }
        }
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    pub fn get_by_name(&self, name: &str) -> MediaLibraryResult<&Conversion> {
        self.conversions
            .iter()
            .find(|conversion| conversion.name() == name)
            .ok_or_else(|| MediaLibraryError::InvalidConversion(name.to_string()))
    }

    /// Conversions that apply to `collection_name`; all of them for `""`.
    pub fn get_conversions(&self, collection_name: &str) -> Vec<&Conversion> {
        self.conversions
            .iter()
            .filter(|conversion| {
                collection_name.is_empty() || conversion.should_be_performed_on(collection_name)
            })
            .collect()
    }

    pub fn get_queued_conversions(&self, collection_name: &str) -> Vec<&Conversion> {
        self.get_conversions(collection_name)
            .into_iter()
            .filter(|conversion| conversion.should_be_queued())
            .collect()
    }

    pub fn get_non_queued_conversions(&self, collection_name: &str) -> Vec<&Conversion> {
        self.get_conversions(collection_name)
            .into_iter()
            .filter(|conversion| !conversion.should_be_queued())
            .collect()
    }

    /// Derived file names for the conversions that apply to `collection_name`.
    pub fn get_conversions_files(
        &self,
        collection_name: &str,
        namer: &dyn ConversionFileNamer,
    ) -> Vec<String> {
        self.get_conversions(collection_name)
            .into_iter()
            .map(|conversion| namer.conversion_file(conversion, &self.media))
            .collect()
    }

    pub fn conversion_names(&self) -> Vec<String> {
        self.conversions
            .iter()
            .map(|conversion| conversion.name().to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversion> {
        self.conversions.iter()
    }

    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }

    pub fn into_vec(self) -> Vec<Conversion> {
        self.conversions
    }
}
