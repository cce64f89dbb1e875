use crate::models::{Conversion, Media};
use crate::owner::MediaRegistrar;

/// Conversions registered by one registrar for one media item.
///
/// Names are unique within a registry: registering a name again replaces the
/// earlier definition and keeps its position.
#[derive(Debug, Clone, Default)]
pub struct ConversionRegistry {
    conversions: Vec<Conversion>,
}

impl ConversionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_media_conversion(&mut self, conversion: Conversion) -> &mut Conversion {
        let index = match self
            .conversions
            .iter()
            .position(|existing| existing.name() == conversion.name())
        {
            Some(index) => {
                self.conversions[index] = conversion;
                index
            }
            None => {
                self.conversions.push(conversion);
                self.conversions.len() - 1
            }
        };
        &mut self.conversions[index]
    }

    pub fn extend(&mut self, other: ConversionRegistry) {
        for conversion in other.conversions {
            self.add_media_conversion(conversion);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Conversion> {
        self.conversions.iter().find(|conversion| conversion.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversion> {
        self.conversions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Conversion> {
        self.conversions.iter_mut()
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

/// Run every registration hook of `registrar` for `media`.
///
/// Each collection callback runs against a fresh registry and its conversions
/// are restricted to that collection. The registrar's own
/// `register_media_conversions` runs last, unrestricted.
pub fn register_all_media_conversions<R>(registrar: &R, media: &Media) -> ConversionRegistry
where
    R: MediaRegistrar + ?Sized,
{
    let mut all = ConversionRegistry::new();

    for collection in registrar.media_collections().iter() {
        let mut prepared = ConversionRegistry::new();
        collection.register_conversions(media, &mut prepared);
        for conversion in prepared.iter_mut() {
            conversion.set_perform_on_collections([collection.name.clone()]);
        }
        all.extend(prepared);
    }

    let mut own = ConversionRegistry::new();
    registrar.register_media_conversions(media, &mut own);
    all.extend(own);

    all
}
