use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{GENERATED_CONVERSIONS_KEY, GENERATE_RESPONSIVE_IMAGES_KEY};
use crate::models::manipulations::ManipulationOverrides;
use crate::models::properties::{HasCustomProperties, PropertyBag};

/// Reference to the record a media item is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub model_type: String,
    pub model_key: String,
}

impl OwnerRef {
    pub fn new(model_type: impl Into<String>, model_key: impl Into<String>) -> Self {
        Self {
            model_type: model_type.into(),
            model_key: model_key.into(),
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model_type, self.model_key)
    }
}

/// One generated responsive variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveImage {
    pub file_name: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Responsive variants generated for the original or one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveImageSet {
    pub images: Vec<ResponsiveImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl ResponsiveImageSet {
    pub fn urls(&self) -> Vec<&str> {
        self.images.iter().map(|image| image.url.as_str()).collect()
    }
}

/// Persisted record of an attached file and its conversion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: Uuid,
    pub model_type: Option<String>,
    pub model_key: Option<String>,
    pub collection_name: String,
    pub name: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub disk: String,
    pub conversions_disk: String,
    pub size: u64,
    #[serde(default)]
    pub manipulations: ManipulationOverrides,
    #[serde(default)]
    pub custom_properties: PropertyBag,
    #[serde(default)]
    pub responsive_images: BTreeMap<String, ResponsiveImageSet>,
    pub order_column: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    pub fn new(
        collection_name: impl Into<String>,
        file_name: impl Into<String>,
        disk: impl Into<String>,
        conversions_disk: impl Into<String>,
    ) -> Self {
        let file_name = file_name.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            model_type: None,
            model_key: None,
            collection_name: collection_name.into(),
            name: file_stem(&file_name).to_string(),
            file_name,
            mime_type: None,
            disk: disk.into(),
            conversions_disk: conversions_disk.into(),
            size: 0,
            manipulations: ManipulationOverrides::new(),
            custom_properties: PropertyBag::new(),
            responsive_images: BTreeMap::new(),
            order_column: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Lowercased extension of `file_name`, empty when it has none.
    pub fn extension(&self) -> String {
        file_extension(&self.file_name).to_lowercase()
    }

    pub fn owner(&self) -> Option<OwnerRef> {
        match (&self.model_type, &self.model_key) {
            (Some(model_type), Some(model_key)) => Some(OwnerRef::new(model_type, model_key)),
            _ => None,
        }
    }

    pub fn has_owner(&self) -> bool {
        self.owner().is_some()
    }

    pub fn set_owner(&mut self, owner: Option<&OwnerRef>) {
        self.model_type = owner.map(|o| o.model_type.clone());
        self.model_key = owner.map(|o| o.model_key.clone());
    }

    pub fn has_generated_conversion(&self, conversion_name: &str) -> bool {
        self.custom_properties
            .get_as::<bool>(&generated_conversion_path(conversion_name))
            .unwrap_or(false)
    }

    pub fn mark_as_conversion_generated(&mut self, conversion_name: &str, generated: bool) {
        self.custom_properties
            .set(&generated_conversion_path(conversion_name), generated);
        self.touch();
    }

    /// Conversion name to completion flag.
    pub fn generated_conversions(&self) -> BTreeMap<String, bool> {
        self.custom_properties
            .get(GENERATED_CONVERSIONS_KEY)
            .and_then(|value| value.as_object())
            .map(|map| {
                map.iter()
                    .map(|(name, flag)| (name.clone(), flag.as_bool().unwrap_or(false)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn responsive_images_for(&self, conversion_name: &str) -> Option<&ResponsiveImageSet> {
        self.responsive_images.get(conversion_name)
    }

    pub fn should_generate_responsive_images(&self) -> bool {
        self.custom_properties
            .get_as::<bool>(GENERATE_RESPONSIVE_IMAGES_KEY)
            .unwrap_or(false)
    }

    pub fn set_generate_responsive_images(&mut self, generate: bool) {
        self.custom_properties
            .set(GENERATE_RESPONSIVE_IMAGES_KEY, generate);
    }

    pub fn has_responsive_images(&self) -> bool {
        !self.responsive_images.is_empty()
    }

    pub fn human_readable_size(&self) -> String {
        human_readable_size(self.size)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl HasCustomProperties for Media {
    fn custom_properties(&self) -> &PropertyBag {
        &self.custom_properties
    }

    fn custom_properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.custom_properties
    }
}

fn generated_conversion_path(conversion_name: &str) -> String {
    format!("{}.{}", GENERATED_CONVERSIONS_KEY, conversion_name)
}

pub fn file_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => extension,
        _ => "",
    }
}

pub fn file_stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Format a byte count as `"1.5 KB"`.
pub fn human_readable_size(size_in_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if size_in_bytes == 0 {
        return "0 B".to_string();
    }

    let mut power = 0;
    while power < UNITS.len() - 1 && size_in_bytes >= 1024u64.pow(power as u32 + 1) {
        power += 1;
    }
    let value = size_in_bytes as f64 / 1024f64.powi(power as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[power])
}

/// Ordered list of media, as returned by collection queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaList(Vec<Media>);

impl MediaList {
    pub fn new(items: Vec<Media>) -> Self {
        Self(items)
    }

    pub fn total_size_in_bytes(&self) -> u64 {
        self.0.iter().map(|media| media.size).sum()
    }

    pub fn first(&self) -> Option<&Media> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Media> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Media> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Media> {
        self.0
    }
}

impl IntoIterator for MediaList {
    type Item = Media;
    type IntoIter = std::vec::IntoIter<Media>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Media>> for MediaList {
    fn from(items: Vec<Media>) -> Self {
        Self(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media() -> Media {
        Media::new("images", "Holiday Photo.JPG", "public", "public")
    }

    #[test]
    fn derives_name_and_extension() {
        let media = media();
        assert_eq!(media.name, "Holiday Photo");
        assert_eq!(media.extension(), "jpg");
        assert_eq!(file_extension(".env"), "");
        assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
    }

    #[test]
    fn tracks_generated_conversions() {
        let mut media = media();
        assert!(!media.has_generated_conversion("thumb"));

        media.mark_as_conversion_generated("thumb", true);
        media.mark_as_conversion_generated("preview", false);

        assert!(media.has_generated_conversion("thumb"));
        assert!(!media.has_generated_conversion("preview"));
        assert_eq!(
            media.custom_properties.get("generated_conversions"),
            Some(&json!({"thumb": true, "preview": false}))
        );
        assert_eq!(media.generated_conversions().len(), 2);
    }

    #[test]
    fn custom_property_proxies() {
        let mut media = media();
        media.set_custom_property("photographer.name", "Ada");
        assert!(media.has_custom_property("photographer.name"));
        assert_eq!(
            media.get_custom_property("photographer.name"),
            Some(&json!("Ada"))
        );
        media.forget_custom_property("photographer.name");
        assert!(!media.has_custom_property("photographer.name"));
    }

    #[test]
    fn owner_round_trip() {
        let mut media = media();
        assert!(!media.has_owner());
        media.set_owner(Some(&OwnerRef::new("post", "7")));
        assert_eq!(media.owner(), Some(OwnerRef::new("post", "7")));
        media.set_owner(None);
        assert!(media.owner().is_none());
    }

    #[test]
    fn human_readable_sizes() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(512), "512 B");
        assert_eq!(human_readable_size(1536), "1.5 KB");
        assert_eq!(human_readable_size(10 * 1024 * 1024), "10 MB");
    }

    #[test]
    fn total_size_sums_items() {
        let mut a = media();
        a.size = 100;
        let mut b = media();
        b.size = 250;
        assert_eq!(MediaList::new(vec![a, b]).total_size_in_bytes(), 350);
    }
}
