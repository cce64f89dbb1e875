use std::collections::BTreeMap;

use crate::constants::{DEFAULT_CONVERSION_FORMAT, KEEPABLE_IMAGE_FORMATS, WILDCARD_CONVERSION};
use crate::models::manipulations::{CropPosition, Fit, Manipulation, Manipulations};

/// Declarative recipe for one derived file.
///
/// Conversions are rebuilt on every resolution and never persisted. Only their
/// effects (the stored file and the `generated_conversions.<name>` flag) live on
/// the media record.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    name: String,
    manipulations: Manipulations,
    collection_manipulations: BTreeMap<String, Manipulations>,
    perform_on_collections: Vec<String>,
    queued: Option<bool>,
    disk_name: Option<String>,
    generate_responsive_images: bool,
    keep_original_image_format: bool,
    video_frame_second: f64,
    page_number: u32,
}

impl Conversion {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manipulations: Manipulations::new().with(Manipulation::Format {
                format: DEFAULT_CONVERSION_FORMAT.to_string(),
            }),
            collection_manipulations: BTreeMap::new(),
            perform_on_collections: Vec::new(),
            queued: None,
            disk_name: None,
            generate_responsive_images: false,
            keep_original_image_format: false,
            video_frame_second: 0.0,
            page_number: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -- manipulation chain

    /// Default chain, used for collections without an override.
    pub fn manipulations(&self) -> &Manipulations {
        &self.manipulations
    }

    /// Chain that applies to media in `collection_name`.
    pub fn manipulations_for(&self, collection_name: &str) -> &Manipulations {
        self.collection_manipulations
            .get(collection_name)
            .unwrap_or(&self.manipulations)
    }

    pub fn add_manipulation(mut self, step: Manipulation) -> Self {
        self.manipulations.push(step);
        self
    }

    pub fn set_manipulations(mut self, manipulations: Manipulations) -> Self {
        self.manipulations = manipulations;
        self
    }

    /// Override the chain for media stored in one collection.
    pub fn set_manipulations_for_collection(
        mut self,
        collection_name: impl Into<String>,
        manipulations: Manipulations,
    ) -> Self {
        self.collection_manipulations
            .insert(collection_name.into(), manipulations);
        self
    }

    pub fn without_manipulations(mut self) -> Self {
        self.manipulations = Manipulations::new();
        self.collection_manipulations.clear();
        self
    }

    /// Prepend `manipulations` to the default chain and every collection override.
    pub fn add_as_first_manipulations(&mut self, manipulations: &Manipulations) {
        self.manipulations.prepend(manipulations);
        for chain in self.collection_manipulations.values_mut() {
            chain.prepend(manipulations);
        }
    }

    pub fn width(self, width: u32) -> Self {
        self.add_manipulation(Manipulation::Width { width })
    }

    pub fn height(self, height: u32) -> Self {
        self.add_manipulation(Manipulation::Height { height })
    }

    pub fn fit(self, fit: Fit, width: u32, height: u32) -> Self {
        self.add_manipulation(Manipulation::Fit { fit, width, height })
    }

    pub fn crop(self, position: CropPosition, width: u32, height: u32) -> Self {
        self.add_manipulation(Manipulation::Crop {
            position,
            width,
            height,
        })
    }

    pub fn greyscale(self) -> Self {
        self.add_manipulation(Manipulation::Greyscale)
    }

    pub fn blur(self, amount: f32) -> Self {
        self.add_manipulation(Manipulation::Blur { amount })
    }

    pub fn sharpen(self, amount: f32) -> Self {
        self.add_manipulation(Manipulation::Sharpen { amount })
    }

    pub fn quality(self, quality: u8) -> Self {
        self.add_manipulation(Manipulation::Quality { quality })
    }

    /// Force the output extension.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.manipulations.set_format(format);
        self
    }

    // -- applicability

    pub fn perform_on_collections<I, S>(mut self, collection_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_perform_on_collections(collection_names);
        self
    }

    pub fn set_perform_on_collections<I, S>(&mut self, collection_names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.perform_on_collections = collection_names.into_iter().map(Into::into).collect();
    }

    pub fn performed_on_collections(&self) -> &[String] {
        &self.perform_on_collections
    }

    /// An empty collection filter or `*` means every collection.
    pub fn should_be_performed_on(&self, collection_name: &str) -> bool {
        if self.perform_on_collections.is_empty() {
            return true;
        }

        self.perform_on_collections
            .iter()
            .any(|name| name == WILDCARD_CONVERSION || name == collection_name)
    }

    // -- execution options

    pub fn queued(mut self) -> Self {
        self.queued = Some(true);
        self
    }

    pub fn non_queued(mut self) -> Self {
        self.queued = Some(false);
        self
    }

    /// Unset queue flags default to queued.
    pub fn should_be_queued(&self) -> bool {
        self.queued.unwrap_or(true)
    }

    pub(crate) fn apply_queue_default(&mut self, queued_by_default: bool) {
        if self.queued.is_none() {
            self.queued = Some(queued_by_default);
        }
    }

    pub fn use_disk(mut self, disk_name: impl Into<String>) -> Self {
        self.disk_name = Some(disk_name.into());
        self
    }

    pub fn disk_name(&self) -> Option<&str> {
        self.disk_name.as_deref()
    }

    pub fn with_responsive_images(mut self) -> Self {
        self.generate_responsive_images = true;
        self
    }

    pub fn should_generate_responsive_images(&self) -> bool {
        self.generate_responsive_images
    }

    pub fn keep_original_image_format(mut self) -> Self {
        self.keep_original_image_format = true;
        self
    }

    pub fn should_keep_original_image_format(&self) -> bool {
        self.keep_original_image_format
    }

    pub fn extract_video_frame_at_second(mut self, second: f64) -> Self {
        self.video_frame_second = second.max(0.0);
        self
    }

    pub fn video_frame_second(&self) -> f64 {
        self.video_frame_second
    }

    pub fn pdf_page_number(mut self, page_number: u32) -> Self {
        self.page_number = page_number.max(1);
        self
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Extension of the derived file for a source with `original_extension`
    /// stored in `collection_name`.
    pub fn result_extension(&self, original_extension: &str, collection_name: &str) -> String {
        if self.keep_original_image_format
            && KEEPABLE_IMAGE_FORMATS.contains(&original_extension.to_lowercase().as_str())
        {
            return original_extension.to_string();
        }

        match self.manipulations_for(collection_name).format() {
            Some(format) => format.to_string(),
            None => original_extension.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversion_outputs_jpg() {
        let conversion = Conversion::new("thumb");
        assert_eq!(conversion.result_extension("png", "default"), "jpg");
        assert!(conversion.should_be_queued());
        assert!(conversion.should_be_performed_on("anything"));
    }

    #[test]
    fn without_manipulations_keeps_source_extension() {
        let conversion = Conversion::new("thumb").without_manipulations();
        assert!(conversion.manipulations().is_empty());
        assert_eq!(conversion.result_extension("png", "default"), "png");
    }

    #[test]
    fn keep_original_format_only_for_known_images() {
        let conversion = Conversion::new("thumb").keep_original_image_format();
        assert_eq!(conversion.result_extension("png", "default"), "png");
        assert_eq!(conversion.result_extension("webm", "default"), "jpg");
    }

    #[test]
    fn collection_specific_chain_wins() {
        let conversion = Conversion::new("thumb").width(50).set_manipulations_for_collection(
            "banners",
            Manipulations::new().with(Manipulation::Format {
                format: "png".to_string(),
            }),
        );
        assert_eq!(conversion.result_extension("jpg", "banners"), "png");
        assert_eq!(conversion.result_extension("jpg", "other"), "jpg");
        assert_eq!(conversion.manipulations_for("other").len(), 2);
    }

    #[test]
    fn perform_on_collections_filters() {
        let conversion = Conversion::new("thumb").perform_on_collections(["images"]);
        assert!(conversion.should_be_performed_on("images"));
        assert!(!conversion.should_be_performed_on("downloads"));

        let conversion = Conversion::new("thumb").perform_on_collections(["*"]);
        assert!(conversion.should_be_performed_on("downloads"));
    }

    #[test]
    fn queue_default_only_fills_unset_flag() {
        let mut explicit = Conversion::new("a").non_queued();
        explicit.apply_queue_default(true);
        assert!(!explicit.should_be_queued());

        let mut implicit = Conversion::new("b");
        implicit.apply_queue_default(false);
        assert!(!implicit.should_be_queued());
    }
}
