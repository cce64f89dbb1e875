use crate::models::{file_extension, file_stem, Conversion, Media};

/// Names the derived file a conversion produces for a media item.
pub trait ConversionFileNamer: Send + Sync {
    /// Base name without extension.
    fn file_name(&self, conversion: &Conversion, media: &Media) -> String {
        format!("{}-{}", file_stem(&media.file_name), conversion.name())
    }

    fn extension(&self, conversion: &Conversion, media: &Media) -> String {
        conversion.result_extension(file_extension(&media.file_name), &media.collection_name)
    }

    /// Full file name, with the dot omitted when there is no extension.
    fn conversion_file(&self, conversion: &Conversion, media: &Media) -> String {
        let name = self.file_name(conversion, media);
        let extension = self.extension(conversion, media);
        if extension.is_empty() {
            name
        } else {
            format!("{}.{}", name, extension)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConversionFileNamer;

impl ConversionFileNamer for DefaultConversionFileNamer {}
