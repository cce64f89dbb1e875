pub mod conversion;
pub mod manipulations;
pub mod media;
pub mod media_collection;
pub mod pending_file;
pub mod properties;

pub use conversion::Conversion;
pub use manipulations::{
    CropPosition, Fit, FlipDirection, Manipulation, ManipulationOverride, ManipulationOverrides,
    Manipulations,
};
pub use media::{
    file_extension, file_stem, human_readable_size, Media, MediaList, OwnerRef, ResponsiveImage,
    ResponsiveImageSet,
};
pub use media_collection::{MediaCollection, MediaCollectionRegistry};
pub use pending_file::{FileSource, PendingFile, RemoteFile};
pub use properties::{HasCustomProperties, PropertyBag};
