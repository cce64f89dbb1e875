//! medialib core library
//!
//! Domain models, configuration, errors, events, and conversion resolution
//! shared by every medialib crate.

pub mod config;
pub mod constants;
pub mod conversions;
pub mod error;
pub mod events;
pub mod jobs;
pub mod models;
pub mod owner;
pub mod path_generator;
pub mod storage_types;

// Re-export commonly used types
pub use config::{DiskConfig, GeneratorKind, JobQueueSettings, MediaLibraryConfig};
pub use conversions::{
    register_all_media_conversions, ConversionCollection, ConversionFileNamer, ConversionRegistry,
    ConversionResolver, DefaultConversionFileNamer,
};
pub use error::{ConversionFailure, ErrorMetadata, LogLevel, MediaLibraryError, MediaLibraryResult};
pub use events::{ChannelListener, EventDispatcher, MediaLibraryEvent, MediaLibraryListener};
pub use jobs::{Job, JobDispatcher, JobId, JobStatus};
pub use models::{
    Conversion, FileSource, Manipulation, Manipulations, Media, MediaCollection,
    MediaCollectionRegistry, OwnerRef, PendingFile, RemoteFile,
};
pub use owner::{
    DefaultMediaRegistrar, HasMedia, MediaRegistrar, OwnerRegistry, PendingAttachment,
    UnattachedMedia,
};
pub use path_generator::{create_path_generator, PathGenerator, PathGeneratorKind};
pub use storage_types::DiskDriver;
