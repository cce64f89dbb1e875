//! medialib storage library
//!
//! Named disks behind the [`Storage`] trait, the [`DiskManager`] that builds
//! them from configuration, and the media-aware [`Filesystem`] on top.
//!
//! # Key format
//!
//! Keys are relative, `/`-separated paths such as `{media_id}/photo.jpg`. They
//! must not contain `..` or start with `/`.

pub mod factory;
pub mod filesystem;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, DiskManager};
pub use filesystem::{FileKind, Filesystem};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use medialib_core::DiskDriver;
pub use memory::MemoryStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
