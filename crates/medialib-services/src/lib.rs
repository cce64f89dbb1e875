//! medialib services library
//!
//! The [`MediaLibrary`] facade: file ingestion, media lifecycle operations,
//! and the handlers that run queued conversion and responsive-image jobs.

pub mod factory;
pub mod file_adder;
mod handler;
pub mod library;
mod lifecycle;
pub mod telemetry;

pub use factory::FileAdderFactory;
pub use file_adder::{default_sanitizer, FileAdder, FileNameSanitizer};
pub use library::{JobExecution, MediaLibrary, MediaLibraryBuilder};
pub use telemetry::init_tracing;
