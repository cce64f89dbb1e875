//! Media record repositories
//
// Repository trait and error type
pub mod media;
//
// In-process implementation
pub mod memory;

pub use media::{MediaRepository, RepositoryError, RepositoryResult};
pub use memory::InMemoryMediaRepository;
