//! medialib persistence
//!
//! The [`MediaRepository`] trait is the seam to whatever store the host
//! application uses; [`InMemoryMediaRepository`] backs tests and embedded use.

pub mod db;

pub use db::{InMemoryMediaRepository, MediaRepository, RepositoryError, RepositoryResult};
