//! Directory layout of stored media.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MediaLibraryError;
use crate::models::Media;

/// Relative directories for a media item, each ending in `/`.
pub trait PathGenerator: Send + Sync {
    fn get_path(&self, media: &Media) -> String;

    fn get_path_for_conversions(&self, media: &Media) -> String {
        format!("{}conversions/", self.get_path(media))
    }

    fn get_path_for_responsive_images(&self, media: &Media) -> String {
        format!("{}responsive-images/", self.get_path(media))
    }
}

/// `{id}/`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPathGenerator;

impl PathGenerator for DefaultPathGenerator {
    fn get_path(&self, media: &Media) -> String {
        format!("{}/", media.id)
    }
}

/// `{collection}/{id}/`
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionPathGenerator;

impl PathGenerator for CollectionPathGenerator {
    fn get_path(&self, media: &Media) -> String {
        format!("{}/{}/", media.collection_name, media.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathGeneratorKind {
    #[default]
    Default,
    Collection,
}

impl FromStr for PathGeneratorKind {
    type Err = MediaLibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(PathGeneratorKind::Default),
            "collection" => Ok(PathGeneratorKind::Collection),
            other => Err(MediaLibraryError::InvalidPathGenerator(other.to_string())),
        }
    }
}

impl fmt::Display for PathGeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathGeneratorKind::Default => write!(f, "default"),
            PathGeneratorKind::Collection => write!(f, "collection"),
        }
    }
}

pub fn create_path_generator(kind: PathGeneratorKind) -> Arc<dyn PathGenerator> {
    match kind {
        PathGeneratorKind::Default => Arc::new(DefaultPathGenerator),
        PathGeneratorKind::Collection => Arc::new(CollectionPathGenerator),
    }
}
