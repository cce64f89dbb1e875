use std::path::Path;
use std::sync::Arc;

use medialib_core::{FileSource, HasMedia};

use crate::file_adder::FileAdder;
use crate::library::MediaLibrary;

/// Creates [`FileAdder`]s bound to one library.
#[derive(Debug, Clone)]
pub struct FileAdderFactory {
    library: Arc<MediaLibrary>,
}

impl FileAdderFactory {
    pub fn new(library: Arc<MediaLibrary>) -> Self {
        Self { library }
    }

    pub fn create(
        &self,
        subject: Option<Arc<dyn HasMedia>>,
        path: impl AsRef<Path>,
    ) -> FileAdder {
        FileAdder::new(self.library.clone(), FileSource::local(path)).set_subject(subject)
    }

    /// Adder for a file that is already stored under `key` on `disk`.
    pub fn create_from_disk(
        &self,
        subject: Option<Arc<dyn HasMedia>>,
        key: impl Into<String>,
        disk: impl Into<String>,
    ) -> FileAdder {
        FileAdder::new(self.library.clone(), FileSource::remote(key, disk)).set_subject(subject)
    }
}
