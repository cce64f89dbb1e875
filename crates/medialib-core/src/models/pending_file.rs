use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Metadata of a file waiting to be accepted into a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }
}

impl fmt::Display for PendingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name = {}, size = {}, mime_type = {}",
            self.name, self.size, self.mime_type
        )
    }
}

/// A file that already lives on a configured disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub key: String,
    pub disk: String,
}

impl RemoteFile {
    pub fn new(key: impl Into<String>, disk: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            disk: disk.into(),
        }
    }

    /// Last path segment of the key.
    pub fn filename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Where the bytes of a new media item come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Local(PathBuf),
    Remote(RemoteFile),
}

impl FileSource {
    pub fn local(path: impl AsRef<Path>) -> Self {
        FileSource::Local(path.as_ref().to_path_buf())
    }

    pub fn remote(key: impl Into<String>, disk: impl Into<String>) -> Self {
        FileSource::Remote(RemoteFile::new(key, disk))
    }

    /// File name as found at the source.
    pub fn file_name(&self) -> String {
        match self {
            FileSource::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            FileSource::Remote(remote) => remote.filename().to_string(),
        }
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Local(path) => write!(f, "{}", path.display()),
            FileSource::Remote(remote) => write!(f, "{}://{}", remote.disk, remote.key),
        }
    }
}
