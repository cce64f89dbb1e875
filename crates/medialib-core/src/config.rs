//! Configuration module
//!
//! One `MediaLibraryConfig` is built at startup (usually from `MEDIA_*`
//! environment variables) and cloned into every component that needs it.

use std::collections::BTreeMap;
use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::path_generator::PathGeneratorKind;
use crate::storage_types::DiskDriver;

const DEFAULT_DISK: &str = "public";
const MAX_FILE_SIZE_MB: u64 = 10;
const JOB_QUEUE_MAX_WORKERS: usize = 4;
const JOB_TIMEOUT_SECS: u64 = 3600;
const JOB_MAX_RETRIES: u32 = 3;
const JOB_RETRY_BACKOFF_BASE_MS: u64 = 1000;

/// Closed set of still-image generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Image,
    Video,
    Pdf,
}

impl FromStr for GeneratorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" => Ok(GeneratorKind::Image),
            "video" => Ok(GeneratorKind::Video),
            "pdf" => Ok(GeneratorKind::Pdf),
            _ => Err(anyhow::anyhow!("Invalid generator: {}", s)),
        }
    }
}

impl Display for GeneratorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            GeneratorKind::Image => write!(f, "image"),
            GeneratorKind::Video => write!(f, "video"),
            GeneratorKind::Pdf => write!(f, "pdf"),
        }
    }
}

/// A named storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskConfig {
    pub driver: DiskDriver,
    pub root: Option<PathBuf>,
    /// Public base URL prepended to stored paths.
    pub url: Option<String>,
}

impl DiskConfig {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            driver: DiskDriver::Local,
            root: Some(root.into()),
            url: None,
        }
    }

    pub fn memory() -> Self {
        Self {
            driver: DiskDriver::Memory,
            root: None,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQueueSettings {
    pub max_workers: usize,
    pub job_timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl Default for JobQueueSettings {
    fn default() -> Self {
        Self {
            max_workers: JOB_QUEUE_MAX_WORKERS,
            job_timeout_seconds: JOB_TIMEOUT_SECS,
            max_retries: JOB_MAX_RETRIES,
            retry_backoff_base_ms: JOB_RETRY_BACKOFF_BASE_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaLibraryConfig {
    /// Disk used for originals when neither the caller nor the collection picks one.
    pub disk_name: String,
    pub disks: BTreeMap<String, DiskConfig>,
    /// Maximum accepted source size in bytes.
    pub max_file_size: u64,
    pub queue_conversions_by_default: bool,
    pub path_generator: PathGeneratorKind,
    pub generators: Vec<GeneratorKind>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub pdftoppm_path: String,
    /// Parent of per-run scratch directories; the system temp dir when unset.
    pub temporary_directory: Option<PathBuf>,
    pub job_queue: JobQueueSettings,
    pub environment: String,
}

impl Default for MediaLibraryConfig {
    fn default() -> Self {
        let mut disks = BTreeMap::new();
        disks.insert(DEFAULT_DISK.to_string(), DiskConfig::memory());

        Self {
            disk_name: DEFAULT_DISK.to_string(),
            disks,
            max_file_size: MAX_FILE_SIZE_MB * 1024 * 1024,
            queue_conversions_by_default: true,
            path_generator: PathGeneratorKind::Default,
            generators: vec![GeneratorKind::Image, GeneratorKind::Video, GeneratorKind::Pdf],
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            pdftoppm_path: "pdftoppm".to_string(),
            temporary_directory: None,
            job_queue: JobQueueSettings::default(),
            environment: "development".to_string(),
        }
    }
}

impl MediaLibraryConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let disk_name = var("MEDIA_DISK", DEFAULT_DISK);

        let mut disks = BTreeMap::new();
        for name in split_list(&var("MEDIA_DISKS", &disk_name)) {
            let prefix = format!("MEDIA_DISK_{}", name.to_uppercase());
            let driver: DiskDriver = var(&format!("{}_DRIVER", prefix), "local").parse()?;
            let root = lookup(&format!("{}_ROOT", prefix)).map(PathBuf::from).or_else(|| {
                (driver == DiskDriver::Local).then(|| PathBuf::from("storage").join(&name))
            });
            let url = lookup(&format!("{}_URL", prefix));
            disks.insert(name, DiskConfig { driver, root, url });
        }

        let max_file_size_mb = var("MEDIA_MAX_FILE_SIZE_MB", &MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let queue_conversions_by_default = var("MEDIA_QUEUE_CONVERSIONS_BY_DEFAULT", "true")
            .parse::<bool>()
            .unwrap_or(true);

        let path_generator = var("MEDIA_PATH_GENERATOR", "default")
            .parse::<PathGeneratorKind>()?;

        let generators = split_list(&var("MEDIA_GENERATORS", "image,video,pdf"))
            .iter()
            .map(|name| name.parse::<GeneratorKind>())
            .collect::<Result<Vec<_>, _>>()?;

        let job_queue = JobQueueSettings {
            max_workers: var("MEDIA_JOB_MAX_WORKERS", &JOB_QUEUE_MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(JOB_QUEUE_MAX_WORKERS),
            job_timeout_seconds: var("MEDIA_JOB_TIMEOUT_SECONDS", &JOB_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(JOB_TIMEOUT_SECS),
            max_retries: var("MEDIA_JOB_MAX_RETRIES", &JOB_MAX_RETRIES.to_string())
                .parse()
                .unwrap_or(JOB_MAX_RETRIES),
            retry_backoff_base_ms: var(
                "MEDIA_JOB_RETRY_BACKOFF_BASE_MS",
                &JOB_RETRY_BACKOFF_BASE_MS.to_string(),
            )
            .parse()
            .unwrap_or(JOB_RETRY_BACKOFF_BASE_MS),
        };

        Ok(Self {
            disk_name,
            disks,
            max_file_size: max_file_size_mb * 1024 * 1024,
            queue_conversions_by_default,
            path_generator,
            generators,
            ffmpeg_path: var("FFMPEG_PATH", "ffmpeg"),
            ffprobe_path: var("FFPROBE_PATH", "ffprobe"),
            pdftoppm_path: var("PDFTOPPM_PATH", "pdftoppm"),
            temporary_directory: lookup("MEDIA_TEMP_DIR").map(PathBuf::from),
            job_queue,
            environment: lookup("ENVIRONMENT")
                .or_else(|| lookup("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.has_disk(&self.disk_name) {
            return Err(anyhow::anyhow!(
                "MEDIA_DISK `{}` is not listed in MEDIA_DISKS",
                self.disk_name
            ));
        }

        if self.max_file_size == 0 {
            return Err(anyhow::anyhow!("MEDIA_MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.job_queue.max_workers == 0 {
            return Err(anyhow::anyhow!("MEDIA_JOB_MAX_WORKERS must be greater than 0"));
        }

        for (name, disk) in &self.disks {
            if disk.driver == DiskDriver::Local && disk.root.is_none() {
                return Err(anyhow::anyhow!(
                    "MEDIA_DISK_{}_ROOT must be set for local disks",
                    name.to_uppercase()
                ));
            }
        }

        Ok(())
    }

    pub fn has_disk(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }

    pub fn disk(&self, name: &str) -> Option<&DiskConfig> {
        self.disks.get(name)
    }

    pub fn with_disk(mut self, name: impl Into<String>, disk: DiskConfig) -> Self {
        self.disks.insert(name.into(), disk);
        self
    }

    pub fn with_default_disk(mut self, name: impl Into<String>) -> Self {
        self.disk_name = name.into();
        self
    }

    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = MediaLibraryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert!(config.queue_conversions_by_default);
    }

    #[test]
    fn reads_disks_and_limits() {
        let config = MediaLibraryConfig::from_lookup(lookup(&[
            ("MEDIA_DISK", "media"),
            ("MEDIA_DISKS", "media, scratch"),
            ("MEDIA_DISK_MEDIA_ROOT", "/srv/media"),
            ("MEDIA_DISK_MEDIA_URL", "https://cdn.example.com"),
            ("MEDIA_DISK_SCRATCH_DRIVER", "memory"),
            ("MEDIA_MAX_FILE_SIZE_MB", "2"),
            ("MEDIA_QUEUE_CONVERSIONS_BY_DEFAULT", "false"),
            ("MEDIA_GENERATORS", "image"),
            ("MEDIA_PATH_GENERATOR", "collection"),
        ]))
        .unwrap();

        assert_eq!(config.disk_name, "media");
        assert_eq!(config.max_file_size, 2 * 1024 * 1024);
        assert!(!config.queue_conversions_by_default);
        assert_eq!(config.generators, vec![GeneratorKind::Image]);
        assert_eq!(config.path_generator, PathGeneratorKind::Collection);

        let media = config.disk("media").unwrap();
        assert_eq!(media.driver, DiskDriver::Local);
        assert_eq!(media.root, Some(PathBuf::from("/srv/media")));
        assert_eq!(media.url.as_deref(), Some("https://cdn.example.com"));
        assert_eq!(config.disk("scratch").unwrap().driver, DiskDriver::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_path_generator_is_rejected() {
        let result = MediaLibraryConfig::from_lookup(lookup(&[("MEDIA_PATH_GENERATOR", "hashed")]));
        assert!(result.is_err());
    }

    #[test]
    fn validate_requires_default_disk() {
        let config = MediaLibraryConfig::default().with_default_disk("missing");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_root_for_local_disks() {
        let config = MediaLibraryConfig::default().with_disk(
            "broken",
            DiskConfig {
                driver: DiskDriver::Local,
                root: None,
                url: None,
            },
        );
        assert!(config.validate().is_err());
    }
}
