#![allow(dead_code)]

pub mod fixtures;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use medialib_core::models::MediaCollection;
use medialib_core::{
    Conversion, ConversionRegistry, GeneratorKind, HasMedia, Media, MediaCollectionRegistry,
    MediaLibraryConfig, MediaLibraryEvent, MediaRegistrar, UnattachedMedia,
};
use medialib_db::InMemoryMediaRepository;
use medialib_processing::WidthStepResponsiveImageGenerator;
use medialib_services::{JobExecution, MediaLibrary};
use medialib_storage::MemoryStorage;
use tempfile::TempDir;

/// Library-wide collections and conversions used across the tests.
///
/// - `images` only accepts png and jpeg
/// - `avatars` keeps the latest two items
/// - `banners` asks for responsive images
/// - `thumb` (20px wide) runs inline, `preview` (10px wide) is queued
pub struct TestRegistrar;

impl MediaRegistrar for TestRegistrar {
    fn register_media_collections(&self, collections: &mut MediaCollectionRegistry) {
        collections.add_media_collection(
            MediaCollection::create("images").accepts_mime_types(["image/png", "image/jpeg"]),
        );
        collections.add_media_collection(MediaCollection::create("avatars").only_keep_latest(2));
        collections.add_media_collection(MediaCollection::create("banners").with_responsive_images());
        collections.add_media_collection(MediaCollection::create("archived").use_disk("archive"));
    }

    fn register_media_conversions(&self, _media: &Media, conversions: &mut ConversionRegistry) {
        conversions.add_media_conversion(Conversion::new("thumb").width(20).non_queued());
        conversions.add_media_conversion(Conversion::new("preview").width(10).queued());
    }
}

/// Owner model whose key is assigned when it is "saved".
pub struct Post {
    key: Mutex<Option<String>>,
    unattached: UnattachedMedia,
}

impl Post {
    pub fn saved(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: Mutex::new(Some(key.to_string())),
            unattached: UnattachedMedia::new(),
        })
    }

    pub fn unsaved() -> Arc<Self> {
        Arc::new(Self {
            key: Mutex::new(None),
            unattached: UnattachedMedia::new(),
        })
    }

    pub fn save(&self, key: &str) {
        *self.key.lock().unwrap() = Some(key.to_string());
    }
}

impl MediaRegistrar for Post {
    fn register_media_collections(&self, collections: &mut MediaCollectionRegistry) {
        collections.add_media_collection(MediaCollection::create("gallery").only_keep_latest(2));
    }

    fn register_media_conversions(&self, _media: &Media, conversions: &mut ConversionRegistry) {
        conversions.add_media_conversion(
            Conversion::new("card")
                .width(16)
                .non_queued()
                .perform_on_collections(["gallery"]),
        );
    }
}

impl HasMedia for Post {
    fn model_type(&self) -> &str {
        "post"
    }

    fn model_key(&self) -> Option<String> {
        self.key.lock().unwrap().clone()
    }

    fn unattached_media(&self) -> &UnattachedMedia {
        &self.unattached
    }
}

pub struct TestLibrary {
    pub library: Arc<MediaLibrary>,
    pub public: MemoryStorage,
    pub archive: MemoryStorage,
    pub thumbs: MemoryStorage,
    pub repository: InMemoryMediaRepository,
    pub events: Arc<Mutex<Vec<MediaLibraryEvent>>>,
    pub dir: TempDir,
}

impl TestLibrary {
    /// Write an `width`x`height` png into the scratch directory.
    pub fn png(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.dir.path().join(name);
        fixtures::write_png(&path, width, height);
        path
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

pub fn test_config() -> MediaLibraryConfig {
    let mut config = MediaLibraryConfig::default();
    config.generators = vec![GeneratorKind::Image];
    config.job_queue.max_retries = 0;
    config.job_queue.retry_backoff_base_ms = 10;
    config
}

pub async fn setup_library(execution: JobExecution) -> TestLibrary {
    setup_library_with(test_config(), execution).await
}

pub async fn setup_library_with(config: MediaLibraryConfig, execution: JobExecution) -> TestLibrary {
    setup_library_with_registrar(config, Arc::new(TestRegistrar), execution).await
}

pub async fn setup_library_with_registrar(
    config: MediaLibraryConfig,
    registrar: Arc<dyn MediaRegistrar>,
    execution: JobExecution,
) -> TestLibrary {
    let dir = tempfile::tempdir().unwrap();
    let public = MemoryStorage::with_base_url("https://cdn.test");
    let archive = MemoryStorage::with_base_url("https://archive.test");
    let thumbs = MemoryStorage::with_base_url("https://thumbs.test");
    let repository = InMemoryMediaRepository::new();
    let events: Arc<Mutex<Vec<MediaLibraryEvent>>> = Arc::default();

    let recorded = events.clone();
    let library = MediaLibrary::builder(config)
        .registrar(registrar)
        .repository(Arc::new(repository.clone()))
        .disk("public", Arc::new(public.clone()))
        .disk("archive", Arc::new(archive.clone()))
        .disk("thumbs", Arc::new(thumbs.clone()))
        .responsive_image_generator(Arc::new(WidthStepResponsiveImageGenerator::new(10, 0.5)))
        .listener(Arc::new(move |event: &MediaLibraryEvent| {
            recorded.lock().unwrap().push(event.clone());
        }))
        .job_execution(execution)
        .build()
        .await
        .unwrap();

    TestLibrary {
        library,
        public,
        archive,
        thumbs,
        repository,
        events,
        dir,
    }
}

pub fn as_owner(post: &Arc<Post>) -> Arc<dyn HasMedia> {
    post.clone()
}
