//! The media library facade and its builder.
//!
//! [`MediaLibrary`] wires configuration, disks, the repository, conversion
//! resolution, the manipulator, and the job queue together. It is always
//! handed out as `Arc<MediaLibrary>` because the job queue calls back into it.

use std::sync::{Arc, Weak};

use medialib_core::{
    create_path_generator, ConversionFileNamer, ConversionResolver, DefaultConversionFileNamer,
    DefaultMediaRegistrar, EventDispatcher, HasMedia, JobDispatcher, Media, MediaLibraryConfig,
    MediaLibraryError, MediaLibraryListener, MediaLibraryResult, MediaRegistrar, OwnerRegistry,
    PathGenerator,
};
use medialib_db::{InMemoryMediaRepository, MediaRepository};
use medialib_processing::{FileManipulator, ImageGeneratorRegistry, ResponsiveImageGenerator};
use medialib_storage::{DiskManager, Filesystem, Storage};
use medialib_worker::{
    InlineJobDispatcher, JobFinishedSender, JobHandlerContext, JobQueue, JobQueueConfig,
};

use crate::factory::FileAdderFactory;
use crate::file_adder::FileAdder;

/// How dispatched jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobExecution {
    /// Background worker pool.
    #[default]
    Queue,
    /// On the dispatching task, before `dispatch` returns.
    Inline,
}

pub struct MediaLibrary {
    pub(crate) config: MediaLibraryConfig,
    pub(crate) filesystem: Arc<Filesystem>,
    pub(crate) repository: Arc<dyn MediaRepository>,
    pub(crate) resolver: ConversionResolver,
    pub(crate) events: EventDispatcher,
    pub(crate) generators: Arc<ImageGeneratorRegistry>,
    pub(crate) manipulator: FileManipulator,
    pub(crate) queue: Option<JobQueue>,
}

impl MediaLibrary {
    pub fn builder(config: MediaLibraryConfig) -> MediaLibraryBuilder {
        MediaLibraryBuilder::new(config)
    }

    pub fn config(&self) -> &MediaLibraryConfig {
        &self.config
    }

    pub fn filesystem(&self) -> &Arc<Filesystem> {
        &self.filesystem
    }

    pub fn repository(&self) -> &Arc<dyn MediaRepository> {
        &self.repository
    }

    pub fn resolver(&self) -> &ConversionResolver {
        &self.resolver
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn generators(&self) -> &Arc<ImageGeneratorRegistry> {
        &self.generators
    }

    pub fn manipulator(&self) -> &FileManipulator {
        &self.manipulator
    }

    /// The background queue, when jobs are not run inline.
    pub fn queue(&self) -> Option<&JobQueue> {
        self.queue.as_ref()
    }

    /// Make an owner's hooks reachable from media stored against it.
    pub fn register_owner(&self, owner: Arc<dyn HasMedia>) {
        self.resolver.owners().register(owner);
    }

    pub fn listen(&self, listener: Arc<dyn MediaLibraryListener>) {
        self.events.listen(listener);
    }

    /// Media type reported by the generator registry: `image`, `video`, `pdf` or `other`.
    pub fn media_type(&self, media: &Media) -> &'static str {
        self.generators.media_type(media)
    }

    pub fn file_adder_factory(self: &Arc<Self>) -> FileAdderFactory {
        FileAdderFactory::new(self.clone())
    }

    /// Start adding a local file without a subject.
    pub fn add_media(self: &Arc<Self>, path: impl AsRef<std::path::Path>) -> FileAdder {
        self.file_adder_factory().create(None, path)
    }

    /// Start adding a file that already lives on `disk`.
    pub fn add_media_from_disk(
        self: &Arc<Self>,
        key: impl Into<String>,
        disk: impl Into<String>,
    ) -> FileAdder {
        self.file_adder_factory().create_from_disk(None, key, disk)
    }

    /// Wait for every queued job to finish. Returns at once when jobs run inline.
    pub async fn wait_for_jobs(&self) {
        if let Some(queue) = &self.queue {
            queue.wait_until_idle().await;
        }
    }

    /// Let submitted jobs finish, then stop the worker pool.
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.wait_until_idle().await;
            queue.shutdown().await;
        }
    }
}

impl std::fmt::Debug for MediaLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaLibrary")
            .field("disk_name", &self.config.disk_name)
            .field("filesystem", &self.filesystem)
            .field("resolver", &self.resolver)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Builds a [`MediaLibrary`] from configuration plus injected collaborators.
pub struct MediaLibraryBuilder {
    config: MediaLibraryConfig,
    registrar: Arc<dyn MediaRegistrar>,
    owners: OwnerRegistry,
    repository: Option<Arc<dyn MediaRepository>>,
    disks: Vec<(String, Arc<dyn Storage>)>,
    path_generator: Option<Arc<dyn PathGenerator>>,
    file_namer: Arc<dyn ConversionFileNamer>,
    generators: Option<ImageGeneratorRegistry>,
    responsive: Option<Arc<dyn ResponsiveImageGenerator>>,
    listeners: Vec<Arc<dyn MediaLibraryListener>>,
    execution: JobExecution,
    job_finished_tx: Option<JobFinishedSender>,
}

impl MediaLibraryBuilder {
    pub fn new(config: MediaLibraryConfig) -> Self {
        Self {
            config,
            registrar: Arc::new(DefaultMediaRegistrar),
            owners: OwnerRegistry::new(),
            repository: None,
            disks: Vec::new(),
            path_generator: None,
            file_namer: Arc::new(DefaultConversionFileNamer),
            generators: None,
            responsive: None,
            listeners: Vec::new(),
            execution: JobExecution::default(),
            job_finished_tx: None,
        }
    }

    /// Library-wide collections and conversions.
    pub fn registrar(mut self, registrar: Arc<dyn MediaRegistrar>) -> Self {
        self.registrar = registrar;
        self
    }

    pub fn owner(self, owner: Arc<dyn HasMedia>) -> Self {
        self.owners.register(owner);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn MediaRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Add or replace a disk on top of the configured ones.
    pub fn disk(mut self, name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        self.disks.push((name.into(), storage));
        self
    }

    pub fn path_generator(mut self, path_generator: Arc<dyn PathGenerator>) -> Self {
        self.path_generator = Some(path_generator);
        self
    }

    pub fn file_namer(mut self, file_namer: Arc<dyn ConversionFileNamer>) -> Self {
        self.file_namer = file_namer;
        self
    }

    pub fn generators(mut self, generators: ImageGeneratorRegistry) -> Self {
        self.generators = Some(generators);
        self
    }

    pub fn responsive_image_generator(
        mut self,
        generator: Arc<dyn ResponsiveImageGenerator>,
    ) -> Self {
        self.responsive = Some(generator);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn MediaLibraryListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn job_execution(mut self, execution: JobExecution) -> Self {
        self.execution = execution;
        self
    }

    /// Receive `(job_id, status)` whenever a queued job finishes.
    pub fn job_finished_sender(mut self, sender: JobFinishedSender) -> Self {
        self.job_finished_tx = Some(sender);
        self
    }

    /// Must run inside a tokio runtime when jobs are queued.
    pub async fn build(self) -> MediaLibraryResult<Arc<MediaLibrary>> {
        self.config
            .validate()
            .map_err(|e| MediaLibraryError::Config(e.to_string()))?;

        let mut disks = DiskManager::from_config(&self.config).await?;
        for (name, storage) in self.disks {
            disks.insert(name, storage);
        }

        let path_generator = self
            .path_generator
            .unwrap_or_else(|| create_path_generator(self.config.path_generator));
        let filesystem = Arc::new(Filesystem::new(disks, path_generator, self.file_namer));
        let repository = self
            .repository
            .unwrap_or_else(|| Arc::new(InMemoryMediaRepository::new()));
        let generators = Arc::new(
            self.generators
                .unwrap_or_else(|| ImageGeneratorRegistry::from_config(&self.config)),
        );
        let resolver = ConversionResolver::new(
            self.registrar,
            self.owners,
            self.config.queue_conversions_by_default,
        );
        let events = EventDispatcher::new();
        for listener in self.listeners {
            events.listen(listener);
        }

        let config = self.config;
        let execution = self.execution;
        let responsive = self.responsive;
        let job_finished_tx = self.job_finished_tx;

        let library = Arc::new_cyclic(|weak: &Weak<MediaLibrary>| {
            let context: Weak<dyn JobHandlerContext> = weak.clone();
            let (dispatcher, queue): (Arc<dyn JobDispatcher>, Option<JobQueue>) = match execution {
                JobExecution::Queue => {
                    let queue = JobQueue::new(
                        JobQueueConfig::from(&config.job_queue),
                        context,
                        job_finished_tx,
                    );
                    (Arc::new(queue.clone()), Some(queue))
                }
                JobExecution::Inline => (Arc::new(InlineJobDispatcher::new(context)), None),
            };

            let manipulator = FileManipulator::new(
                filesystem.clone(),
                repository.clone(),
                generators.clone(),
                resolver.clone(),
                events.clone(),
                dispatcher,
            )
            .with_responsive_image_generator(responsive)
            .with_temporary_directory(config.temporary_directory.clone());

            MediaLibrary {
                config,
                filesystem,
                repository,
                resolver,
                events,
                generators,
                manipulator,
                queue,
            }
        });

        tracing::info!(
            disk = %library.config.disk_name,
            disks = ?library.filesystem.disks().names(),
            generators = library.generators.len(),
            execution = ?execution,
            "Media library initialised"
        );

        Ok(library)
    }
}
