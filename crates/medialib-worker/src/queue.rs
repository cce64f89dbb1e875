//! Job queue: worker pool, timeouts, retry, and submission.
//!
//! Jobs live in memory only. A process exit loses queued jobs; media left
//! without conversions is reconciled by a regenerate pass.
//!
//! Shutdown: [`JobQueue::shutdown`] signals the pool to stop taking jobs; it does
//! not wait for in-flight jobs. Use [`JobQueue::wait_until_idle`] first for a
//! graceful stop.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::time::sleep;
use uuid::Uuid;

use medialib_core::{
    Job, JobDispatcher, JobId, JobQueueSettings, JobStatus, MediaLibraryError, MediaLibraryResult,
};

use crate::context::JobHandlerContext;
use crate::error::is_unrecoverable;

/// Maximum delay in seconds before retrying a failed job. Caps exponential backoff
/// so that high retry counts do not produce excessively long delays.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Backoff before retry number `retry_count + 1`: `base_ms * 2^retry_count`, capped.
#[inline]
pub(crate) fn compute_retry_backoff(retry_count: u32, base_ms: u64) -> Duration {
    let factor = 2_u64.saturating_pow(retry_count);
    let millis = base_ms
        .saturating_mul(factor)
        .min(MAX_RETRY_BACKOFF_SECS * 1000);
    Duration::from_millis(millis)
}

/// Finished job records kept for inspection before the oldest are dropped.
pub const DEFAULT_FINISHED_JOB_HISTORY: usize = 1024;

/// Optional sender notified when a job reaches a final status.
pub type JobFinishedSender = mpsc::Sender<(JobId, JobStatus)>;

#[derive(Debug, Clone)]
pub struct JobQueueConfig {
    pub max_workers: usize,
    pub job_timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub finished_job_history: usize,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self::from(&JobQueueSettings::default())
    }
}

impl From<&JobQueueSettings> for JobQueueConfig {
    fn from(settings: &JobQueueSettings) -> Self {
        Self {
            max_workers: settings.max_workers.max(1),
            job_timeout: Duration::from_secs(settings.job_timeout_seconds),
            max_retries: settings.max_retries,
            retry_backoff_base_ms: settings.retry_backoff_base_ms,
            finished_job_history: DEFAULT_FINISHED_JOB_HISTORY,
        }
    }
}

/// State of one submitted job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub job: Job,
    pub status: JobStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Records of pending and running jobs, plus a bounded window of finished ones.
#[derive(Debug, Default)]
struct JobRecordStore {
    records: HashMap<JobId, JobRecord>,
    finished: VecDeque<JobId>,
}

impl JobRecordStore {
    fn retire(&mut self, job_id: JobId, history: usize) {
        self.finished.push_back(job_id);
        while self.finished.len() > history {
            if let Some(oldest) = self.finished.pop_front() {
                self.records.remove(&oldest);
            }
        }
    }
}

type JobRecords = Arc<Mutex<JobRecordStore>>;

/// Counts submitted jobs that have not reached a final status.
#[derive(Debug, Default)]
struct ActivityTracker {
    active: AtomicUsize,
    idle: Notify,
}

impl ActivityTracker {
    fn start(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<JobId>,
    records: JobRecords,
    tracker: Arc<ActivityTracker>,
    config: JobQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
}

impl JobQueue {
    /// Create a queue and spawn its worker pool.
    ///
    /// Must be called inside a tokio runtime. Jobs are handed to `context`,
    /// which is upgraded for every attempt; once it is dropped, remaining
    /// jobs fail.
    pub fn new(
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let records: JobRecords = Arc::default();
        let tracker = Arc::new(ActivityTracker::default());

        let records_clone = records.clone();
        let tracker_clone = tracker.clone();
        let config_clone = config.clone();

        tokio::spawn(async move {
            Self::worker_pool(
                receiver,
                records_clone,
                tracker_clone,
                config_clone,
                context,
                shutdown_rx,
                job_finished_tx,
            )
            .await;
        });

        Self {
            sender,
            records,
            tracker,
            config,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &JobQueueConfig {
        &self.config
    }

    /// Submit a job for background execution.
    #[tracing::instrument(skip(self), fields(job.type = %job.kind(), media_id = %job.media_id()))]
    pub fn submit(&self, job: Job) -> Result<JobId> {
        let id = Uuid::new_v4();
        let record = JobRecord {
            id,
            job: job.clone(),
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            result: None,
            enqueued_at: Utc::now(),
            finished_at: None,
        };
        lock(&self.records).records.insert(id, record);
        self.tracker.start();

        if self.sender.send(id).is_err() {
            lock(&self.records).records.remove(&id);
            self.tracker.finish();
            tracing::error!(job_id = %id, "Job queue worker pool is not running");
            return Err(anyhow!("Job queue worker pool is not running"));
        }

        tracing::info!(job_id = %id, job = %job, "Job submitted to queue");
        Ok(id)
    }

    pub fn status(&self, job_id: JobId) -> Option<JobStatus> {
        lock(&self.records).records.get(&job_id).map(|record| record.status)
    }

    /// Record of a pending, running or recently finished job.
    pub fn record(&self, job_id: JobId) -> Option<JobRecord> {
        lock(&self.records).records.get(&job_id).cloned()
    }

    /// Number of records held, finished ones included.
    pub fn record_count(&self) -> usize {
        lock(&self.records).records.len()
    }

    /// Submitted jobs that have not completed or failed yet.
    pub fn active_jobs(&self) -> usize {
        self.tracker.active()
    }

    /// Resolves once every submitted job reached a final status.
    pub async fn wait_until_idle(&self) {
        self.tracker.wait_until_idle().await;
    }

    async fn worker_pool(
        mut receiver: mpsc::UnboundedReceiver<JobId>,
        records: JobRecords,
        tracker: Arc<ActivityTracker>,
        config: JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        job_finished_tx: Option<JobFinishedSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_retries = config.max_retries,
            timeout_seconds = config.job_timeout.as_secs(),
            "Job queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Job queue worker pool shutting down");
                    break;
                }
                next = receiver.recv() => {
                    let Some(job_id) = next else {
                        break;
                    };
                    let Some(job) = lock(&records).records.get(&job_id).map(|record| record.job.clone()) else {
                        tracing::warn!(job_id = %job_id, "Job record missing, skipping");
                        continue;
                    };
                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let records = records.clone();
                    let tracker = tracker.clone();
                    let config = config.clone();
                    let ctx = context.clone();
                    let finished_tx = job_finished_tx.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        let status = Self::process_job_with_retry(
                            job_id, job, &records, &config, ctx, finished_tx,
                        )
                        .await;
                        tracing::debug!(job_id = %job_id, status = %status, "Job finished");
                        tracker.finish();
                    });
                }
            }
        }

        tracing::info!("Job queue worker pool stopped");
    }

    #[tracing::instrument(skip(job, records, config, context, job_finished_tx), fields(job.id = %job_id, job.type = %job.kind()))]
    async fn process_job_with_retry(
        job_id: JobId,
        job: Job,
        records: &JobRecords,
        config: &JobQueueConfig,
        context: Weak<dyn JobHandlerContext>,
        job_finished_tx: Option<JobFinishedSender>,
    ) -> JobStatus {
        let mut retry_count: u32 = 0;

        loop {
            update(records, job_id, |record| {
                record.status = JobStatus::Running;
                record.attempts = retry_count + 1;
            });

            let Some(ctx) = context.upgrade() else {
                tracing::error!(job_id = %job_id, "JobHandlerContext was dropped, cannot process job");
                return finish(
                    records,
                    config.finished_job_history,
                    job_id,
                    JobStatus::Failed,
                    Err("JobHandlerContext was dropped".to_string()),
                    job_finished_tx.as_ref(),
                )
                .await;
            };

            let (message, unrecoverable) =
                match tokio::time::timeout(config.job_timeout, ctx.dispatch_job(&job)).await {
                    Ok(Ok(result)) => {
                        tracing::info!(
                            job_id = %job_id,
                            job = %job,
                            attempts = retry_count + 1,
                            "Job completed successfully"
                        );
                        return finish(
                            records,
                            config.finished_job_history,
                            job_id,
                            JobStatus::Completed,
                            Ok(result),
                            job_finished_tx.as_ref(),
                        )
                        .await;
                    }
                    Ok(Err(e)) => {
                        let unrecoverable = is_unrecoverable(&e);
                        tracing::error!(
                            job_id = %job_id,
                            error = %e,
                            retry_count = retry_count,
                            max_retries = config.max_retries,
                            unrecoverable = unrecoverable,
                            "Job execution failed"
                        );
                        (format!("{:#}", e), unrecoverable)
                    }
                    Err(_) => {
                        tracing::error!(
                            job_id = %job_id,
                            timeout_seconds = config.job_timeout.as_secs_f64(),
                            "Job execution timed out"
                        );
                        ("Job execution timed out".to_string(), false)
                    }
                };

            if unrecoverable {
                tracing::error!(job_id = %job_id, "Job failed with unrecoverable error, will not retry");
                return finish(
                    records,
                    config.finished_job_history,
                    job_id,
                    JobStatus::Failed,
                    Err(message),
                    job_finished_tx.as_ref(),
                )
                .await;
            }

            if retry_count >= config.max_retries {
                tracing::error!(job_id = %job_id, "Job failed after max retries");
                return finish(
                    records,
                    config.finished_job_history,
                    job_id,
                    JobStatus::Failed,
                    Err(message),
                    job_finished_tx.as_ref(),
                )
                .await;
            }

            let backoff = compute_retry_backoff(retry_count, config.retry_backoff_base_ms);
            tracing::info!(
                job_id = %job_id,
                retry_count = retry_count + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Scheduling job retry"
            );
            update(records, job_id, |record| {
                record.status = JobStatus::Scheduled;
                record.last_error = Some(message);
            });
            sleep(backoff).await;
            retry_count += 1;
        }
    }

    /// Signals the worker pool to stop taking new jobs and exit the main loop.
    ///
    /// Returns immediately after sending the signal. Already-spawned job handlers
    /// continue until they complete or time out.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating job queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl JobDispatcher for JobQueue {
    async fn dispatch(&self, job: Job) -> MediaLibraryResult<JobId> {
        self.submit(job)
            .map_err(|e| MediaLibraryError::JobDispatch(e.to_string()))
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("config", &self.config)
            .field("active_jobs", &self.tracker.active())
            .finish()
    }
}

fn lock(records: &JobRecords) -> std::sync::MutexGuard<'_, JobRecordStore> {
    records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn update<F>(records: &JobRecords, job_id: JobId, change: F)
where
    F: FnOnce(&mut JobRecord),
{
    if let Some(record) = lock(records).records.get_mut(&job_id) {
        change(record);
    }
}

async fn finish(
    records: &JobRecords,
    history: usize,
    job_id: JobId,
    status: JobStatus,
    outcome: Result<serde_json::Value, String>,
    job_finished_tx: Option<&JobFinishedSender>,
) -> JobStatus {
    {
        let mut store = lock(records);
        if let Some(record) = store.records.get_mut(&job_id) {
            record.status = status;
            record.finished_at = Some(Utc::now());
            match outcome {
                Ok(result) => record.result = Some(result),
                Err(message) => record.last_error = Some(message),
            }
        }
        store.retire(job_id, history);
    }
    if let Some(tx) = job_finished_tx {
        let _ = tx.send((job_id, status)).await;
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use std::sync::atomic::AtomicU32;

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyContext {
        failures: u32,
        unrecoverable: bool,
        delay: Duration,
        calls: AtomicU32,
    }

    impl FlakyContext {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                unrecoverable: false,
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JobHandlerContext for FlakyContext {
        async fn dispatch_job(self: Arc<Self>, job: &Job) -> Result<serde_json::Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            if call < self.failures {
                let err = anyhow!("attempt {} failed", call + 1);
                return Err(if self.unrecoverable {
                    JobError::unrecoverable(err).into()
                } else {
                    JobError::recoverable(err).into()
                });
            }
            Ok(serde_json::json!({ "media_id": job.media_id().to_string() }))
        }
    }

    fn config(max_retries: u32) -> JobQueueConfig {
        JobQueueConfig {
            max_workers: 2,
            job_timeout: Duration::from_secs(5),
            max_retries,
            retry_backoff_base_ms: 1,
            finished_job_history: 16,
        }
    }

    fn job() -> Job {
        Job::GenerateResponsiveImages {
            media_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff(0, 1000), Duration::from_secs(1));
        assert_eq!(compute_retry_backoff(1, 1000), Duration::from_secs(2));
        assert_eq!(compute_retry_backoff(2, 1000), Duration::from_secs(4));
        assert_eq!(compute_retry_backoff(8, 1000), Duration::from_secs(256));
        assert_eq!(
            compute_retry_backoff(9, 1000),
            Duration::from_secs(MAX_RETRY_BACKOFF_SECS)
        );
        assert_eq!(
            compute_retry_backoff(63, 1000),
            Duration::from_secs(MAX_RETRY_BACKOFF_SECS)
        );
    }

    #[tokio::test]
    async fn completes_and_reports_result() {
        let context = Arc::new(FlakyContext::new(0));
        let weak: Weak<dyn JobHandlerContext> = Arc::downgrade(&(context.clone() as Arc<dyn JobHandlerContext>));
        let (tx, mut rx) = mpsc::channel(4);
        let queue = JobQueue::new(config(0), weak, Some(tx));

        let job = job();
        let id = queue.dispatch(job.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some((id, JobStatus::Completed)));

        let record = queue.record(id).unwrap();
        assert_eq!(record.attempts, 1);
        assert_eq!(
            record.result.unwrap()["media_id"],
            job.media_id().to_string()
        );
        assert!(record.finished_at.is_some());
    }

    #[tokio::test]
    async fn recoverable_failures_are_retried() {
        let context = Arc::new(FlakyContext::new(2));
        let weak: Weak<dyn JobHandlerContext> = Arc::downgrade(&(context.clone() as Arc<dyn JobHandlerContext>));
        let queue = JobQueue::new(config(3), weak, None);

        let id = queue.submit(job()).unwrap();
        queue.wait_until_idle().await;

        let record = queue.record(id).unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.attempts, 3);
        assert_eq!(context.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let context = Arc::new(FlakyContext::new(10));
        let weak: Weak<dyn JobHandlerContext> = Arc::downgrade(&(context.clone() as Arc<dyn JobHandlerContext>));
        let queue = JobQueue::new(config(2), weak, None);

        let id = queue.submit(job()).unwrap();
        queue.wait_until_idle().await;

        let record = queue.record(id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("attempt 3 failed"));
        assert_eq!(context.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unrecoverable_failure_is_not_retried() {
        let context = Arc::new(FlakyContext {
            unrecoverable: true,
            ..FlakyContext::new(10)
        });
        let weak: Weak<dyn JobHandlerContext> = Arc::downgrade(&(context.clone() as Arc<dyn JobHandlerContext>));
        let queue = JobQueue::new(config(5), weak, None);

        let id = queue.submit(job()).unwrap();
        queue.wait_until_idle().await;

        assert_eq!(queue.status(id), Some(JobStatus::Failed));
        assert_eq!(context.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timed_out_job_fails() {
        let context = Arc::new(FlakyContext {
            delay: Duration::from_secs(2),
            ..FlakyContext::new(0)
        });
        let weak: Weak<dyn JobHandlerContext> = Arc::downgrade(&(context.clone() as Arc<dyn JobHandlerContext>));
        let queue = JobQueue::new(
            JobQueueConfig {
                job_timeout: Duration::from_millis(50),
                ..config(0)
            },
            weak,
            None,
        );

        let id = queue.submit(job()).unwrap();
        queue.wait_until_idle().await;

        let record = queue.record(id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.last_error.as_deref(), Some("Job execution timed out"));
    }

    #[tokio::test]
    async fn dropped_context_fails_job() {
        let queue = JobQueue::new(config(3), crate::context::empty_context_weak(), None);

        let id = queue.submit(job()).unwrap();
        queue.wait_until_idle().await;

        assert_eq!(queue.status(id), Some(JobStatus::Failed));
        assert_eq!(queue.active_jobs(), 0);
    }

    #[tokio::test]
    async fn finished_records_are_bounded() {
        let context = Arc::new(FlakyContext::new(0));
        let weak: Weak<dyn JobHandlerContext> = Arc::downgrade(&(context.clone() as Arc<dyn JobHandlerContext>));
        let queue = JobQueue::new(
            JobQueueConfig {
                finished_job_history: 2,
                ..config(0)
            },
            weak,
            None,
        );

        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(queue.submit(job()).unwrap());
            queue.wait_until_idle().await;
        }

        assert_eq!(queue.record_count(), 2);
        assert!(queue.record(ids[0]).is_none());
        assert!(queue.record(ids[2]).is_none());
        assert_eq!(queue.status(ids[3]), Some(JobStatus::Completed));
        assert_eq!(queue.status(ids[4]), Some(JobStatus::Completed));
    }

    #[test]
    fn config_from_settings() {
        let settings = JobQueueSettings {
            max_workers: 0,
            job_timeout_seconds: 30,
            max_retries: 1,
            retry_backoff_base_ms: 250,
        };
        let config = JobQueueConfig::from(&settings);
        assert_eq!(config.max_workers, 1);
        assert_eq!(config.job_timeout, Duration::from_secs(30));
        assert_eq!(config.finished_job_history, DEFAULT_FINISHED_JOB_HISTORY);
    }
}
