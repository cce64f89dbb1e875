mod helpers;

use helpers::{setup_library, setup_library_with, test_config};
use medialib_core::{Job, JobDispatcher, JobStatus, MediaLibraryError};
use medialib_db::MediaRepository;
use medialib_services::JobExecution;
use uuid::Uuid;

#[tokio::test]
async fn test_job_for_deleted_media_is_not_retried() {
    let mut config = test_config();
    config.job_queue.max_retries = 3;
    let t = setup_library_with(config, JobExecution::Queue).await;
    let queue = t.library.queue().unwrap();

    let job_id = queue
        .submit(Job::PerformConversions {
            media_id: Uuid::new_v4(),
            conversion_names: vec!["preview".to_string()],
            only_missing: false,
        })
        .unwrap();
    t.library.wait_for_jobs().await;

    let record = queue.record(job_id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.attempts, 1);
    assert!(record.last_error.unwrap().contains("not found"));
}

#[tokio::test]
async fn test_conversion_job_reports_what_ran() {
    let t = setup_library(JobExecution::Queue).await;
    let media = t
        .library
        .add_media(t.png("photo.png", 40, 20))
        .to_media_collection("images", None)
        .await
        .unwrap();
    t.library.wait_for_jobs().await;

    let queue = t.library.queue().unwrap();
    let job_id = queue
        .submit(Job::PerformConversions {
            media_id: media.id,
            conversion_names: vec!["preview".to_string(), "retired".to_string()],
            only_missing: false,
        })
        .unwrap();
    t.library.wait_for_jobs().await;

    let record = queue.record(job_id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    let result = record.result.unwrap();
    assert_eq!(result["media_id"], media.id.to_string());
    assert_eq!(result["conversions"], serde_json::json!(["preview"]));
}

#[tokio::test]
async fn test_responsive_job_stores_variants() {
    let t = setup_library(JobExecution::Queue).await;
    let media = t
        .library
        .add_media(t.png("photo.png", 40, 20))
        .to_media_collection("images", None)
        .await
        .unwrap();
    t.library.wait_for_jobs().await;
    assert!(!t.repository.get(media.id).await.unwrap().has_responsive_images());

    let queue = t.library.queue().unwrap();
    let job_id = queue
        .submit(Job::GenerateResponsiveImages { media_id: media.id })
        .unwrap();
    t.library.wait_for_jobs().await;

    let record = queue.record(job_id).unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.result.unwrap()["variants"], 3);

    let stored = t.repository.get(media.id).await.unwrap();
    assert!(stored.has_responsive_images());
    assert!(stored.has_generated_conversion("thumb"));
}

#[tokio::test]
async fn test_inline_job_failure_surfaces_as_dispatch_error() {
    let t = setup_library(JobExecution::Inline).await;
    assert!(t.library.queue().is_none());

    let err = t
        .library
        .manipulator()
        .dispatcher()
        .dispatch(Job::GenerateResponsiveImages {
            media_id: Uuid::new_v4(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MediaLibraryError::JobDispatch(_)));
}

#[tokio::test]
async fn test_shutdown_waits_for_running_jobs() {
    let t = setup_library(JobExecution::Queue).await;
    let media = t
        .library
        .add_media(t.png("photo.png", 40, 20))
        .to_media_collection("images", None)
        .await
        .unwrap();

    t.library.shutdown().await;

    let stored = t.repository.get(media.id).await.unwrap();
    assert!(stored.has_generated_conversion("preview"));
}
