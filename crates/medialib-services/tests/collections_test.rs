mod helpers;

use helpers::{as_owner, setup_library, Post};
use medialib_core::constants::RESPONSIVE_ORIGINAL_CONVERSION;
use medialib_core::{MediaLibraryError, OwnerRef};
use medialib_db::MediaRepository;
use medialib_services::JobExecution;
use medialib_storage::Storage;

#[tokio::test]
async fn test_size_limit_removes_oldest_unowned_items() {
    let t = setup_library(JobExecution::Inline).await;

    let mut ids = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        let source = t.png(name, 20, 20);
        let media = t
            .library
            .add_media(&source)
            .to_media_collection("avatars", None)
            .await
            .unwrap();
        ids.push(media.id);
    }

    let remaining = t.library.get_media(None, "avatars").await.unwrap();
    let remaining_ids: Vec<_> = remaining.iter().map(|m| m.id).collect();
    assert_eq!(remaining_ids, vec![ids[1], ids[2]]);

    assert!(t.repository.find(ids[0]).await.unwrap().is_none());
    assert!(!t
        .public
        .exists(&format!("{}/a.png", ids[0]))
        .await
        .unwrap());
    assert!(t
        .public
        .list(&format!("{}/", ids[0]))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_owner_collection_limit_and_conversions() {
    let t = setup_library(JobExecution::Inline).await;
    let post = Post::saved("1");
    let other = Post::saved("2");

    let kept_elsewhere = t
        .library
        .file_adder_factory()
        .create(Some(as_owner(&other)), t.png("other.png", 20, 20))
        .to_media_collection("gallery", None)
        .await
        .unwrap();

    let mut ids = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        let media = t
            .library
            .file_adder_factory()
            .create(Some(as_owner(&post)), t.png(name, 32, 16))
            .to_media_collection("gallery", None)
            .await
            .unwrap();
        assert_eq!(media.owner(), Some(OwnerRef::new("post", "1")));
        assert!(media.has_generated_conversion("card"));
        ids.push(media.id);
    }

    let owner = OwnerRef::new("post", "1");
    let gallery = t.library.get_media(Some(&owner), "gallery").await.unwrap();
    assert_eq!(gallery.len(), 2);
    assert!(gallery.iter().all(|m| m.id != ids[0]));

    assert!(t.repository.find(kept_elsewhere.id).await.unwrap().is_some());
    assert!(t
        .public
        .exists(&format!("{}/conversions/c-card.jpg", ids[2]))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_owner_conversions_only_apply_to_their_collection() {
    let t = setup_library(JobExecution::Inline).await;
    let post = Post::saved("1");

    let media = t
        .library
        .file_adder_factory()
        .create(Some(as_owner(&post)), t.png("photo.png", 40, 20))
        .to_media_collection("images", None)
        .await
        .unwrap();

    assert!(media.has_generated_conversion("thumb"));
    assert!(!media.has_generated_conversion("card"));
}

#[tokio::test]
async fn test_unsaved_owner_parks_media_until_processed() {
    let t = setup_library(JobExecution::Inline).await;
    let post = Post::unsaved();
    let owner = as_owner(&post);
    let source = t.png("draft.png", 40, 20);

    let parked = t
        .library
        .file_adder_factory()
        .create(Some(owner.clone()), &source)
        .to_media_collection("gallery", None)
        .await
        .unwrap();

    assert_eq!(t.repository.count().await.unwrap(), 0);
    assert!(t.public.is_empty().await);
    assert_eq!(owner.unattached_media().len(), 1);
    assert!(source.exists());

    post.save("9");
    let processed = t.library.process_unattached_media(&owner).await.unwrap();

    assert_eq!(processed.len(), 1);
    let media = &processed[0];
    assert_eq!(media.id, parked.id);
    assert_eq!(media.owner(), Some(OwnerRef::new("post", "9")));
    assert!(media.has_generated_conversion("card"));
    assert!(owner.unattached_media().is_empty());
    assert!(!source.exists());
    assert!(t
        .public
        .exists(&format!("{}/draft.png", media.id))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_processing_unattached_media_requires_saved_owner() {
    let t = setup_library(JobExecution::Inline).await;
    let owner = as_owner(&Post::unsaved());

    let err = t.library.process_unattached_media(&owner).await.unwrap_err();
    assert!(matches!(err, MediaLibraryError::InvalidInput(_)));
}

#[tokio::test]
async fn test_collection_requests_responsive_images() {
    let t = setup_library(JobExecution::Inline).await;
    let source = t.png("banner.png", 80, 40);

    let media = t
        .library
        .add_media(&source)
        .to_media_collection("banners", None)
        .await
        .unwrap();

    assert!(media.should_generate_responsive_images());
    let set = media
        .responsive_images_for(RESPONSIVE_ORIGINAL_CONVERSION)
        .expect("responsive set for the original");
    let widths: Vec<u32> = set.images.iter().map(|image| image.width).collect();
    assert_eq!(widths, vec![80, 40, 20, 10]);

    for image in &set.images {
        assert!(image.url.starts_with("https://cdn.test/"));
    }
    assert_eq!(
        t.library
            .responsive_image_urls(&media, RESPONSIVE_ORIGINAL_CONVERSION)
            .len(),
        4
    );
    assert!(t.event_names().contains(&"responsive_images_generated"));
}

#[tokio::test]
async fn test_adder_requests_responsive_images() {
    let t = setup_library(JobExecution::Queue).await;
    let source = t.png("photo.png", 40, 20);

    let media = t
        .library
        .add_media(&source)
        .with_responsive_images()
        .to_media_collection("images", None)
        .await
        .unwrap();
    t.library.wait_for_jobs().await;

    let stored = t.repository.get(media.id).await.unwrap();
    assert!(stored.has_responsive_images());
    assert!(stored.has_generated_conversion("thumb"));
    assert!(stored.has_generated_conversion("preview"));
}

#[tokio::test]
async fn test_clear_collection_emits_event() {
    let t = setup_library(JobExecution::Inline).await;
    for name in ["a.png", "b.png"] {
        t.library
            .add_media(t.png(name, 20, 20))
            .to_media_collection("images", None)
            .await
            .unwrap();
    }

    t.library.clear_media_collection(None, "images").await.unwrap();

    assert!(t.library.get_media(None, "images").await.unwrap().is_empty());
    assert!(t.public.is_empty().await);
    assert_eq!(t.event_names().last(), Some(&"collection_has_been_cleared"));
}

#[tokio::test]
async fn test_clear_collection_except_keeps_listed_items() {
    let t = setup_library(JobExecution::Inline).await;
    let mut ids = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        let media = t
            .library
            .add_media(t.png(name, 20, 20))
            .to_media_collection("images", None)
            .await
            .unwrap();
        ids.push(media.id);
    }

    t.library
        .clear_media_collection_except(None, "images", &[ids[1]])
        .await
        .unwrap();

    let remaining: Vec<_> = t
        .library
        .get_media(None, "images")
        .await
        .unwrap()
        .iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(remaining, vec![ids[1]]);
}
