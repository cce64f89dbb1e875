use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use medialib_core::models::{Media, OwnerRef};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::media::{MediaRepository, RepositoryResult};

/// Repository held in process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaRepository {
    records: Arc<RwLock<HashMap<Uuid, Media>>>,
}

impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Media> {
        let mut items: Vec<Media> = self.records.read().await.values().cloned().collect();
        sort_by_order(&mut items);
        items
    }
}

fn sort_by_order(items: &mut [Media]) {
    items.sort_by(|a, b| {
        a.order_column
            .cmp(&b.order_column)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn save(&self, media: &Media) -> RepositoryResult<Media> {
        let mut records = self.records.write().await;

        let mut stored = media.clone();
        if stored.order_column.is_none() {
            let highest = records
                .values()
                .filter_map(|existing| existing.order_column)
                .max()
                .unwrap_or(0);
            stored.order_column = Some(highest + 1);
        }
        stored.updated_at = Utc::now();

        let inserted = records.insert(stored.id, stored.clone()).is_none();
        tracing::debug!(
            media_id = %stored.id,
            order_column = ?stored.order_column,
            inserted,
            "Media record saved"
        );

        Ok(stored)
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Media>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn get_collection(
        &self,
        owner: Option<&OwnerRef>,
        collection_name: &str,
    ) -> RepositoryResult<Vec<Media>> {
        let owner = owner.cloned();
        let mut items: Vec<Media> = self
            .records
            .read()
            .await
            .values()
            .filter(|media| media.collection_name == collection_name && media.owner() == owner)
            .cloned()
            .collect();
        sort_by_order(&mut items);
        Ok(items)
    }

    async fn get_by_owner(&self, owner: &OwnerRef) -> RepositoryResult<Vec<Media>> {
        let mut items: Vec<Media> = self
            .records
            .read()
            .await
            .values()
            .filter(|media| media.owner().as_ref() == Some(owner))
            .cloned()
            .collect();
        sort_by_order(&mut items);
        Ok(items)
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RepositoryError;

    fn owned(collection: &str, owner: &OwnerRef) -> Media {
        let mut media = Media::new(collection, "a.jpg", "public", "public");
        media.set_owner(Some(owner));
        media
    }

    #[tokio::test]
    async fn save_assigns_increasing_order_column() {
        let repository = InMemoryMediaRepository::new();
        let owner = OwnerRef::new("post", "1");

        let first = repository.save(&owned("images", &owner)).await.unwrap();
        let second = repository.save(&owned("images", &owner)).await.unwrap();
        assert_eq!(first.order_column, Some(1));
        assert_eq!(second.order_column, Some(2));

        let resaved = repository.save(&first).await.unwrap();
        assert_eq!(resaved.order_column, Some(1));
        assert_eq!(repository.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn collection_query_filters_owner_and_name() {
        let repository = InMemoryMediaRepository::new();
        let post = OwnerRef::new("post", "1");
        let other = OwnerRef::new("post", "2");

        let a = repository.save(&owned("images", &post)).await.unwrap();
        repository.save(&owned("downloads", &post)).await.unwrap();
        repository.save(&owned("images", &other)).await.unwrap();
        let b = repository.save(&owned("images", &post)).await.unwrap();
        repository
            .save(&Media::new("images", "loose.jpg", "public", "public"))
            .await
            .unwrap();

        let ids: Vec<Uuid> = repository
            .get_collection(Some(&post), "images")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(repository.get_by_owner(&post).await.unwrap().len(), 3);
        assert_eq!(repository.get_collection(None, "images").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let repository = InMemoryMediaRepository::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            repository.get(id).await,
            Err(RepositoryError::NotFound(missing)) if missing == id
        ));
        assert!(!repository.delete(id).await.unwrap());
    }
}
