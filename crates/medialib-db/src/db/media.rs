use async_trait::async_trait;
use medialib_core::models::{Media, OwnerRef};
use medialib_core::MediaLibraryError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Media not found: {0}")]
    NotFound(Uuid),

    #[error("Repository backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<RepositoryError> for MediaLibraryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => MediaLibraryError::MediaNotFound(id),
            other => MediaLibraryError::Database(other.to_string()),
        }
    }
}

/// Persistence of media records
///
/// `save` is an upsert keyed by `media.id`. Records without an
/// `order_column` get one greater than any stored so far, so ordering by
/// `order_column` is ordering by insertion.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert or update `media` and return the stored record.
    async fn save(&self, media: &Media) -> RepositoryResult<Media>;

    async fn find(&self, id: Uuid) -> RepositoryResult<Option<Media>>;

    async fn get(&self, id: Uuid) -> RepositoryResult<Media> {
        self.find(id).await?.ok_or(RepositoryError::NotFound(id))
    }

    /// Remove the record; `false` when it did not exist.
    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;

    /// Media of one owner and collection, ordered by `order_column`.
    ///
    /// `owner = None` selects media without an owner.
    async fn get_collection(
        &self,
        owner: Option<&OwnerRef>,
        collection_name: &str,
    ) -> RepositoryResult<Vec<Media>>;

    /// Every media item of one owner, ordered by `order_column`.
    async fn get_by_owner(&self, owner: &OwnerRef) -> RepositoryResult<Vec<Media>>;

    async fn count(&self) -> RepositoryResult<usize>;
}
