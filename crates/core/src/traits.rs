use crate::{IndexEntry, IndexError, ScoredEntry};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Adds entries without deduplicating; re-indexing a document with fresh
    /// ids leaves the older entries in place.
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError>;

    /// Returns at most `k` entries by descending similarity. An empty index
    /// yields an empty result for any vector.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, IndexError>;

    async fn count(&self) -> Result<usize, IndexError>;

    async fn clear(&self) -> Result<(), IndexError>;
}

#[async_trait]
impl<T> VectorIndex for Arc<T>
where
    T: VectorIndex + ?Sized,
{
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        (**self).upsert(entries).await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, IndexError> {
        (**self).query(vector, k).await
    }

    async fn count(&self) -> Result<usize, IndexError> {
        (**self).count().await
    }

    async fn clear(&self) -> Result<(), IndexError> {
        (**self).clear().await
    }
}
