use async_trait::async_trait;
use groundwork_core::{
    CharacterNgramEmbedder, Embedder, EmbeddingError, IndexEntry, IndexError, LocalVectorStore,
    OllamaEmbedder, QdrantStore, ScoredEntry, VectorIndex,
};

/// Vector store selected on the command line.
pub enum StoreBackend {
    Local(LocalVectorStore),
    Qdrant(QdrantStore),
}

#[async_trait]
impl VectorIndex for StoreBackend {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        match self {
            StoreBackend::Local(store) => store.upsert(entries).await,
            StoreBackend::Qdrant(store) => store.upsert(entries).await,
        }
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, IndexError> {
        match self {
            StoreBackend::Local(store) => store.query(vector, k).await,
            StoreBackend::Qdrant(store) => store.query(vector, k).await,
        }
    }

    async fn count(&self) -> Result<usize, IndexError> {
        match self {
            StoreBackend::Local(store) => store.count().await,
            StoreBackend::Qdrant(store) => store.count().await,
        }
    }

    async fn clear(&self) -> Result<(), IndexError> {
        match self {
            StoreBackend::Local(store) => store.clear().await,
            StoreBackend::Qdrant(store) => store.clear().await,
        }
    }
}

/// Embedder selected on the command line.
pub enum EmbedderBackend {
    Ollama(OllamaEmbedder),
    Ngram(CharacterNgramEmbedder),
}

#[async_trait]
impl Embedder for EmbedderBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            EmbedderBackend::Ollama(embedder) => embedder.embed(text).await,
            EmbedderBackend::Ngram(embedder) => embedder.embed(text).await,
        }
    }
}
