use crate::embeddings::join_endpoint;
use crate::traits::VectorIndex;
use crate::{ChunkMetadata, IndexEntry, IndexError, ScoredEntry};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;
use url::Url;

/// [`VectorIndex`] over a Qdrant collection using its HTTP API.
///
/// The collection is created with cosine distance on the first upsert, sized
/// from the first vector. Querying a collection that does not exist yet
/// returns no matches.
pub struct QdrantStore {
    endpoint: Url,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IndexError> {
        let collection = collection.into();
        if collection.trim().is_empty() || collection.contains('/') {
            return Err(IndexError::InvalidCollection(collection));
        }

        Ok(Self {
            endpoint: join_endpoint(endpoint, "")?,
            collection,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn url(&self, suffix: &str) -> Result<Url, IndexError> {
        Ok(self
            .endpoint
            .join(&format!("collections/{}{}", self.collection, suffix))?)
    }

    pub async fn collection_exists(&self) -> Result<bool, IndexError> {
        let response = self
            .client
            .get(self.url("")?)
            .send()
            .await
            .map_err(|error| IndexError::from_transport(self.endpoint.as_str(), error))?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(backend_error(response).await),
        }
    }

    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), IndexError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let response = self
            .client
            .put(self.url("")?)
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await
            .map_err(|error| IndexError::from_transport(self.endpoint.as_str(), error))?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        info!(collection = %self.collection, vector_size, "created qdrant collection");
        Ok(())
    }
}

async fn backend_error(response: Response) -> IndexError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    IndexError::BackendResponse {
        backend: "qdrant".to_string(),
        details: format!("{status}: {body}"),
    }
}

fn malformed(details: impl Into<String>) -> IndexError {
    IndexError::BackendResponse {
        backend: "qdrant".to_string(),
        details: details.into(),
    }
}

fn parse_search_hits(parsed: &Value) -> Result<Vec<ScoredEntry>, IndexError> {
    let hits = parsed
        .pointer("/result")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("search response has no result array"))?;

    hits.iter()
        .map(|hit| {
            let text = hit
                .pointer("/payload/text")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("hit payload has no text"))?;
            let source = hit
                .pointer("/payload/source")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("hit payload has no source"))?;
            let chunk = hit
                .pointer("/payload/chunk")
                .and_then(Value::as_u64)
                .ok_or_else(|| malformed("hit payload has no chunk index"))?;
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

            Ok(ScoredEntry {
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source: source.to_string(),
                    chunk,
                },
                score: score as f32,
            })
        })
        .collect()
}

#[async_trait]
impl VectorIndex for QdrantStore {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let vector_size = first.vector.len();
        if let Some(bad) = entries.iter().find(|entry| entry.vector.len() != vector_size) {
            return Err(IndexError::DimensionMismatch {
                expected: vector_size,
                actual: bad.vector.len(),
            });
        }

        self.ensure_collection(vector_size).await?;

        let points = entries
            .iter()
            .map(|entry| {
                json!({
                    "id": entry.id,
                    "vector": entry.vector,
                    "payload": {
                        "text": entry.text,
                        "source": entry.metadata.source,
                        "chunk": entry.metadata.chunk,
                    },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(self.url("/points?wait=true")?)
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|error| IndexError::from_transport(self.endpoint.as_str(), error))?;

        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.url("/points/search")?)
            .json(&json!({
                "vector": vector,
                "limit": k,
                "with_payload": true,
            }))
            .send()
            .await
            .map_err(|error| IndexError::from_transport(self.endpoint.as_str(), error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let parsed: Value = response.json().await?;
        parse_search_hits(&parsed)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let response = self
            .client
            .post(self.url("/points/count")?)
            .json(&json!({ "exact": true }))
            .send()
            .await
            .map_err(|error| IndexError::from_transport(self.endpoint.as_str(), error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .map(|count| count as usize)
            .ok_or_else(|| malformed("count response has no result.count"))
    }

    async fn clear(&self) -> Result<(), IndexError> {
        let response = self
            .client
            .delete(self.url("")?)
            .send()
            .await
            .map_err(|error| IndexError::from_transport(self.endpoint.as_str(), error))?;
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            info!(collection = %self.collection, "dropped qdrant collection");
            return Ok(());
        }
        Err(backend_error(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_urls_are_built_below_the_endpoint() {
        let store = QdrantStore::new("http://localhost:6333", "founder_docs", Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            store.url("/points/search").unwrap().as_str(),
            "http://localhost:6333/collections/founder_docs/points/search"
        );
    }

    #[test]
    fn invalid_collection_is_rejected() {
        let result = QdrantStore::new("http://localhost:6333", "a/b", Duration::from_secs(5));
        assert!(matches!(result, Err(IndexError::InvalidCollection(_))));
    }

    #[test]
    fn search_hits_keep_server_order() {
        let response = json!({
            "result": [
                {"id": "1", "score": 0.92, "payload": {"text": "text A", "source": "a.md", "chunk": 3}},
                {"id": "2", "score": 0.41, "payload": {"text": "text B", "source": "b.pdf", "chunk": 0}}
            ],
            "status": "ok"
        });

        let hits = parse_search_hits(&response).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.source, "a.md");
        assert_eq!(hits[0].metadata.chunk, 3);
        assert_eq!(hits[1].text, "text B");
    }

    #[test]
    fn hits_without_text_are_rejected() {
        let response = json!({
            "result": [{"id": "1", "score": 0.5, "payload": {"source": "a.md"}}]
        });
        assert!(parse_search_hits(&response).is_err());
    }

    #[test]
    fn hits_without_chunk_index_are_rejected() {
        let response = json!({
            "result": [{"id": "1", "score": 0.5, "payload": {"text": "text A", "source": "a.md"}}]
        });
        assert!(matches!(
            parse_search_hits(&response),
            Err(IndexError::BackendResponse { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_unavailable() {
        let store = QdrantStore::new("http://127.0.0.1:9", "founder_docs", Duration::from_secs(2))
            .unwrap();
        let result = store.count().await;
        assert!(matches!(result, Err(IndexError::Unavailable(_))));
    }
}
