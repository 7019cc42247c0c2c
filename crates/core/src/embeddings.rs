use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Turns text into a vector. Every vector stored in one index must come from
/// the same embedder.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Resolves `path` below `base`, keeping any path prefix `base` already has.
pub(crate) fn join_endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Client for an Ollama-compatible `/api/embeddings` endpoint.
///
/// A single attempt is made per call; timeouts and non-success statuses are
/// returned as errors, never as a zero vector.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaConfig) -> Result<Self, EmbeddingError> {
        let endpoint = join_endpoint(&config.base_url, "api/embeddings")?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            model: config.model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(model = %self.model, text_len = text.len(), "requesting embedding");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|error| EmbeddingError::from_transport(self.endpoint.as_str(), error))?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                details,
            });
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingError::Malformed(error.to_string()))?;

        match payload.embedding {
            Some(vector) if !vector.is_empty() => Ok(vector),
            Some(_) => Err(EmbeddingError::Malformed("embedding was empty".to_string())),
            None => Err(EmbeddingError::Malformed(
                "response has no `embedding` field".to_string(),
            )),
        }
    }
}

/// Local, deterministic embedder hashing character trigrams into buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    fn bucket(&self, trigram: &[char]) -> usize {
        let mut hash = 1469598103934665603u64;
        for ch in trigram {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
        }
        (hash % self.dimensions.max(1) as u64) as usize
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmbeddingError::Malformed(
                "cannot embed blank text".to_string(),
            ));
        }

        let padded: Vec<char> = format!(" {} ", trimmed.to_lowercase()).chars().collect();
        let mut vector = vec![0f32; self.dimensions.max(1)];
        for trigram in padded.windows(3) {
            vector[self.bucket(trigram)] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        for value in &mut vector {
            *value /= magnitude;
        }

        Ok(vector)
    }
}
