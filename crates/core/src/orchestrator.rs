use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{EmbeddingError, IndexError, ScoredEntry};
use tracing::{debug, warn};

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
pub const DEFAULT_TOP_K: usize = 4;

/// Outcome of a retrieval. Only an embedding failure degrades; index failures
/// are returned as errors by [`Retriever::retrieve`].
#[derive(Debug)]
pub enum RetrievedContext {
    Grounded(Vec<ScoredEntry>),
    Empty,
    Degraded(EmbeddingError),
}

impl RetrievedContext {
    pub fn is_grounded(&self) -> bool {
        matches!(self, RetrievedContext::Grounded(_))
    }

    pub fn matches(&self) -> &[ScoredEntry] {
        match self {
            RetrievedContext::Grounded(matches) => matches,
            RetrievedContext::Empty | RetrievedContext::Degraded(_) => &[],
        }
    }

    /// Distinct source filenames in rank order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for entry in self.matches() {
            if !sources.contains(&entry.metadata.source) {
                sources.push(entry.metadata.source.clone());
            }
        }
        sources
    }

    /// `[<source>] <text>` blocks joined by [`CONTEXT_SEPARATOR`]; the empty
    /// string means nothing was found.
    pub fn render(&self) -> String {
        render_context(self.matches())
    }
}

pub fn render_context(matches: &[ScoredEntry]) -> String {
    matches
        .iter()
        .map(|entry| format!("[{}] {}", entry.metadata.source, entry.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Read path: embeds a question and looks up its nearest chunks.
pub struct Retriever<E, V> {
    embedder: E,
    index: V,
}

impl<E, V> Retriever<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext, IndexError> {
        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(%error, "query embedding failed; continuing without context");
                return Ok(RetrievedContext::Degraded(error));
            }
        };

        let matches = self.index.query(&vector, k).await?;
        debug!(k, found = matches.len(), "retrieved context");

        if matches.is_empty() {
            Ok(RetrievedContext::Empty)
        } else {
            Ok(RetrievedContext::Grounded(matches))
        }
    }

    pub async fn retrieve_context(&self, query: &str, k: usize) -> Result<String, IndexError> {
        Ok(self.retrieve(query, k).await?.render())
    }
}
