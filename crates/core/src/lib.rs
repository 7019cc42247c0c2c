pub mod assistant;
pub mod chunking;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

pub use assistant::{build_messages, Answer, Assistant, DEFAULT_SYSTEM_PROMPT};
pub use chunking::{ChunkWindow, Chunker};
pub use completion::{ChatMessage, ChatModel, ChatOptions, OllamaChat, Role, DEFAULT_CHAT_MODEL};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaConfig, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
};
pub use error::{
    AssistantError, CompletionError, DocumentError, EmbeddingError, IndexError, IngestError,
    PipelineError,
};
pub use extractor::{
    extract_text, DocumentFormat, DocxExtractor, LopdfExtractor, PageText, PlainTextExtractor,
    TextExtractor, SUPPORTED_EXTENSIONS,
};
pub use ingest::{
    discover_documents, IndexedDocument, IndexingPipeline, IndexingReport, SkippedDocument,
};
pub use models::{ChunkMetadata, DocumentFingerprint, IndexEntry, IngestionOptions, ScoredEntry};
pub use orchestrator::{
    render_context, RetrievedContext, Retriever, CONTEXT_SEPARATOR, DEFAULT_TOP_K,
};
pub use stores::{LocalVectorStore, QdrantStore};
pub use traits::VectorIndex;
