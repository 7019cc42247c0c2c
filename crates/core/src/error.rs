use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("text extraction failed for {path}: {details}")]
    Extraction { path: String, details: String },

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {details}")]
    Status { status: u16, details: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl EmbeddingError {
    pub(crate) fn from_transport(endpoint: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            EmbeddingError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            EmbeddingError::Http(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt index file {path} at line {line}: {details}")]
    Corrupt {
        path: String,
        line: usize,
        details: String,
    },

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("store not available: {0}")]
    Unavailable(String),
}

impl IndexError {
    pub(crate) fn from_transport(endpoint: &str, error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            IndexError::Unavailable(format!("{endpoint}: {error}"))
        } else {
            IndexError::Http(error)
        }
    }
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("chat request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat service returned {status}: {details}")]
    Status { status: u16, details: String },

    #[error("chat response contained no message.content")]
    MissingContent,

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("no question was given")]
    EmptyQuestion,

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("upstream completion failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Why a single document was left out of an indexing run.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("chunk {chunk}: {source}")]
    Embedding {
        chunk: u64,
        #[source]
        source: EmbeddingError,
    },
}

/// Failures that stop a whole indexing run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
