mod backend;

use anyhow::Context;
use backend::{EmbedderBackend, StoreBackend};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use groundwork_core::{
    Assistant, CharacterNgramEmbedder, ChatOptions, Embedder, IndexingPipeline, IngestionOptions,
    LocalVectorStore, OllamaChat, OllamaConfig, OllamaEmbedder, QdrantStore, RetrievedContext,
    Retriever, VectorIndex, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL,
    SUPPORTED_EXTENSIONS,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "groundwork", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Folder with the source documents (.txt, .md, .pdf, .docx)
    #[arg(long, env = "GROUNDWORK_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Vector store backend
    #[arg(long, env = "GROUNDWORK_STORE", value_enum, default_value_t = StoreKind::Local)]
    store: StoreKind,

    /// Directory of the local vector store
    #[arg(long, env = "GROUNDWORK_STORE_DIR", default_value = "vector_db")]
    store_dir: PathBuf,

    /// Collection name shared by indexing and serving
    #[arg(long, env = "GROUNDWORK_COLLECTION", default_value = "founder_docs")]
    collection: String,

    /// Qdrant base URL (only with --store qdrant)
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Ollama base URL for embeddings and chat
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Embedding backend
    #[arg(long, env = "GROUNDWORK_EMBEDDER", value_enum, default_value_t = EmbedderKind::Ollama)]
    embedder: EmbedderKind,

    /// Embedding model name
    #[arg(long, env = "GROUNDWORK_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embedding request timeout in seconds (defaults: 120 for index, 60 otherwise)
    #[arg(long, env = "GROUNDWORK_EMBED_TIMEOUT_SECS")]
    embed_timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoreKind {
    Local,
    Qdrant,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Ollama-compatible embedding service
    Ollama,
    /// Offline hashed character trigrams
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed and store every document of the data folder.
    Index {
        /// Drop the collection before indexing instead of adding to it.
        #[arg(long, default_value_t = false)]
        reset: bool,
        /// Maximum characters per chunk.
        #[arg(long, default_value = "800")]
        max_chars: usize,
        /// Characters shared by consecutive chunks.
        #[arg(long, default_value = "150")]
        overlap: usize,
    },
    /// Print the context block retrieved for a query.
    Search {
        #[arg(long)]
        query: String,
        /// Number of passages to retrieve.
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
    /// Answer a question grounded in the indexed documents.
    Ask {
        #[arg(long)]
        question: String,
        /// Number of passages to retrieve.
        #[arg(long, default_value = "4")]
        top_k: usize,
        /// Chat model name
        #[arg(long, env = "GROUNDWORK_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
        chat_model: String,
        /// Chat request timeout in seconds
        #[arg(long, env = "GROUNDWORK_CHAT_TIMEOUT_SECS", default_value = "60")]
        chat_timeout_secs: u64,
        /// File replacing the built-in system prompt
        #[arg(long)]
        system_prompt_file: Option<PathBuf>,
    },
    /// Remove every entry from the collection.
    Clear,
}

impl Cli {
    fn embed_timeout(&self) -> Duration {
        let default = match self.command {
            Command::Index { .. } => 120,
            _ => 60,
        };
        Duration::from_secs(self.embed_timeout_secs.unwrap_or(default))
    }

    fn build_embedder(&self) -> anyhow::Result<EmbedderBackend> {
        match self.embedder {
            EmbedderKind::Ngram => Ok(EmbedderBackend::Ngram(CharacterNgramEmbedder::default())),
            EmbedderKind::Ollama => {
                let embedder = OllamaEmbedder::new(OllamaConfig {
                    base_url: self.ollama_url.clone(),
                    model: self.embedding_model.clone(),
                    timeout: self.embed_timeout(),
                })
                .context("invalid embedding service configuration")?;
                Ok(EmbedderBackend::Ollama(embedder))
            }
        }
    }

    async fn open_store(&self) -> anyhow::Result<StoreBackend> {
        match self.store {
            StoreKind::Local => {
                let store = LocalVectorStore::open(&self.store_dir, &self.collection)
                    .await
                    .with_context(|| {
                        format!("unable to open vector store at {}", self.store_dir.display())
                    })?;
                Ok(StoreBackend::Local(store))
            }
            StoreKind::Qdrant => {
                let store =
                    QdrantStore::new(&self.qdrant_url, &self.collection, Duration::from_secs(30))
                        .context("invalid qdrant configuration")?;
                Ok(StoreBackend::Qdrant(store))
            }
        }
    }
}

/// Builds the pipeline and only then applies `--reset`, so invalid chunk
/// settings never cost the existing collection.
async fn prepare_index_run<E, V>(
    embedder: E,
    store: V,
    options: &IngestionOptions,
    reset: bool,
) -> anyhow::Result<IndexingPipeline<E, V>>
where
    E: Embedder,
    V: VectorIndex,
{
    let pipeline = IndexingPipeline::new(embedder, store, options)
        .context("invalid chunking options")?;

    let existing = pipeline.index().count().await?;
    if reset {
        pipeline.index().clear().await?;
        info!(removed = existing, "collection reset before indexing");
    } else if existing > 0 {
        warn!(
            existing,
            "collection is not empty; re-indexing adds duplicate entries (use --reset)"
        );
    }
    Ok(pipeline)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %cli.collection,
        "groundwork boot"
    );

    let embedder = cli.build_embedder()?;
    let store = cli.open_store().await?;

    match &cli.command {
        Command::Index {
            reset,
            max_chars,
            overlap,
        } => {
            let options = IngestionOptions {
                chunk_max_chars: *max_chars,
                chunk_overlap_chars: *overlap,
            };
            let pipeline = prepare_index_run(embedder, store, &options, *reset).await?;
            let report = pipeline.index_all(&cli.data_dir).await?;

            if report.is_empty() {
                println!(
                    "no supported files ({}) in {}",
                    SUPPORTED_EXTENSIONS.join(", "),
                    cli.data_dir.display()
                );
                return Ok(());
            }

            for document in &report.indexed {
                println!(
                    "indexed {} ({} chunks)",
                    document.fingerprint.source, document.chunk_count
                );
            }
            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.path.display(), skipped.reason);
            }

            println!(
                "{} chunks from {} documents indexed at {} ({} skipped)",
                report.chunk_count(),
                report.indexed.len(),
                report.finished_at.to_rfc3339(),
                report.skipped.len()
            );
        }
        Command::Search { query, top_k } => {
            let retriever = Retriever::new(embedder, store);
            match retriever.retrieve(query, *top_k).await? {
                RetrievedContext::Grounded(matches) => {
                    for entry in &matches {
                        info!(
                            source = %entry.metadata.source,
                            chunk = entry.metadata.chunk,
                            score = entry.score,
                            "match"
                        );
                    }
                    println!("{}", groundwork_core::render_context(&matches));
                }
                RetrievedContext::Empty => println!("no matching passages"),
                RetrievedContext::Degraded(error) => {
                    println!("no context available (embedding service failed: {error})")
                }
            }
        }
        Command::Ask {
            question,
            top_k,
            chat_model,
            chat_timeout_secs,
            system_prompt_file,
        } => {
            let chat = OllamaChat::new(ChatOptions {
                base_url: cli.ollama_url.clone(),
                model: chat_model.clone(),
                timeout: Duration::from_secs(*chat_timeout_secs),
                ..ChatOptions::default()
            })
            .context("invalid chat service configuration")?;

            let mut assistant =
                Assistant::new(Retriever::new(embedder, store), chat).with_top_k(*top_k);
            if let Some(path) = system_prompt_file {
                let prompt = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("unable to read {}", path.display()))?;
                assistant = assistant.with_system_prompt(prompt);
            }

            let answer = assistant.answer(question).await?;
            println!("{}", answer.reply);
            if answer.is_grounded() {
                println!("\nsources: {}", answer.sources.join(", "));
            } else {
                println!("\nsources: none (no matching document passages)");
            }
        }
        Command::Clear => {
            let removed = store.count().await?;
            store.clear().await?;
            println!("removed {removed} entries from {}", cli.collection);
        }
    }

    Ok(())
}
