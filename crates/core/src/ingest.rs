use crate::chunking::Chunker;
use crate::embeddings::Embedder;
use crate::extractor::{extract_document, DocumentFormat};
use crate::traits::VectorIndex;
use crate::{
    ChunkMetadata, DocumentError, DocumentFingerprint, IndexEntry, IngestError, IngestionOptions,
    PipelineError,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Files directly inside `folder` with a supported extension, sorted by path.
pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if DocumentFormat::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn build_document_fingerprint(path: &Path, bytes: &[u8]) -> Result<DocumentFingerprint, IngestError> {
    let checksum = digest_bytes(bytes);
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    Ok(DocumentFingerprint {
        source: name.to_string(),
        path: path.to_path_buf(),
        checksum,
        indexed_at: Utc::now(),
    })
}

#[derive(Debug)]
pub struct IndexedDocument {
    pub fingerprint: DocumentFingerprint,
    pub chunk_count: usize,
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct IndexingReport {
    pub folder: PathBuf,
    pub indexed: Vec<IndexedDocument>,
    pub skipped: Vec<SkippedDocument>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl IndexingReport {
    pub fn chunk_count(&self) -> usize {
        self.indexed.iter().map(|document| document.chunk_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.skipped.is_empty()
    }
}

/// Write path: extract, chunk, embed and store every document of a folder.
///
/// Each document is committed with a single upsert once all of its chunks are
/// embedded, so a document that fails part-way leaves nothing in the index.
pub struct IndexingPipeline<E, V> {
    chunker: Chunker,
    embedder: E,
    index: V,
}

impl<E, V> IndexingPipeline<E, V>
where
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(embedder: E, index: V, options: &IngestionOptions) -> Result<Self, IngestError> {
        Ok(Self {
            chunker: Chunker::from_options(options)?,
            embedder,
            index,
        })
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    pub async fn index_all(&self, folder: &Path) -> Result<IndexingReport, PipelineError> {
        let started_at = Utc::now();
        fs::create_dir_all(folder).map_err(IngestError::Io)?;

        let files = discover_documents(folder);
        if files.is_empty() {
            info!(folder = %folder.display(), "no supported documents found");
        }

        let mut indexed = Vec::new();
        let mut skipped = Vec::new();

        for path in files {
            match self.prepare_document(&path).await {
                Ok((fingerprint, entries)) => {
                    self.index.upsert(&entries).await?;
                    info!(
                        source = %fingerprint.source,
                        chunks = entries.len(),
                        checksum = %fingerprint.checksum,
                        "indexed document"
                    );
                    indexed.push(IndexedDocument {
                        fingerprint,
                        chunk_count: entries.len(),
                    });
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipped document");
                    skipped.push(SkippedDocument {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(IndexingReport {
            folder: folder.to_path_buf(),
            indexed,
            skipped,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Builds every index entry for one document without touching the index.
    pub async fn prepare_document(
        &self,
        path: &Path,
    ) -> Result<(DocumentFingerprint, Vec<IndexEntry>), DocumentError> {
        let bytes = fs::read(path).map_err(IngestError::from)?;
        let fingerprint = build_document_fingerprint(path, &bytes)?;
        let text = extract_document(path, &bytes)?;
        let chunks = self.chunker.chunk_text(&text);

        let mut entries = Vec::with_capacity(chunks.len());
        for (position, chunk_text) in chunks.into_iter().enumerate() {
            let chunk = position as u64;
            let vector = self
                .embedder
                .embed(&chunk_text)
                .await
                .map_err(|source| DocumentError::Embedding { chunk, source })?;

            entries.push(IndexEntry {
                id: Uuid::new_v4().to_string(),
                vector,
                text: chunk_text,
                metadata: ChunkMetadata {
                    source: fingerprint.source.clone(),
                    chunk,
                },
            });
        }

        Ok((fingerprint, entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{CharacterNgramEmbedder, OllamaConfig, OllamaEmbedder};
    use crate::stores::LocalVectorStore;
    use crate::{EmbeddingError, IndexError, ScoredEntry};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FailOnMarker;

    #[async_trait]
    impl Embedder for FailOnMarker {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("FAIL") {
                return Err(EmbeddingError::Malformed("marker hit".to_string()));
            }
            CharacterNgramEmbedder::default().embed(text).await
        }
    }

    struct UnavailableIndex;

    #[async_trait]
    impl VectorIndex for UnavailableIndex {
        async fn upsert(&self, _entries: &[IndexEntry]) -> Result<(), IndexError> {
            Err(IndexError::Unavailable("disk full".to_string()))
        }

        async fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<ScoredEntry>, IndexError> {
            Ok(Vec::new())
        }

        async fn count(&self) -> Result<usize, IndexError> {
            Ok(0)
        }

        async fn clear(&self) -> Result<(), IndexError> {
            Ok(())
        }
    }

    #[test]
    fn discovery_is_flat_and_filters_extensions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        fs::create_dir(base.join("nested"))?;
        fs::write(base.join("b.md"), "# Playbook")?;
        fs::write(base.join("a.TXT"), "notes")?;
        fs::write(base.join("budget.xlsx"), "cells")?;
        fs::write(base.join("nested").join("c.txt"), "hidden")?;

        let files = discover_documents(base);
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.md"]);
        Ok(())
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            digest_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn fingerprint_hashes_the_extracted_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store_dir = tempdir()?;
        let file_path = dir.path().join("a.txt");
        fs::write(&file_path, b"abc")?;

        let pipeline = IndexingPipeline::new(
            CharacterNgramEmbedder::default(),
            LocalVectorStore::open(store_dir.path(), "docs").await?,
            &IngestionOptions::default(),
        )?;
        let (fingerprint, entries) = pipeline.prepare_document(&file_path).await?;

        assert_eq!(fingerprint.source, "a.txt");
        assert_eq!(fingerprint.checksum, digest_bytes(b"abc"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "abc");
        Ok(())
    }

    #[test]
    fn invalid_chunking_options_are_rejected() {
        let options = IngestionOptions {
            chunk_max_chars: 100,
            chunk_overlap_chars: 100,
        };
        let result = IndexingPipeline::new(CharacterNgramEmbedder::default(), UnavailableIndex, &options);
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }

    #[tokio::test]
    async fn single_text_file_becomes_one_entry() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        let db = tempdir()?;
        fs::write(data.path().join("hello.txt"), "Hello world")?;

        let store = LocalVectorStore::open(db.path(), "docs").await?;
        let pipeline = IndexingPipeline::new(
            CharacterNgramEmbedder::default(),
            store,
            &IngestionOptions::default(),
        )?;

        let report = pipeline.index_all(data.path()).await?;
        assert_eq!(report.indexed.len(), 1);
        assert_eq!(report.chunk_count(), 1);
        assert!(report.skipped.is_empty());

        let vector = CharacterNgramEmbedder::default().embed("Hello world").await?;
        let hits = pipeline.index().query(&vector, 4).await?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Hello world");
        assert_eq!(
            hits[0].metadata,
            ChunkMetadata {
                source: "hello.txt".to_string(),
                chunk: 0
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_folder_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        fs::write(data.path().join("ignored.csv"), "a,b")?;

        let pipeline = IndexingPipeline::new(
            CharacterNgramEmbedder::default(),
            UnavailableIndex,
            &IngestionOptions::default(),
        )?;

        let report = pipeline.index_all(data.path()).await?;
        assert!(report.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_folder_is_created() -> Result<(), Box<dyn std::error::Error>> {
        let parent = tempdir()?;
        let folder = parent.path().join("data");
        let pipeline = IndexingPipeline::new(
            CharacterNgramEmbedder::default(),
            UnavailableIndex,
            &IngestionOptions::default(),
        )?;

        let report = pipeline.index_all(&folder).await?;
        assert!(report.is_empty());
        assert!(folder.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn chunk_indices_follow_document_order() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        let db = tempdir()?;
        let text: String = (0..30).map(|n| format!("Paragraph {n} of the guide. ")).collect();
        fs::write(data.path().join("guide.md"), &text)?;

        let options = IngestionOptions {
            chunk_max_chars: 120,
            chunk_overlap_chars: 20,
        };
        let store = LocalVectorStore::open(db.path(), "docs").await?;
        let pipeline = IndexingPipeline::new(CharacterNgramEmbedder::default(), store, &options)?;

        let (_, entries) = pipeline.prepare_document(&data.path().join("guide.md")).await?;
        assert!(entries.len() > 1);
        for (position, entry) in entries.iter().enumerate() {
            assert_eq!(entry.metadata.chunk, position as u64);
            assert_eq!(entry.metadata.source, "guide.md");
            assert!(entry.text.chars().count() <= 120);
        }

        let ids: std::collections::HashSet<_> = entries.iter().map(|entry| &entry.id).collect();
        assert_eq!(ids.len(), entries.len());
        Ok(())
    }

    #[tokio::test]
    async fn embedding_failure_discards_the_whole_document() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        let db = tempdir()?;
        let mut long = "Intro to the event terms. ".repeat(10);
        long.push_str("FAIL here");
        fs::write(data.path().join("a_terms.txt"), &long)?;
        fs::write(data.path().join("b_privacy.txt"), "Privacy rules for attendees.")?;

        let options = IngestionOptions {
            chunk_max_chars: 100,
            chunk_overlap_chars: 10,
        };
        let store = LocalVectorStore::open(db.path(), "docs").await?;
        let pipeline = IndexingPipeline::new(FailOnMarker, store, &options)?;

        let report = pipeline.index_all(data.path()).await?;
        assert_eq!(report.indexed.len(), 1);
        assert_eq!(report.indexed[0].fingerprint.source, "b_privacy.txt");
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("a_terms.txt"));
        assert_eq!(pipeline.index().count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_embedding_service_skips_documents() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        let db = tempdir()?;
        fs::write(data.path().join("hello.txt"), "Hello world")?;

        let embedder = OllamaEmbedder::new(OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            ..OllamaConfig::default()
        })?;
        let store = LocalVectorStore::open(db.path(), "docs").await?;
        let pipeline = IndexingPipeline::new(embedder, store, &IngestionOptions::default())?;

        let report = pipeline.index_all(data.path()).await?;
        assert!(report.indexed.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(pipeline.index().count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_documents_do_not_stop_the_run() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        let db = tempdir()?;
        fs::write(data.path().join("broken.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(data.path().join("notes.md"), "Sponsoring follow-up checklist")?;

        let store = LocalVectorStore::open(db.path(), "docs").await?;
        let pipeline = IndexingPipeline::new(
            CharacterNgramEmbedder::default(),
            store,
            &IngestionOptions::default(),
        )?;

        let report = pipeline.index_all(data.path()).await?;
        assert_eq!(report.indexed.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            report.skipped[0].path.file_name().and_then(|name| name.to_str()),
            Some("broken.pdf")
        );
        Ok(())
    }

    #[tokio::test]
    async fn index_failure_aborts_the_run() -> Result<(), Box<dyn std::error::Error>> {
        let data = tempdir()?;
        fs::write(data.path().join("hello.txt"), "Hello world")?;

        let pipeline = IndexingPipeline::new(
            CharacterNgramEmbedder::default(),
            UnavailableIndex,
            &IngestionOptions::default(),
        )?;

        let result = pipeline.index_all(data.path()).await;
        assert!(matches!(result, Err(PipelineError::Index(IndexError::Unavailable(_)))));
        Ok(())
    }
}
