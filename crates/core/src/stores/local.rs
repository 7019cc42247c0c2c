//! Durable single-process vector store.
//!
//! A collection lives in `<dir>/<collection>.jsonl`, one upsert batch (a JSON
//! array of [`IndexEntry`]) per line. The file is loaded into memory on open;
//! a batch is appended and synced to disk before it becomes visible to
//! queries, and a batch whose line was not fully written is dropped on open.
//! Search is a brute force cosine scan over the in-memory copy.

use crate::traits::VectorIndex;
use crate::{IndexEntry, IndexError, ScoredEntry};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct LocalVectorStore {
    path: PathBuf,
    collection: String,
    entries: RwLock<Vec<IndexEntry>>,
}

impl LocalVectorStore {
    pub async fn open(dir: impl AsRef<Path>, collection: &str) -> Result<Self, IndexError> {
        validate_collection_name(collection)?;

        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{collection}.jsonl"));

        let entries = if fs::try_exists(&path).await? {
            load_entries(&path).await?
        } else {
            Vec::new()
        };

        info!(
            collection = %collection,
            path = %path.display(),
            entries = entries.len(),
            "opened local vector store"
        );

        Ok(Self {
            path,
            collection: collection.to_string(),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn validate_collection_name(collection: &str) -> Result<(), IndexError> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'))
        && !collection.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(IndexError::InvalidCollection(collection.to_string()))
    }
}

async fn load_entries(path: &Path) -> Result<Vec<IndexEntry>, IndexError> {
    let raw = fs::read(path).await?;
    let mut entries: Vec<IndexEntry> = Vec::new();
    let mut committed_len = 0usize;
    let mut missing_newline = false;

    for (index, line) in raw.split_inclusive(|byte| *byte == b'\n').enumerate() {
        let complete = line.last() == Some(&b'\n');

        if line.iter().all(u8::is_ascii_whitespace) {
            if complete {
                committed_len += line.len();
            }
            continue;
        }

        match serde_json::from_slice::<Vec<IndexEntry>>(line) {
            Ok(batch) => {
                let expected = entries
                    .first()
                    .or(batch.first())
                    .map(|entry| entry.vector.len());
                if let Some(entry) = batch
                    .iter()
                    .find(|entry| Some(entry.vector.len()) != expected)
                {
                    return Err(IndexError::Corrupt {
                        path: path.display().to_string(),
                        line: index + 1,
                        details: format!(
                            "vector dimension {} differs from {}",
                            entry.vector.len(),
                            expected.unwrap_or_default()
                        ),
                    });
                }
                entries.extend(batch);
                committed_len += line.len();
                missing_newline = !complete;
            }
            Err(error) if !complete => {
                warn!(path = %path.display(), line = index + 1, %error, "dropping truncated trailing batch");
            }
            Err(error) => {
                return Err(IndexError::Corrupt {
                    path: path.display().to_string(),
                    line: index + 1,
                    details: error.to_string(),
                });
            }
        }
    }

    if committed_len < raw.len() {
        // Cut the partial write so later appends start on a fresh line.
        truncate_to(path, committed_len as u64).await?;
    } else if missing_newline {
        let mut file = OpenOptions::new().append(true).open(path).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
    }

    Ok(entries)
}

async fn file_len(path: &Path) -> Result<u64, IndexError> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.len()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(error) => Err(error.into()),
    }
}

async fn append_line(path: &Path, line: &[u8]) -> Result<(), IndexError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

async fn truncate_to(path: &Path, len: u64) -> Result<(), IndexError> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_all().await?;
    Ok(())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for LocalVectorStore {
    async fn upsert(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut stored = self.entries.write().await;
        let expected = stored
            .first()
            .map(|entry| entry.vector.len())
            .unwrap_or(entries[0].vector.len());

        for entry in entries {
            if entry.vector.is_empty() || entry.vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: entry.vector.len(),
                });
            }
        }

        let mut line = serde_json::to_vec(entries)?;
        line.push(b'\n');

        let committed_len = file_len(&self.path).await?;
        if let Err(error) = append_line(&self.path, &line).await {
            if let Err(rollback) = truncate_to(&self.path, committed_len).await {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "unable to discard partial batch"
                );
            }
            return Err(error);
        }

        stored.extend_from_slice(entries);
        debug!(
            collection = %self.collection,
            added = entries.len(),
            total = stored.len(),
            "committed entries"
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, IndexError> {
        let stored = self.entries.read().await;
        let Some(first) = stored.first() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if first.vector.len() != vector.len() {
            return Err(IndexError::DimensionMismatch {
                expected: first.vector.len(),
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = stored
            .iter()
            .map(|entry| (cosine_similarity(&entry.vector, vector), entry))
            .collect();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredEntry {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<(), IndexError> {
        let mut stored = self.entries.write().await;
        let file = fs::File::create(&self.path).await?;
        file.sync_all().await?;
        let removed = stored.len();
        stored.clear();
        info!(collection = %self.collection, removed, "cleared collection");
        Ok(())
    }
}
