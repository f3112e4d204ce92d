//! Per-topic vector index: on-disk layout, copy-on-merge, exact search.
//!
//! # Layout
//!
//! ```text
//! <index_dir>/
//!   geography-1a2b3c4d5e6f/
//!     index.json      canonical; its presence means the index exists
//!     meta.json       topic, model, dims, count, updated_at
//!   geography-1a2b3c4d5e6f.lock
//! ```
//!
//! Both files are written to a `.tmp` sibling, synced, then renamed over
//! the previous version, so a reader sees either the old or the new file
//! and never a partial one. Vectors are stored as base64 of little-endian
//! `f32` bytes.
//!
//! Search is brute-force cosine similarity over every entry. Entries are
//! ordered newest batch first, and ties keep that order.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::{IndexedChunk, SearchHit};

const INDEX_FILE: &str = "index.json";
const META_FILE: &str = "meta.json";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: IndexedChunk,
    pub vector: Vec<f32>,
}

/// In-memory snapshot of one topic's index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    pub topic: String,
    pub model: String,
    pub dims: usize,
    pub entries: Vec<IndexEntry>,
}

/// Summary written next to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub topic: String,
    pub model: String,
    pub dims: usize,
    pub count: usize,
    pub updated_at: i64,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    topic: String,
    model: String,
    dims: usize,
    entries: Vec<StoredEntry>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    text: String,
    document_id: i64,
    chunk_index: usize,
    vector: String,
}

impl VectorIndex {
    pub fn empty(topic: &str, model: &str, dims: usize) -> Self {
        Self {
            topic: topic.to_string(),
            model: model.to_string(),
            dims,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` entries most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(RagError::InvalidConfig(format!(
                "query vector has {} dimensions, index '{}' has {}",
                query.len(),
                self.topic,
                self.dims
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        // sort_by is stable: equal scores keep entry order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let chunk = &self.entries[i].chunk;
                SearchHit {
                    text: chunk.text.clone(),
                    score,
                    document_id: chunk.document_id,
                    chunk_index: chunk.chunk_index,
                }
            })
            .collect())
    }
}

/// Reads and writes topic indexes below one root directory.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        self.root.join(sanitize_topic(topic))
    }

    pub fn exists(&self, topic: &str) -> bool {
        self.topic_dir(topic).join(INDEX_FILE).is_file()
    }

    /// Load the persisted index of `topic`.
    ///
    /// Fails with [`RagError::IndexNotFound`] when no index was ever
    /// persisted, or when the file found belongs to a different topic.
    pub fn load(&self, topic: &str) -> Result<VectorIndex> {
        let path = self.topic_dir(topic).join(INDEX_FILE);
        if !path.is_file() {
            return Err(RagError::IndexNotFound(topic.to_string()));
        }

        let content = fs::read_to_string(&path)?;
        let file: IndexFile = serde_json::from_str(&content)
            .map_err(|e| RagError::Index(format!("{}: {}", path.display(), e)))?;

        if file.topic != topic {
            warn!(
                "index at {} belongs to topic '{}', not '{}'",
                path.display(),
                file.topic,
                topic
            );
            return Err(RagError::IndexNotFound(topic.to_string()));
        }

        let mut entries = Vec::with_capacity(file.entries.len());
        for stored in file.entries {
            let bytes = STANDARD
                .decode(stored.vector.as_bytes())
                .map_err(|e| RagError::Index(format!("{}: bad vector: {}", path.display(), e)))?;
            let vector = blob_to_vec(&bytes);
            if vector.len() != file.dims {
                return Err(RagError::Index(format!(
                    "{}: vector of length {} in a {}-dimensional index",
                    path.display(),
                    vector.len(),
                    file.dims
                )));
            }
            entries.push(IndexEntry {
                chunk: IndexedChunk {
                    text: stored.text,
                    document_id: stored.document_id,
                    chunk_index: stored.chunk_index,
                },
                vector,
            });
        }

        debug!("loaded index '{}' with {} entries", topic, entries.len());
        Ok(VectorIndex {
            topic: file.topic,
            model: file.model,
            dims: file.dims,
            entries,
        })
    }

    /// Load the index of `topic`, or `None` if it has never been persisted.
    pub fn load_if_exists(&self, topic: &str) -> Result<Option<VectorIndex>> {
        match self.load(topic) {
            Ok(index) => Ok(Some(index)),
            Err(RagError::IndexNotFound(_)) if !self.exists(topic) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn meta(&self, topic: &str) -> Result<Option<IndexMeta>> {
        let path = self.topic_dir(topic).join(META_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Build a new index from `new_chunks` followed by the entries of
    /// `existing`. `existing` is left untouched.
    pub fn merge(
        existing: Option<&VectorIndex>,
        topic: &str,
        model: &str,
        new_chunks: Vec<(IndexedChunk, Vec<f32>)>,
    ) -> Result<VectorIndex> {
        let dims = match (existing, new_chunks.first()) {
            (Some(old), _) if !old.is_empty() => old.dims,
            (_, Some((_, v))) => v.len(),
            (Some(old), None) => old.dims,
            (None, None) => 0,
        };

        if let Some((chunk, v)) = new_chunks.iter().find(|(_, v)| v.len() != dims) {
            return Err(RagError::InvalidConfig(format!(
                "embedding for document {} chunk {} has {} dimensions, index '{}' has {}",
                chunk.document_id,
                chunk.chunk_index,
                v.len(),
                topic,
                dims
            )));
        }

        if let Some(old) = existing {
            if !old.is_empty() && old.model != model {
                warn!(
                    "topic '{}' was indexed with model '{}', merging vectors from '{}'",
                    topic, old.model, model
                );
            }
        }

        let old_entries = existing.map(|old| old.entries.as_slice()).unwrap_or(&[]);
        let mut entries = Vec::with_capacity(new_chunks.len() + old_entries.len());
        entries.extend(
            new_chunks
                .into_iter()
                .map(|(chunk, vector)| IndexEntry { chunk, vector }),
        );
        entries.extend(old_entries.iter().cloned());

        Ok(VectorIndex {
            topic: topic.to_string(),
            model: model.to_string(),
            dims,
            entries,
        })
    }

    /// Write `index` under its topic directory, replacing any previous one.
    pub fn persist(&self, index: &VectorIndex) -> Result<()> {
        let dir = self.topic_dir(&index.topic);
        fs::create_dir_all(&dir)?;

        let meta = IndexMeta {
            topic: index.topic.clone(),
            model: index.model.clone(),
            dims: index.dims,
            count: index.entries.len(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        write_atomic(&dir.join(META_FILE), &serde_json::to_vec_pretty(&meta)?)?;

        let file = IndexFile {
            topic: index.topic.clone(),
            model: index.model.clone(),
            dims: index.dims,
            entries: index
                .entries
                .iter()
                .map(|e| StoredEntry {
                    text: e.chunk.text.clone(),
                    document_id: e.chunk.document_id,
                    chunk_index: e.chunk.chunk_index,
                    vector: STANDARD.encode(vec_to_blob(&e.vector)),
                })
                .collect(),
        };
        write_atomic(&dir.join(INDEX_FILE), &serde_json::to_vec(&file)?)?;

        debug!(
            "persisted index '{}' ({} entries) to {}",
            index.topic,
            index.entries.len(),
            dir.display()
        );
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

/// Directory name for a topic: its name restricted to `[A-Za-z0-9_-]`,
/// plus a hash of the exact name so that distinct topics never collide.
pub fn sanitize_topic(topic: &str) -> String {
    let mut cleaned: String = topic
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(48)
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        cleaned = "topic".to_string();
    }
    format!("{}-{}", cleaned, short_hash(topic))
}
