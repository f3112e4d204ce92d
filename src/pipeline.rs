//! Incremental indexing of a topic's pending documents.
//!
//! One run of [`Indexer::index_documents`]:
//!
//! ```text
//! resolve topic ─► lock topic ─► unindexed docs (ascending id)
//!     ─► extract ─► split ─► clean ─► embed (sub-batches, retried)
//!     ─► load + merge ─► persist ─► invalidate cache ─► mark indexed
//! ```
//!
//! Documents are marked indexed only after the merged index is on disk,
//! so a failed run leaves every document of the batch pending and the
//! previous index in place. An unreadable document does not fail the
//! batch: it is indexed as a single placeholder chunk naming the file.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::IndexCache;
use crate::catalog::Catalog;
use crate::chunk;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::extract;
use crate::index::IndexStore;
use crate::lock::TopicLocks;
use crate::models::{Document, IndexedChunk, Theme, TopicRef};
use crate::retry::{with_timeout, RetryPolicy};
use crate::storage::FileStorage;

pub struct Indexer {
    catalog: Arc<dyn Catalog>,
    embedder: Arc<dyn Embedder>,
    storage: FileStorage,
    store: IndexStore,
    cache: Arc<IndexCache>,
    locks: Arc<TopicLocks>,
    chunking: ChunkingConfig,
    batch_size: usize,
    retry: RetryPolicy,
}

impl Indexer {
    pub fn new(config: &Config, catalog: Arc<dyn Catalog>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            catalog,
            embedder,
            storage: FileStorage::new(&config.storage.files_dir),
            store: IndexStore::new(&config.storage.index_dir),
            cache: Arc::new(IndexCache::new()),
            locks: Arc::new(TopicLocks::new(&config.storage.index_dir)),
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size.max(1),
            retry: RetryPolicy::from_config(&config.retry, config.embedding.timeout_secs),
        }
    }

    /// Share an index cache with a [`crate::answer::Responder`].
    pub fn with_cache(mut self, cache: Arc<IndexCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_locks(mut self, locks: Arc<TopicLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Index every pending document of `topic` and return them.
    ///
    /// Returns an empty list, without touching the index, when nothing
    /// is pending.
    pub async fn index_documents(&self, topic: TopicRef) -> Result<Vec<Document>> {
        let theme = self.resolve_topic(&topic).await?;
        let _guard = self.locks.acquire(&theme.name).await?;

        let documents = self.catalog.unindexed_documents(theme.id).await?;
        if documents.is_empty() {
            debug!("topic '{}' has no pending documents", theme.name);
            return Ok(Vec::new());
        }
        info!(
            "indexing {} document(s) for topic '{}'",
            documents.len(),
            theme.name
        );

        let mut chunks: Vec<IndexedChunk> = Vec::new();
        let mut cleaned: Vec<String> = Vec::new();
        for doc in &documents {
            let text = self.document_text(doc).await;
            let pieces = chunk::split(&text, self.chunking.size, self.chunking.overlap)?;
            debug!("document {} ({}): {} chunk(s)", doc.id, doc.file, pieces.len());
            for (i, piece) in pieces.into_iter().enumerate() {
                cleaned.push(chunk::clean(&piece));
                chunks.push(IndexedChunk {
                    text: piece,
                    document_id: doc.id,
                    chunk_index: i,
                });
            }
        }

        if chunks.is_empty() {
            info!(
                "no text found in {} document(s); index for '{}' unchanged",
                documents.len(),
                theme.name
            );
        } else {
            let vectors = self.embed_all(&cleaned).await?;
            let existing = self.store.load_if_exists(&theme.name)?;
            let merged = IndexStore::merge(
                existing.as_ref(),
                &theme.name,
                self.embedder.model_name(),
                chunks.into_iter().zip(vectors).collect(),
            )?;
            self.store.persist(&merged)?;
            self.cache.invalidate(&theme.name).await;
            info!(
                "index for '{}' now holds {} chunk(s)",
                theme.name,
                merged.len()
            );
        }

        let ids: Vec<i64> = documents.iter().map(|d| d.id).collect();
        self.catalog.mark_indexed(&ids).await?;

        Ok(documents
            .into_iter()
            .map(|mut d| {
                d.indexed = true;
                d
            })
            .collect())
    }

    async fn resolve_topic(&self, topic: &TopicRef) -> Result<Theme> {
        if let Some(id) = topic.id {
            if let Some(theme) = self.catalog.get_theme(id).await? {
                return Ok(theme);
            }
        }
        let name = topic.name.trim();
        if name.is_empty() {
            return Err(RagError::InvalidTopic(match topic.id {
                Some(id) => format!("no topic with id {} and no name given", id),
                None => "topic name is required".to_string(),
            }));
        }
        self.catalog.create_theme_if_absent(name).await
    }

    /// Extracted text, or a placeholder if the file cannot be read.
    async fn document_text(&self, doc: &Document) -> String {
        let storage = self.storage.clone();
        let file = doc.file.clone();
        let media_type = doc.media_type.clone();
        contained(&doc.file, move || {
            storage
                .read(&file)
                .and_then(|bytes| extract::extract_bytes(&bytes, &media_type))
        })
        .await
    }

    /// Embed every text as one unit of retry: a transient failure in any
    /// sub-batch restarts the whole batch, so the retry budget is shared.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let sub_batches = texts.len().div_ceil(self.batch_size).max(1);
        let whole = RetryPolicy {
            timeout: self
                .retry
                .timeout
                .checked_mul(sub_batches as u32)
                .unwrap_or(Duration::MAX),
            ..self.retry.clone()
        };
        whole
            .run("embedding batch", || self.embed_sub_batches(texts))
            .await
    }

    async fn embed_sub_batches(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = with_timeout(self.retry.timeout, self.embedder.embed_batch(batch)).await?;
            if embedded.len() != batch.len() {
                return Err(RagError::ProviderError(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

/// Run `extract` on the blocking pool. Errors and panics both yield the
/// placeholder for `file`.
async fn contained<F>(file: &str, extract: F) -> String
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    let err = match tokio::task::spawn_blocking(extract).await {
        Ok(Ok(text)) => return text,
        Ok(Err(e)) => e,
        Err(join) => RagError::Extraction {
            file: file.to_string(),
            reason: if join.is_panic() {
                "extractor panicked".to_string()
            } else {
                join.to_string()
            },
        },
    };
    warn!("skipping content of {}: {}", file, err);
    placeholder(file, &err)
}

/// Text indexed in place of a document whose content could not be read.
pub fn placeholder(file: &str, err: &RagError) -> String {
    let reason = match err {
        RagError::Extraction { reason, .. } => reason.clone(),
        other => other.to_string(),
    };
    format!("[extraction failed: {}: {}]", file, reason)
}
