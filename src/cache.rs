//! Process-wide registry of loaded topic indexes.
//!
//! Answers reuse the `Arc<VectorIndex>` snapshot loaded by an earlier
//! request. The indexer invalidates a topic after persisting, so the next
//! lookup reads the new `index.json`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::index::{IndexStore, VectorIndex};

#[derive(Default)]
pub struct IndexCache {
    entries: RwLock<HashMap<String, Arc<VectorIndex>>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, topic: &str) -> Option<Arc<VectorIndex>> {
        self.entries.read().await.get(topic).cloned()
    }

    /// Cached index of `topic`, loading it from `store` on a miss.
    /// Load failures are not cached.
    pub async fn get_or_load(&self, store: &IndexStore, topic: &str) -> Result<Arc<VectorIndex>> {
        if let Some(index) = self.get(topic).await {
            debug!("index cache hit for '{}'", topic);
            return Ok(index);
        }

        let loaded = Arc::new(store.load(topic)?);
        let mut entries = self.entries.write().await;
        // Another task may have loaded it meanwhile; keep the first one.
        let index = entries
            .entry(topic.to_string())
            .or_insert_with(|| loaded.clone())
            .clone();
        Ok(index)
    }

    pub async fn insert(&self, index: Arc<VectorIndex>) {
        self.entries
            .write()
            .await
            .insert(index.topic.clone(), index);
    }

    pub async fn invalidate(&self, topic: &str) {
        if self.entries.write().await.remove(topic).is_some() {
            debug!("invalidated cached index for '{}'", topic);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;
    use crate::models::IndexedChunk;
    use tempfile::TempDir;

    fn index(topic: &str, text: &str) -> VectorIndex {
        IndexStore::merge(
            None,
            topic,
            "m",
            vec![(
                IndexedChunk {
                    text: text.into(),
                    document_id: 1,
                    chunk_index: 0,
                },
                vec![1.0, 0.0],
            )],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn loads_once_then_serves_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = IndexStore::new(tmp.path());
        store.persist(&index("Geo", "first")).unwrap();

        let cache = IndexCache::new();
        let a = cache.get_or_load(&store, "Geo").await.unwrap();

        store.persist(&index("Geo", "second")).unwrap();
        let b = cache.get_or_load(&store, "Geo").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.entries[0].chunk.text, "first");

        cache.invalidate("Geo").await;
        let c = cache.get_or_load(&store, "Geo").await.unwrap();
        assert_eq!(c.entries[0].chunk.text, "second");
    }

    #[tokio::test]
    async fn missing_index_not_cached() {
        let tmp = TempDir::new().unwrap();
        let store = IndexStore::new(tmp.path());
        let cache = IndexCache::new();
        assert!(matches!(
            cache.get_or_load(&store, "Geo").await,
            Err(RagError::IndexNotFound(_))
        ));
        assert!(cache.is_empty().await);
    }
}
