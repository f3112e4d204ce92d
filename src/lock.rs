//! Per-topic mutual exclusion for index updates.
//!
//! Two layers: a `tokio::sync::Mutex` per topic serializes tasks in this
//! process, and an exclusive advisory lock (`fs2`) on
//! `<index_dir>/<sanitized>.lock` serializes separate processes sharing
//! the same index directory. Both are released when the guard drops.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{RagError, Result};
use crate::index::sanitize_topic;

pub struct TopicLocks {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of an indexing run.
pub struct TopicGuard {
    topic: String,
    file: File,
    _local: OwnedMutexGuard<()>,
}

impl Drop for TopicGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!("released index lock for '{}'", self.topic);
    }
}

impl TopicLocks {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn local(&self, topic: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(topic.to_string()).or_default().clone()
    }

    /// Wait until this task holds both the in-process and the file lock.
    pub async fn acquire(&self, topic: &str) -> Result<TopicGuard> {
        let local = self.local(topic).lock_owned().await;

        fs::create_dir_all(&self.root)?;
        let path = self.root.join(format!("{}.lock", sanitize_topic(topic)));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        let file = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|_| file))
            .await
            .map_err(|e| RagError::Other(anyhow::anyhow!("lock task failed: {}", e)))??;

        debug!("acquired index lock for '{}'", topic);
        Ok(TopicGuard {
            topic: topic.to_string(),
            file,
            _local: local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let tmp = TempDir::new().unwrap();
        let locks = Arc::new(TopicLocks::new(tmp.path()));

        let guard = locks.acquire("Geo").await.unwrap();

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("Geo").await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_topics_do_not_block() {
        let tmp = TempDir::new().unwrap();
        let locks = TopicLocks::new(tmp.path());
        let _geo = locks.acquire("Geo").await.unwrap();
        let _hist = tokio::time::timeout(Duration::from_secs(5), locks.acquire("History"))
            .await
            .unwrap()
            .unwrap();
    }
}
