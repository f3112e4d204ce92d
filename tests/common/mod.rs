//! Fakes and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use ragbot::admin;
use ragbot::catalog::SqliteCatalog;
use ragbot::config::Config;
use ragbot::embedding::Embedder;
use ragbot::error::{RagError, Result};
use ragbot::llm::LanguageModel;
use ragbot::models::Document;
use ragbot::storage::FileStorage;

pub const DIMS: usize = 64;

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
/// Texts sharing words get similar vectors. Fails the first `fail_first`
/// calls with a provider error, and every even-numbered call when
/// `fail_even_calls` is set.
#[derive(Default)]
pub struct WordEmbedder {
    pub calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
    pub fail_first: usize,
    pub fail_even_calls: bool,
}

impl WordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self {
            fail_first: times,
            ..Self::default()
        }
    }

    /// Fails calls 0, 2, 4... so each attempt at a sub-batch fails once.
    pub fn flaky() -> Self {
        Self {
            fail_even_calls: true,
            ..Self::default()
        }
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in word.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % DIMS as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "word-hash"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first || (self.fail_even_calls && call % 2 == 0) {
            return Err(RagError::ProviderError("embedding service unavailable".into()));
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

/// What a [`ScriptedModel`] does when asked.
pub enum Reply {
    Text(String),
    Fail(fn() -> RagError),
    Hang(Duration),
}

/// Language model that records every prompt and answers as scripted.
pub struct ScriptedModel {
    pub prompts: Mutex<Vec<String>>,
    reply: Reply,
}

impl ScriptedModel {
    pub fn answering(text: &str) -> Self {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn new(reply: Reply) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            reply,
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.reply {
            Reply::Text(t) => Ok(t.clone()),
            Reply::Fail(make) => Err(make()),
            Reply::Hang(d) => {
                tokio::time::sleep(*d).await;
                Ok("too late".to_string())
            }
        }
    }
}

pub struct TestEnv {
    pub tmp: TempDir,
    pub config: Config,
    pub catalog: Arc<SqliteCatalog>,
    pub storage: FileStorage,
}

impl TestEnv {
    pub async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::in_dir(tmp.path());
        config.retry.delay_ms = 1;
        config.llm.timeout_secs = 1;

        let catalog = SqliteCatalog::open(&config.db.path).await.unwrap();
        ragbot::migrate::apply(catalog.pool()).await.unwrap();

        Self {
            catalog: Arc::new(catalog),
            storage: FileStorage::new(&config.storage.files_dir),
            config,
            tmp,
        }
    }

    pub fn write_source(&self, name: &str, content: &[u8]) -> PathBuf {
        let dir = self.tmp.path().join("incoming");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub async fn upload(&self, theme: &str, name: &str, content: &str) -> Document {
        self.upload_bytes(theme, name, content.as_bytes()).await
    }

    pub async fn upload_bytes(&self, theme: &str, name: &str, content: &[u8]) -> Document {
        let path = self.write_source(name, content);
        admin::upload(&self.catalog, &self.storage, theme, &path)
            .await
            .unwrap()
    }
}

/// Minimal `.docx` with a single paragraph.
pub fn docx_with_text(text: &str) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            text
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}
