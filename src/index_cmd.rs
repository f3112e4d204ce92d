use anyhow::{bail, Result};
use std::sync::Arc;

use crate::catalog::SqliteCatalog;
use crate::config::Config;
use crate::embedding;
use crate::models::TopicRef;
use crate::pipeline::Indexer;

/// Index every pending document of a topic.
pub async fn run_index(config: &Config, topic: &str) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let catalog = Arc::new(SqliteCatalog::open(&config.db.path).await?);
    let indexer = Indexer::new(config, catalog.clone(), embedder);

    let result = indexer.index_documents(TopicRef::by_name(topic)).await;
    catalog.close().await;
    let documents = result?;

    println!("index {}", topic);
    if documents.is_empty() {
        println!("  no pending documents");
        return Ok(());
    }
    println!("  documents indexed: {}", documents.len());
    for doc in &documents {
        println!("    {} {}", doc.id, doc.file);
    }
    if let Some(meta) = indexer.store().meta(topic)? {
        println!("  chunks in index: {}", meta.count);
        println!("  model: {} ({} dims)", meta.model, meta.dims);
    }
    println!("ok");
    Ok(())
}
