use anyhow::{bail, Result};
use std::sync::Arc;

use crate::answer::Responder;
use crate::cache::IndexCache;
use crate::catalog::SqliteCatalog;
use crate::config::Config;
use crate::embedding;
use crate::llm::DisabledModel;

/// Print the chunks of `topic` closest to `query`, without generating an answer.
pub async fn run_search(config: &Config, topic: &str, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let catalog = Arc::new(SqliteCatalog::open(&config.db.path).await?);
    let responder = Responder::new(
        config,
        catalog.clone(),
        embedder,
        Arc::new(DisabledModel),
        Arc::new(IndexCache::new()),
    );

    let k = limit.unwrap_or(config.retrieval.top_k);
    let hits = responder.search(topic, query, k).await;
    catalog.close().await;
    let hits = hits?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] document {} / chunk {}",
            i + 1,
            hit.score,
            hit.document_id,
            hit.chunk_index
        );
        println!("    excerpt: \"{}\"", excerpt(&hit.text, 240));
        println!();
    }
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\nb", 10), "a b");
        assert_eq!(excerpt("abcdefgh", 3), "abc...");
    }
}
