use anyhow::{bail, Result};
use std::sync::Arc;

use crate::answer::Responder;
use crate::cache::IndexCache;
use crate::catalog::SqliteCatalog;
use crate::config::Config;
use crate::embedding;
use crate::llm;

/// Options of `ragbot ask`.
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Session to continue. Required unless `no_history` is set.
    pub session: Option<i64>,
    /// Overrides `[conversation] max_context_messages`.
    pub limit: Option<i64>,
    /// Answer without reading or recording session history.
    pub no_history: bool,
}

pub async fn run_ask(config: &Config, topic: &str, question: &str, opts: AskOptions) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty.");
    }
    let session = match (opts.session, opts.no_history) {
        (Some(id), false) => Some(id),
        (_, true) => None,
        (None, false) => bail!("--session is required unless --no-history is given."),
    };

    let embedder = embedding::create_embedder(&config.embedding)?;
    let model = llm::create_model(&config.llm)?;
    let catalog = Arc::new(SqliteCatalog::open(&config.db.path).await?);
    let responder = Responder::new(
        config,
        catalog.clone(),
        embedder,
        model,
        Arc::new(IndexCache::new()),
    );

    let answer = match session {
        Some(id) => {
            let limit = opts
                .limit
                .unwrap_or(config.conversation.max_context_messages);
            responder.answer(question, topic, id, limit).await
        }
        None => responder.answer_once(question, topic).await,
    };
    catalog.close().await;

    println!("{}", answer?);
    Ok(())
}
