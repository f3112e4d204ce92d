//! Retrieval-augmented answers within a conversation.
//!
//! [`Responder::answer`] looks up the topic index, retrieves the chunks
//! closest to the question, adds the session's recent turns, and asks the
//! language model. Only a never-indexed topic and an unknown session
//! reach the caller as errors. Provider failures become
//! [`APOLOGY_ANSWER`] and anything else [`GENERIC_ERROR_ANSWER`]. Only
//! successful answers are stored as messages.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cache::IndexCache;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::context::recent_turns;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::index::IndexStore;
use crate::llm::LanguageModel;
use crate::models::{SearchHit, Turn};
use crate::retry::with_timeout;

pub const APOLOGY_ANSWER: &str =
    "Sorry, I can't reach the answering service right now. Please try again in a moment.";

pub const GENERIC_ERROR_ANSWER: &str =
    "Sorry, something went wrong while preparing your answer.";

pub const NO_DOCUMENTS_ANSWER: &str =
    "I couldn't find any relevant documents for this topic to answer your question.";

const PREAMBLE: &str = "You are an assistant answering questions about a collection of documents. \
Use the context below and the conversation history to answer. \
If the context does not contain the answer, say that you don't know.";

pub struct Responder {
    catalog: Arc<dyn Catalog>,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    store: IndexStore,
    cache: Arc<IndexCache>,
    top_k: usize,
    embed_timeout: Duration,
    llm_timeout: Duration,
}

impl Responder {
    /// `cache` must be the one handed to any [`crate::pipeline::Indexer`]
    /// in the same process, or reindexed topics keep being served from
    /// the old snapshot.
    pub fn new(
        config: &Config,
        catalog: Arc<dyn Catalog>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        cache: Arc<IndexCache>,
    ) -> Self {
        Self {
            catalog,
            embedder,
            model,
            store: IndexStore::new(&config.storage.index_dir),
            cache,
            top_k: config.retrieval.top_k,
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            llm_timeout: config.llm.timeout(),
        }
    }

    /// The `k` chunks of `topic` closest to `query`.
    pub async fn search(&self, topic: &str, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let index = self.cache.get_or_load(&self.store, topic).await?;
        let vector = with_timeout(self.embed_timeout, self.embedder.embed(query)).await?;
        index.search(&vector, k)
    }

    /// Answer `question` about `topic` as the next turn of a session.
    ///
    /// Fails only with [`RagError::IndexNotFound`] or
    /// [`RagError::SessionNotFound`].
    pub async fn answer(
        &self,
        question: &str,
        topic: &str,
        session_id: i64,
        limit: i64,
    ) -> Result<String> {
        self.respond(question, topic, Some((session_id, limit))).await
    }

    /// Answer without reading or recording any conversation.
    pub async fn answer_once(&self, question: &str, topic: &str) -> Result<String> {
        self.respond(question, topic, None).await
    }

    async fn respond(
        &self,
        question: &str,
        topic: &str,
        session: Option<(i64, i64)>,
    ) -> Result<String> {
        let hits = match self.search(topic, question, self.top_k).await {
            Ok(hits) => hits,
            Err(e @ RagError::IndexNotFound(_)) => return Err(e),
            Err(e) if e.is_transient() => {
                warn!("embedding the question failed: {}", e);
                return Ok(APOLOGY_ANSWER.to_string());
            }
            Err(e) => {
                error!("retrieval for topic '{}' failed: {}", topic, e);
                return Ok(GENERIC_ERROR_ANSWER.to_string());
            }
        };
        if hits.is_empty() {
            info!("no chunks retrieved for topic '{}'", topic);
            return Ok(NO_DOCUMENTS_ANSWER.to_string());
        }

        let turns = match session {
            Some((session_id, limit)) => {
                match recent_turns(self.catalog.as_ref(), session_id, limit).await {
                    Ok(turns) => turns,
                    Err(e @ RagError::SessionNotFound(_)) => return Err(e),
                    Err(e) => {
                        error!("loading history of session {} failed: {}", session_id, e);
                        return Ok(GENERIC_ERROR_ANSWER.to_string());
                    }
                }
            }
            None => Vec::new(),
        };

        let prompt = build_prompt(question, &turns, &hits);
        debug!(
            "prompt for topic '{}': {} hit(s), {} turn(s), {} chars",
            topic,
            hits.len(),
            turns.len(),
            prompt.len()
        );

        let answer = match with_timeout(self.llm_timeout, self.model.complete(&prompt)).await {
            Ok(answer) => answer,
            Err(e) if e.is_transient() => {
                warn!("language model {} failed: {}", self.model.model_name(), e);
                return Ok(APOLOGY_ANSWER.to_string());
            }
            Err(e) => {
                error!("answer generation failed: {}", e);
                return Ok(GENERIC_ERROR_ANSWER.to_string());
            }
        };

        if let Some((session_id, _)) = session {
            if let Err(e) = self
                .catalog
                .create_message(session_id, question, Some(&answer))
                .await
            {
                error!("could not record answer in session {}: {}", session_id, e);
                return Ok(GENERIC_ERROR_ANSWER.to_string());
            }
        }

        Ok(answer)
    }
}

/// Prompt sent to the language model. Same inputs, same prompt.
pub fn build_prompt(question: &str, turns: &[Turn], hits: &[SearchHit]) -> String {
    let mut prompt = String::new();
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\nHistory:\n");
    for turn in turns {
        prompt.push_str("User: ");
        prompt.push_str(&turn.question);
        prompt.push('\n');
        if let Some(answer) = &turn.answer {
            prompt.push_str("Assistant: ");
            prompt.push_str(answer);
            prompt.push('\n');
        }
    }

    let context: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    prompt.push_str("\nContext:\n");
    prompt.push_str(&context.join("\n\n"));
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\nAnswer:");
    prompt
}
