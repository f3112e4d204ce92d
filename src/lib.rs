//! # ragbot
//!
//! Topic-scoped retrieval-augmented question answering over uploaded
//! documents.
//!
//! Documents are uploaded into a theme (topic). Indexing extracts their
//! text, splits it into overlapping chunks, embeds the chunks and merges
//! them into the topic's vector index on disk. Questions are answered by
//! retrieving the closest chunks, adding the recent turns of the user's
//! session, and asking a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │  upload  │──▶│ Indexer                  │──▶│ IndexStore   │
//! │ (files/) │   │ extract→chunk→embed→merge│   │ index.json   │
//! └──────────┘   └──────────────────────────┘   └──────┬───────┘
//!                                                      │ IndexCache
//!                ┌──────────────┐   ┌──────────────┐   ▼
//!                │ SQLite       │◀──│ Responder    │◀── question
//!                │ themes, docs,│   │ search+turns │
//!                │ sessions,msgs│   │ → LLM        │
//!                └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragbot init
//! ragbot upload Geography ./capitals.pdf
//! ragbot index Geography
//! ragbot session new ana                    # prints the session id
//! ragbot ask Geography "What is the capital of France?" --session 1
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Library error type |
//! | [`extract`] | PDF, Word and plain-text extraction |
//! | [`chunk`] | Sliding-window chunking and cleaning |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Language-model abstraction |
//! | [`retry`] | Timeout and retry around provider calls |
//! | [`index`] | Per-topic vector index on disk |
//! | [`cache`] | Shared loaded-index snapshots |
//! | [`lock`] | Per-topic indexing lock |
//! | [`catalog`] | Themes, documents, sessions, messages in SQLite |
//! | [`storage`] | Uploaded file storage |
//! | [`pipeline`] | Incremental indexing |
//! | [`context`] | Recent conversation turns |
//! | [`answer`] | Retrieval-augmented answers |
//! | [`migrate`] | Schema migrations |

pub mod admin;
pub mod answer;
pub mod ask;
pub mod cache;
pub mod catalog;
pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod index_cmd;
pub mod llm;
pub mod lock;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod search;
pub mod storage;
