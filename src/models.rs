//! Core data models used throughout ragbot.
//!
//! These types represent the themes, documents, sessions and messages kept
//! in SQLite, plus the chunk and search-hit types that flow through the
//! indexing and answering pipelines.

use serde::{Deserialize, Serialize};

/// A named grouping of documents sharing one vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub id: i64,
    pub name: String,
}

/// An uploaded file belonging to a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: i64,
    pub theme_id: i64,
    /// Storage reference of the file, relative to the files directory.
    pub file: String,
    pub media_type: String,
    pub indexed: bool,
    pub uploaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: i64,
    pub owner: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One question/answer turn of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: i64,
    pub session_id: i64,
    pub question: String,
    pub response: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionType {
    pub id: i64,
    pub name: String,
}

/// How a caller names the topic to index.
#[derive(Debug, Clone, Default)]
pub struct TopicRef {
    pub id: Option<i64>,
    pub name: String,
}

impl TopicRef {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Chunk text plus the provenance kept next to its vector in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub text: String,
    pub document_id: i64,
    pub chunk_index: usize,
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub score: f32,
    pub document_id: i64,
    pub chunk_index: usize,
}

/// A chronologically ordered conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: Option<String>,
}
