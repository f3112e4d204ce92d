//! Relational persistence for themes, documents, sessions and messages.
//!
//! The [`Catalog`] trait lists the operations the indexing and answering
//! pipelines need. [`SqliteCatalog`] implements it on top of the schema
//! created by [`crate::migrate`] and adds the listing and bookkeeping
//! operations used by the CLI.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::error::{RagError, Result};
use crate::models::{Document, Message, PartitionType, Session, Theme};

/// Storage operations required by the core pipelines.
///
/// | Method | Used by |
/// |--------|---------|
/// | [`create_theme_if_absent`](Catalog::create_theme_if_absent) | indexing, upload |
/// | [`unindexed_documents`](Catalog::unindexed_documents) | indexing |
/// | [`mark_indexed`](Catalog::mark_indexed) | indexing |
/// | [`create_message`](Catalog::create_message) | answering |
/// | [`recent_messages`](Catalog::recent_messages) | context building |
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_theme(&self, id: i64) -> Result<Option<Theme>>;

    async fn get_theme_by_name(&self, name: &str) -> Result<Option<Theme>>;

    /// Return the theme called `name`, creating it first if needed.
    async fn create_theme_if_absent(&self, name: &str) -> Result<Theme>;

    /// Documents of a theme still waiting to be indexed, ascending id.
    async fn unindexed_documents(&self, theme_id: i64) -> Result<Vec<Document>>;

    /// Flip `indexed` for all given documents in one transaction.
    async fn mark_indexed(&self, document_ids: &[i64]) -> Result<()>;

    async fn get_session(&self, id: i64) -> Result<Option<Session>>;

    async fn create_message(
        &self,
        session_id: i64,
        question: &str,
        response: Option<&str>,
    ) -> Result<Message>;

    /// The `limit` newest messages of a session, newest first.
    async fn recent_messages(&self, session_id: i64, limit: i64) -> Result<Vec<Message>>;
}

/// SQLite implementation of [`Catalog`].
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn row_to_theme(row: &SqliteRow) -> Theme {
    Theme {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    let indexed: i64 = row.get("indexed");
    Document {
        id: row.get("id"),
        theme_id: row.get("theme_id"),
        file: row.get("file"),
        media_type: row.get("media_type"),
        indexed: indexed != 0,
        uploaded_at: row.get("uploaded_at"),
    }
}

fn row_to_session(row: &SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        owner: row.get("owner"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message(row: &SqliteRow) -> Message {
    Message {
        id: row.get("id"),
        session_id: row.get("session_id"),
        question: row.get("question"),
        response: row.get("response"),
        created_at: row.get("created_at"),
    }
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the catalog database at `path`, creating the file and its
    /// parent directory if missing. The schema is not touched; see
    /// [`crate::migrate`].
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create a theme, rejecting empty and duplicate names.
    pub async fn create_theme(&self, name: &str) -> Result<Theme> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RagError::InvalidTopic("theme name is required".into()));
        }
        if self.get_theme_by_name(name).await?.is_some() {
            return Err(RagError::InvalidTopic(format!(
                "theme '{}' already exists",
                name
            )));
        }
        let id = sqlx::query("INSERT INTO themes (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(Theme {
            id,
            name: name.to_string(),
        })
    }

    pub async fn list_themes(&self) -> Result<Vec<Theme>> {
        let rows = sqlx::query("SELECT id, name FROM themes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_theme).collect())
    }

    pub async fn add_document(
        &self,
        theme_id: i64,
        file: &str,
        media_type: &str,
    ) -> Result<Document> {
        let uploaded_at = now_millis();
        let id = sqlx::query(
            "INSERT INTO documents (theme_id, file, media_type, indexed, uploaded_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(theme_id)
        .bind(file)
        .bind(media_type)
        .bind(uploaded_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Document {
            id,
            theme_id,
            file: file.to_string(),
            media_type: media_type.to_string(),
            indexed: false,
            uploaded_at,
        })
    }

    pub async fn list_documents(&self, theme_id: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, theme_id, file, media_type, indexed, uploaded_at FROM documents WHERE theme_id = ? ORDER BY id",
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    pub async fn create_session(&self, owner: &str) -> Result<Session> {
        let now = now_millis();
        let id = sqlx::query("INSERT INTO sessions (owner, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(owner)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(Session {
            id,
            owner: owner.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let rows =
            sqlx::query("SELECT id, owner, created_at, updated_at FROM sessions ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(row_to_session).collect())
    }

    /// Messages filtered by session and/or session owner, oldest first.
    ///
    /// A session id that does not exist is reported as
    /// [`RagError::SessionNotFound`] rather than an empty list.
    pub async fn list_messages(
        &self,
        session_id: Option<i64>,
        owner: Option<&str>,
    ) -> Result<Vec<Message>> {
        if let Some(id) = session_id {
            if self.get_session(id).await?.is_none() {
                return Err(RagError::SessionNotFound(id));
            }
        }

        let rows = sqlx::query(
            r#"
            SELECT m.id, m.session_id, m.question, m.response, m.created_at
            FROM messages m
            JOIN sessions s ON s.id = m.session_id
            WHERE (?1 IS NULL OR m.session_id = ?1)
              AND (?2 IS NULL OR s.owner = ?2)
            ORDER BY m.created_at, m.id
            "#,
        )
        .bind(session_id)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    pub async fn create_partition(&self, name: &str) -> Result<PartitionType> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RagError::InvalidConfig("partition name is required".into()));
        }
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM partition_types WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            return Err(RagError::InvalidConfig(format!(
                "partition '{}' already exists",
                name
            )));
        }
        let id = sqlx::query("INSERT INTO partition_types (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(PartitionType {
            id,
            name: name.to_string(),
        })
    }

    pub async fn list_partitions(&self) -> Result<Vec<PartitionType>> {
        let rows = sqlx::query("SELECT id, name FROM partition_types ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| PartitionType {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn get_theme(&self, id: i64) -> Result<Option<Theme>> {
        let row = sqlx::query("SELECT id, name FROM themes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_theme))
    }

    async fn get_theme_by_name(&self, name: &str) -> Result<Option<Theme>> {
        let row = sqlx::query("SELECT id, name FROM themes WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_theme))
    }

    async fn create_theme_if_absent(&self, name: &str) -> Result<Theme> {
        sqlx::query("INSERT INTO themes (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;

        self.get_theme_by_name(name)
            .await?
            .ok_or_else(|| RagError::InvalidTopic(format!("theme '{}' vanished after insert", name)))
    }

    async fn unindexed_documents(&self, theme_id: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, theme_id, file, media_type, indexed, uploaded_at
            FROM documents
            WHERE theme_id = ? AND indexed = 0
            ORDER BY id ASC
            "#,
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn mark_indexed(&self, document_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in document_ids {
            sqlx::query("UPDATE documents SET indexed = 1 WHERE id = ? AND indexed = 0")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_session(&self, id: i64) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT id, owner, created_at, updated_at FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_session))
    }

    async fn create_message(
        &self,
        session_id: i64,
        question: &str,
        response: Option<&str>,
    ) -> Result<Message> {
        let created_at = now_millis();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO messages (session_id, question, response, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(question)
        .bind(response)
        .bind(created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Message {
            id,
            session_id,
            question: question.to_string(),
            response: response.map(str::to_string),
            created_at,
        })
    }

    async fn recent_messages(&self, session_id: i64, limit: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, question, response, created_at
            FROM messages
            WHERE session_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::migrate;

    async fn catalog() -> (tempfile::TempDir, SqliteCatalog) {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config::in_dir(tmp.path());
        let catalog = SqliteCatalog::open(&config.db.path).await.unwrap();
        migrate::apply(catalog.pool()).await.unwrap();
        (tmp, catalog)
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("data").join("ragbot.sqlite");
        let catalog = SqliteCatalog::open(&path).await.unwrap();
        migrate::apply(catalog.pool()).await.unwrap();
        assert!(path.exists());

        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(catalog.pool())
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn create_theme_if_absent_is_idempotent() {
        let (_tmp, catalog) = catalog().await;
        let first = catalog.create_theme_if_absent("Geo").await.unwrap();
        let second = catalog.create_theme_if_absent("Geo").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(catalog.list_themes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_theme_rejects_duplicates_and_empty_names() {
        let (_tmp, catalog) = catalog().await;
        catalog.create_theme("History").await.unwrap();
        assert!(matches!(
            catalog.create_theme("History").await,
            Err(RagError::InvalidTopic(_))
        ));
        assert!(matches!(
            catalog.create_theme("  ").await,
            Err(RagError::InvalidTopic(_))
        ));
    }

    #[tokio::test]
    async fn mark_indexed_removes_documents_from_pending() {
        let (_tmp, catalog) = catalog().await;
        let theme = catalog.create_theme_if_absent("Geo").await.unwrap();
        let a = catalog
            .add_document(theme.id, "a.txt", "text/plain")
            .await
            .unwrap();
        let b = catalog
            .add_document(theme.id, "b.txt", "text/plain")
            .await
            .unwrap();

        let pending = catalog.unindexed_documents(theme.id).await.unwrap();
        assert_eq!(
            pending.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![a.id, b.id]
        );

        catalog.mark_indexed(&[a.id]).await.unwrap();
        let pending = catalog.unindexed_documents(theme.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
    }

    #[tokio::test]
    async fn recent_messages_newest_first_and_bumps_session() {
        let (_tmp, catalog) = catalog().await;
        let session = catalog.create_session("alice").await.unwrap();
        for i in 1..=3 {
            catalog
                .create_message(session.id, &format!("q{}", i), Some(format!("a{}", i).as_str()))
                .await
                .unwrap();
        }

        let recent = catalog.recent_messages(session.id, 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].question, "q3");
        assert_eq!(recent[1].question, "q2");

        let reloaded = catalog.get_session(session.id).await.unwrap().unwrap();
        assert!(reloaded.updated_at >= session.updated_at);
    }

    #[tokio::test]
    async fn list_messages_filters_by_owner_and_checks_session() {
        let (_tmp, catalog) = catalog().await;
        let alice = catalog.create_session("alice").await.unwrap();
        let bob = catalog.create_session("bob").await.unwrap();
        catalog.create_message(alice.id, "hi", Some("hello")).await.unwrap();
        catalog.create_message(bob.id, "yo", None).await.unwrap();

        let all = catalog.list_messages(None, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let bobs = catalog.list_messages(None, Some("bob")).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].response, None);

        assert!(matches!(
            catalog.list_messages(Some(999), None).await,
            Err(RagError::SessionNotFound(999))
        ));
    }

    #[tokio::test]
    async fn partitions_are_unique() {
        let (_tmp, catalog) = catalog().await;
        catalog.create_partition("legal").await.unwrap();
        assert!(catalog.create_partition("legal").await.is_err());
        assert_eq!(catalog.list_partitions().await.unwrap().len(), 1);
    }
}
