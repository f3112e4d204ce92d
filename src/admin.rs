//! Bookkeeping commands: themes, uploads, sessions, messages, partitions.
//!
//! [`upload`] is the library entry point used by the CLI and tests; the
//! `run_*` functions print results the way the other commands do.

use anyhow::Result;
use std::path::Path;
use tracing::warn;

use crate::catalog::{Catalog, SqliteCatalog};
use crate::config::Config;
use crate::error::RagError;
use crate::extract;
use crate::models::Document;
use crate::storage::FileStorage;

/// Copy `source` into storage and record it as a pending document of
/// `theme`, creating the theme if needed.
///
/// Files of unsupported kinds are accepted; indexing replaces their
/// content with a placeholder.
pub async fn upload(
    catalog: &SqliteCatalog,
    storage: &FileStorage,
    theme: &str,
    source: &Path,
) -> crate::error::Result<Document> {
    let theme = theme.trim();
    if theme.is_empty() {
        return Err(RagError::InvalidTopic("theme name is required".into()));
    }
    if !source.is_file() {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a file", source.display()),
        )));
    }

    let media_type = extract::media_type_for(source);
    if !extract::is_supported(&media_type) {
        warn!(
            "{} has unsupported type {}; it will be indexed as a placeholder",
            source.display(),
            media_type
        );
    }

    let theme = catalog.create_theme_if_absent(theme).await?;
    let file_ref = storage.save(source)?;
    catalog.add_document(theme.id, &file_ref, &media_type).await
}

fn format_ts(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

async fn open(config: &Config) -> Result<SqliteCatalog> {
    Ok(SqliteCatalog::open(&config.db.path).await?)
}

pub async fn run_theme_add(config: &Config, name: &str) -> Result<()> {
    let catalog = open(config).await?;
    let theme = catalog.create_theme(name).await;
    catalog.close().await;
    let theme = theme?;
    println!("Created theme {} ({})", theme.name, theme.id);
    Ok(())
}

pub async fn run_theme_list(config: &Config) -> Result<()> {
    let catalog = open(config).await?;
    let themes = catalog.list_themes().await?;
    catalog.close().await;

    if themes.is_empty() {
        println!("No themes.");
        return Ok(());
    }
    println!("{:<6} NAME", "ID");
    for theme in themes {
        println!("{:<6} {}", theme.id, theme.name);
    }
    Ok(())
}

pub async fn run_upload(config: &Config, theme: &str, files: &[std::path::PathBuf]) -> Result<()> {
    let catalog = open(config).await?;
    let storage = FileStorage::new(&config.storage.files_dir);

    let mut result = Ok(());
    for file in files {
        match upload(&catalog, &storage, theme, file).await {
            Ok(doc) => println!("uploaded {} as document {} ({})", file.display(), doc.id, doc.file),
            Err(e) => {
                result = Err(anyhow::anyhow!("upload of {} failed: {}", file.display(), e));
                break;
            }
        }
    }
    catalog.close().await;
    result
}

pub async fn run_documents(config: &Config, theme: &str) -> Result<()> {
    let catalog = open(config).await?;
    let documents = match catalog.get_theme_by_name(theme).await? {
        Some(t) => catalog.list_documents(t.id).await?,
        None => {
            catalog.close().await;
            anyhow::bail!("Theme not found: {}", theme);
        }
    };
    catalog.close().await;

    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    println!("{:<6} {:<8} {:<20} FILE", "ID", "INDEXED", "UPLOADED");
    for doc in documents {
        println!(
            "{:<6} {:<8} {:<20} {} ({})",
            doc.id,
            if doc.indexed { "yes" } else { "no" },
            format_ts(doc.uploaded_at),
            doc.file,
            doc.media_type
        );
    }
    Ok(())
}

pub async fn run_session_new(config: &Config, owner: &str) -> Result<()> {
    let catalog = open(config).await?;
    let session = catalog.create_session(owner).await;
    catalog.close().await;
    let session = session?;
    println!("{}", session.id);
    Ok(())
}

pub async fn run_session_list(config: &Config) -> Result<()> {
    let catalog = open(config).await?;
    let sessions = catalog.list_sessions().await?;
    catalog.close().await;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    println!("{:<6} {:<16} {:<20} UPDATED", "ID", "OWNER", "CREATED");
    for s in sessions {
        println!(
            "{:<6} {:<16} {:<20} {}",
            s.id,
            s.owner,
            format_ts(s.created_at),
            format_ts(s.updated_at)
        );
    }
    Ok(())
}

pub async fn run_messages(config: &Config, session: Option<i64>, owner: Option<&str>) -> Result<()> {
    let catalog = open(config).await?;
    let messages = catalog.list_messages(session, owner).await;
    catalog.close().await;
    let messages = messages?;

    if messages.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for m in messages {
        println!("[{}] session {} #{}", format_ts(m.created_at), m.session_id, m.id);
        println!("  Q: {}", m.question);
        println!("  A: {}", m.response.as_deref().unwrap_or("(no answer)"));
    }
    Ok(())
}

pub async fn run_partition_add(config: &Config, name: &str) -> Result<()> {
    let catalog = open(config).await?;
    let partition = catalog.create_partition(name).await;
    catalog.close().await;
    let partition = partition?;
    println!("Created partition {} ({})", partition.name, partition.id);
    Ok(())
}

pub async fn run_partition_list(config: &Config) -> Result<()> {
    let catalog = open(config).await?;
    let partitions = catalog.list_partitions().await?;
    catalog.close().await;

    if partitions.is_empty() {
        println!("No partitions.");
        return Ok(());
    }
    println!("{:<6} NAME", "ID");
    for p in partitions {
        println!("{:<6} {}", p.id, p.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup(tmp: &TempDir) -> (SqliteCatalog, FileStorage) {
        let config = Config::in_dir(tmp.path());
        let catalog = SqliteCatalog::open(&config.db.path).await.unwrap();
        crate::migrate::apply(catalog.pool()).await.unwrap();
        (catalog, FileStorage::new(&config.storage.files_dir))
    }

    #[tokio::test]
    async fn upload_creates_theme_and_pending_document() {
        let tmp = TempDir::new().unwrap();
        let (catalog, storage) = setup(&tmp).await;
        let source = tmp.path().join("capitals.txt");
        std::fs::write(&source, "Paris is the capital of France.").unwrap();

        let doc = upload(&catalog, &storage, "Geography", &source).await.unwrap();
        assert!(!doc.indexed);
        assert_eq!(doc.media_type, "text/plain");
        assert_eq!(storage.read(&doc.file).unwrap(), b"Paris is the capital of France.");

        let theme = catalog.get_theme_by_name("Geography").await.unwrap().unwrap();
        let pending = catalog.unindexed_documents(theme.id).await.unwrap();
        assert_eq!(pending, vec![doc]);
    }

    #[tokio::test]
    async fn upload_accepts_unsupported_kinds() {
        let tmp = TempDir::new().unwrap();
        let (catalog, storage) = setup(&tmp).await;
        let source = tmp.path().join("molecule.xyz");
        std::fs::write(&source, "3\nwater").unwrap();

        let doc = upload(&catalog, &storage, "Chemistry", &source).await.unwrap();
        assert!(!extract::is_supported(&doc.media_type));
    }

    #[tokio::test]
    async fn upload_requires_existing_file_and_theme_name() {
        let tmp = TempDir::new().unwrap();
        let (catalog, storage) = setup(&tmp).await;
        assert!(upload(&catalog, &storage, "Geo", &tmp.path().join("missing.txt"))
            .await
            .is_err());

        let source = tmp.path().join("a.txt");
        std::fs::write(&source, "x").unwrap();
        assert!(matches!(
            upload(&catalog, &storage, "  ", &source).await,
            Err(RagError::InvalidTopic(_))
        ));
    }
}
