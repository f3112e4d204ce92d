//! Recent conversation history for prompt assembly.

use crate::catalog::Catalog;
use crate::error::{RagError, Result};
use crate::models::Turn;

/// The last `limit` turns of a session, oldest first.
pub async fn recent_turns(catalog: &dyn Catalog, session_id: i64, limit: i64) -> Result<Vec<Turn>> {
    if catalog.get_session(session_id).await?.is_none() {
        return Err(RagError::SessionNotFound(session_id));
    }
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let mut messages = catalog.recent_messages(session_id, limit).await?;
    messages.reverse();
    Ok(messages
        .into_iter()
        .map(|m| Turn {
            question: m.question,
            answer: m.response,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;
    use crate::config::Config;
    use tempfile::TempDir;

    async fn catalog(tmp: &TempDir) -> SqliteCatalog {
        let config = Config::in_dir(tmp.path());
        let catalog = SqliteCatalog::open(&config.db.path).await.unwrap();
        crate::migrate::apply(catalog.pool()).await.unwrap();
        catalog
    }

    #[tokio::test]
    async fn last_two_turns_in_chronological_order() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp).await;
        let session = catalog.create_session("ana").await.unwrap();
        for i in 1..=3 {
            catalog
                .create_message(session.id, &format!("q{}", i), Some(format!("a{}", i).as_str()))
                .await
                .unwrap();
        }

        let turns = recent_turns(&catalog, session.id, 2).await.unwrap();
        assert_eq!(
            turns,
            vec![
                Turn {
                    question: "q2".into(),
                    answer: Some("a2".into())
                },
                Turn {
                    question: "q3".into(),
                    answer: Some("a3".into())
                },
            ]
        );
    }

    #[tokio::test]
    async fn non_positive_limit_is_empty() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp).await;
        let session = catalog.create_session("ana").await.unwrap();
        catalog.create_message(session.id, "q", Some("a")).await.unwrap();

        assert!(recent_turns(&catalog, session.id, 0).await.unwrap().is_empty());
        assert!(recent_turns(&catalog, session.id, -3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_fails() {
        let tmp = TempDir::new().unwrap();
        let catalog = catalog(&tmp).await;
        assert!(matches!(
            recent_turns(&catalog, 404, 10).await,
            Err(RagError::SessionNotFound(404))
        ));
    }
}
