use anyhow::Result;
use tokio::sync::watch;

use super::database::Database;
use crate::config;
use crate::models::{Message, Session};

pub struct SessionStore;

impl SessionStore {
    /// Load the session collection, migrating the legacy single-thread
    /// format when needed. Never returns an empty list.
    pub async fn load(db: &Database) -> Vec<Session> {
        if let Some(sessions) = Self::load_current(db).await {
            return sessions;
        }
        if let Some(session) = Self::load_legacy(db).await {
            tracing::info!(
                "Migrated {} legacy messages into a session",
                session.messages.len()
            );
            return vec![session];
        }
        vec![Session::fresh()]
    }

    async fn load_current(db: &Database) -> Option<Vec<Session>> {
        let json = Self::read(db, config::SESSIONS_KEY).await?;
        match serde_json::from_str::<Vec<Session>>(&json) {
            Ok(sessions) if !sessions.is_empty() => Some(sessions),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Discarding unreadable session data: {}", e);
                None
            }
        }
    }

    async fn load_legacy(db: &Database) -> Option<Session> {
        let json = Self::read(db, config::LEGACY_MESSAGES_KEY).await?;
        match serde_json::from_str::<Vec<Message>>(&json) {
            Ok(messages) => Some(Session::from_legacy(messages)),
            Err(e) => {
                tracing::debug!("Discarding unreadable legacy messages: {}", e);
                None
            }
        }
    }

    async fn read(db: &Database, key: &str) -> Option<String> {
        match db.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read '{}': {}", key, e);
                None
            }
        }
    }

    pub async fn save(db: &Database, sessions: &[Session]) -> Result<()> {
        let json = serde_json::to_string(sessions)?;
        db.set(config::SESSIONS_KEY, &json).await
    }
}

/// Schedules full-collection writes without blocking the caller.
///
/// Snapshots are coalesced: if several arrive while a write is in progress
/// only the newest one is written next.
pub struct PersistHandle {
    tx: watch::Sender<Option<Vec<Session>>>,
}

pub struct PersistWriter {
    db: Database,
    rx: watch::Receiver<Option<Vec<Session>>>,
}

impl PersistHandle {
    pub fn channel(db: Database) -> (PersistHandle, PersistWriter) {
        let (tx, rx) = watch::channel(None);
        (PersistHandle { tx }, PersistWriter { db, rx })
    }

    pub fn schedule(&self, sessions: Vec<Session>) {
        if self.tx.send(Some(sessions)).is_err() {
            tracing::warn!("Session writer is gone; changes will not be saved");
        }
    }
}

impl PersistWriter {
    /// Runs until the handle is dropped, after writing the last snapshot.
    pub async fn run(mut self) {
        while self.rx.changed().await.is_ok() {
            let snapshot = self.rx.borrow_and_update().clone();
            if let Some(sessions) = snapshot {
                if let Err(e) = SessionStore::save(&self.db, &sessions).await {
                    tracing::error!("Failed to save sessions: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn test_fresh_session_when_storage_empty() {
        let db = Database::new_in_memory().unwrap();
        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "New Chat");
        assert_eq!(sessions[0].messages.len(), 1);
        assert_eq!(sessions[0].messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_legacy_messages_become_previous_chat() {
        let db = Database::new_in_memory().unwrap();
        let legacy = r#"[
            {"role":"system","content":"sys","timestamp":1700000000000},
            {"role":"user","content":"hello","timestamp":1700000001000},
            {"role":"assistant","content":"hi there","timestamp":1700000002000}
        ]"#;
        db.set("chat_messages", legacy).await.unwrap();

        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Previous Chat");

        let expected: Vec<Message> = serde_json::from_str(legacy).unwrap();
        assert_eq!(sessions[0].messages, expected);
        assert_eq!(sessions[0].messages[2].content, "hi there");
        assert_eq!(sessions[0].messages[1].timestamp.timestamp_millis(), 1700000001000);
    }

    #[tokio::test]
    async fn test_current_format_wins_over_legacy() {
        let db = Database::new_in_memory().unwrap();
        let mut session = Session::fresh();
        session.title = "Rust lifetimes".to_string();
        SessionStore::save(&db, &[session.clone()]).await.unwrap();
        db.set("chat_messages", "[]").await.unwrap();

        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions, vec![session]);
    }

    #[tokio::test]
    async fn test_corrupt_current_falls_back_to_legacy() {
        let db = Database::new_in_memory().unwrap();
        db.set("chat_sessions", "{not json").await.unwrap();
        db.set(
            "chat_messages",
            r#"[{"role":"user","content":"old","timestamp":1}]"#,
        )
        .await
        .unwrap();

        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Previous Chat");
        assert_eq!(sessions[0].messages[0].content, "old");
    }

    #[tokio::test]
    async fn test_everything_corrupt_gives_fresh_session() {
        let db = Database::new_in_memory().unwrap();
        db.set("chat_sessions", "42").await.unwrap();
        db.set("chat_messages", "nope").await.unwrap();

        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "New Chat");
    }

    #[tokio::test]
    async fn test_reads_camel_case_session_json() {
        let db = Database::new_in_memory().unwrap();
        let json = r#"[{"id":"1718000000000","title":"Async Rust","createdAt":1718000000000,
            "messages":[{"role":"system","content":"sys","timestamp":1718000000000},
                        {"role":"user","content":"what is tokio","timestamp":1718000000500,"isImage":false}]}]"#;
        db.set("chat_sessions", json).await.unwrap();

        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions[0].id, "1718000000000");
        assert_eq!(sessions[0].title, "Async Rust");
        assert_eq!(sessions[0].created_at.timestamp_millis(), 1718000000000);
        assert_eq!(sessions[0].messages[1].content, "what is tokio");
    }

    #[tokio::test]
    async fn test_saved_json_uses_camel_case_and_millis() {
        let db = Database::new_in_memory().unwrap();
        let session = Session::fresh();
        SessionStore::save(&db, &[session.clone()]).await.unwrap();

        let raw = db.get("chat_sessions").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value[0]["createdAt"].as_i64(),
            Some(session.created_at.timestamp_millis())
        );
        assert_eq!(value[0]["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn test_writer_persists_latest_snapshot() {
        let db = Database::new_in_memory().unwrap();
        let (handle, writer) = PersistHandle::channel(db.clone());
        let task = tokio::spawn(writer.run());

        let first = Session::fresh();
        let mut second = Session::fresh();
        second.title = "Second".to_string();

        handle.schedule(vec![first.clone()]);
        handle.schedule(vec![second.clone(), first.clone()]);
        drop(handle);
        task.await.unwrap();

        let sessions = SessionStore::load(&db).await;
        assert_eq!(sessions, vec![second, first]);
    }
}
