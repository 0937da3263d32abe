use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{now_millis, Message};
use crate::config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds", default = "now_millis")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A new "New Chat" session holding only the system prompt.
    pub fn fresh() -> Self {
        Self::with_messages(config::NEW_CHAT_TITLE, vec![Message::system_prompt()])
    }

    /// Wraps a message list read from the legacy single-thread storage key.
    pub fn from_legacy(messages: Vec<Message>) -> Self {
        Self::with_messages(config::LEGACY_CHAT_TITLE, messages)
    }

    fn with_messages(title: &str, messages: Vec<Message>) -> Self {
        Self {
            id: new_session_id(),
            title: title.to_string(),
            messages,
            created_at: now_millis(),
        }
    }

    /// True while nothing but the system prompt has been exchanged.
    pub fn is_untouched(&self) -> bool {
        matches!(self.messages.as_slice(), [only] if only.is_system())
    }
}

/// Time-ordered unique id; sessions created in the same millisecond still differ.
pub fn new_session_id() -> String {
    Uuid::now_v7().to_string()
}
