use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds", default = "now_millis")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_millis(),
        }
    }

    pub fn system_prompt() -> Self {
        Self::new(Role::System, config::SYSTEM_PROMPT)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Empty assistant message that streaming playback fills in.
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, String::new())
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Only assistant replies with some text offer a copy action.
    pub fn is_copyable(&self) -> bool {
        self.role == Role::Assistant && !self.content.is_empty()
    }
}

/// Current time at the millisecond precision the stored JSON keeps.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_assistant_text_is_copyable() {
        assert!(Message::new(Role::Assistant, "Quantum computing uses qubits.").is_copyable());
        assert!(!Message::placeholder().is_copyable());
        assert!(!Message::user("Explain quantum computing").is_copyable());
        assert!(!Message::system_prompt().is_copyable());
    }
}
