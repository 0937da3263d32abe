//! Application state that lives independently of the widget tree.
//!
//! Every user action and background result goes through one of the methods
//! here; the GUI only renders what this holds. Mutations that touch the
//! session collection mark it dirty so the caller can schedule a write.

use crate::models::{Message, Role, Session};
use crate::providers::{ModelInfo, ProviderError};
use crate::services::chat::{resolve_model, ChatEvent};

/// Everything needed to dispatch a reply and, when due, a title request.
#[derive(Debug, Clone)]
pub struct SendPlan {
    pub stream_id: u64,
    pub session_id: String,
    /// Full history including the new user message, without the placeholder.
    pub history: Vec<Message>,
    pub prompt: String,
    pub needs_title: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// No connection check has finished yet.
    Checking,
    Connected,
    Failed,
}

#[derive(Debug, Clone)]
struct StreamTarget {
    stream_id: u64,
    session_id: String,
}

#[derive(Debug)]
pub struct AppState {
    sessions: Vec<Session>,
    active_id: String,
    stream: Option<StreamTarget>,
    next_stream_id: u64,
    server_url: String,
    connection: Connection,
    /// Set when the configured URL itself was rejected.
    invalid_url: Option<String>,
    models: Vec<ModelInfo>,
    selected_model: Option<String>,
    error: Option<String>,
    dirty: bool,
}

impl AppState {
    pub fn new(mut sessions: Vec<Session>, server_url: String) -> Self {
        if sessions.is_empty() {
            sessions.push(Session::fresh());
        }
        let active_id = sessions[0].id.clone();

        Self {
            sessions,
            active_id,
            stream: None,
            next_stream_id: 1,
            server_url,
            connection: Connection::Checking,
            invalid_url: None,
            models: Vec::new(),
            selected_model: None,
            error: None,
            // Loading may have migrated or synthesized sessions.
            dirty: true,
        }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.session(&self.active_id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Messages of the active session without the system prompt.
    pub fn visible_messages(&self) -> Vec<&Message> {
        self.active_session()
            .map(|s| s.messages.iter().filter(|m| !m.is_system()).collect())
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.stream.is_some()
    }

    pub fn streaming_session_id(&self) -> Option<&str> {
        self.stream.as_ref().map(|t| t.session_id.as_str())
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == Connection::Connected
    }

    /// Persistent banner text while the server cannot be reached.
    pub fn connection_banner(&self) -> Option<String> {
        if self.connection != Connection::Failed {
            return None;
        }
        Some(match &self.invalid_url {
            Some(reason) => reason.clone(),
            None => format!(
                "Could not connect to {}. Check IP and ensure server is running.",
                self.server_url
            ),
        })
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    /// Model a send would use right now.
    pub fn current_model(&self) -> Option<String> {
        resolve_model(self.selected_model.as_deref(), &self.models)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Snapshot of the collection if it changed since the last call.
    pub fn take_snapshot(&mut self) -> Option<Vec<Session>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.sessions.clone())
    }

    // --- Sessions ---

    /// Start a blank session at the top of the list and make it active.
    pub fn new_chat(&mut self) -> Option<String> {
        if self.is_loading() {
            return None;
        }
        let session = Session::fresh();
        let id = session.id.clone();
        self.sessions.insert(0, session);
        self.active_id = id.clone();
        self.error = None;
        self.dirty = true;
        Some(id)
    }

    pub fn switch_session(&mut self, id: &str) -> bool {
        if self.is_loading() || id == self.active_id || self.session(id).is_none() {
            return false;
        }
        self.active_id = id.to_string();
        self.error = None;
        true
    }

    /// Remove a session. The collection never ends up empty and the active
    /// id always names a session that exists.
    pub fn delete_session(&mut self, id: &str) -> bool {
        if self.streaming_session_id() == Some(id) {
            return false;
        }
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };
        self.sessions.remove(index);

        if self.sessions.is_empty() {
            self.sessions.push(Session::fresh());
        }
        if self.active_id == id {
            self.active_id = self.sessions[0].id.clone();
            self.error = None;
        }
        self.dirty = true;
        true
    }

    pub fn retitle(&mut self, session_id: &str, title: String) -> bool {
        let Some(session) = self.session_mut(session_id) else {
            return false;
        };
        session.title = title;
        self.dirty = true;
        true
    }

    // --- Chat lifecycle ---

    /// Append the user message and an empty assistant placeholder to the
    /// active session and enter the loading state.
    pub fn begin_send(&mut self, content: &str) -> Option<SendPlan> {
        let content = content.trim();
        if content.is_empty() || self.is_loading() {
            return None;
        }

        let stream_id = self.next_stream_id;
        let session_id = self.active_id.clone();
        let session = self.session_mut(&session_id)?;

        let needs_title = session.is_untouched();
        session.messages.push(Message::user(content));
        let history = session.messages.clone();
        session.messages.push(Message::placeholder());

        self.next_stream_id += 1;
        self.stream = Some(StreamTarget {
            stream_id,
            session_id: session_id.clone(),
        });
        self.error = None;
        self.dirty = true;

        Some(SendPlan {
            stream_id,
            session_id,
            history,
            prompt: content.to_string(),
            needs_title,
        })
    }

    pub fn apply_chat_event(&mut self, stream_id: u64, event: ChatEvent) -> bool {
        match event {
            ChatEvent::Reveal(text) => self.reveal(stream_id, text),
            ChatEvent::Finished(text) => self.finish_stream(stream_id, text),
            ChatEvent::Failed(error) => self.fail_stream(stream_id, error),
        }
    }

    /// Show `text` as the in-progress reply. Ignored once the stream was
    /// stopped or replaced.
    pub fn reveal(&mut self, stream_id: u64, text: String) -> bool {
        let Some(placeholder) = self.placeholder_mut(stream_id) else {
            return false;
        };
        placeholder.content = text;
        self.dirty = true;
        true
    }

    pub fn finish_stream(&mut self, stream_id: u64, text: String) -> bool {
        if !self.reveal(stream_id, text) {
            return false;
        }
        self.stream = None;
        true
    }

    /// Drop the placeholder and surface `error`. The user message stays.
    pub fn fail_stream(&mut self, stream_id: u64, error: String) -> bool {
        let Some(target) = self.target(stream_id).cloned() else {
            return false;
        };
        if let Some(session) = self.session_mut(&target.session_id) {
            if session.messages.last().is_some_and(|m| m.role == Role::Assistant) {
                session.messages.pop();
            }
        }
        tracing::warn!("Reply failed: {}", error);
        self.stream = None;
        self.error = Some(error);
        self.dirty = true;
        true
    }

    /// Stop waiting for the reply. Text revealed so far is kept.
    pub fn stop(&mut self) -> bool {
        if self.stream.take().is_none() {
            return false;
        }
        self.dirty = true;
        true
    }

    // --- Server ---

    pub fn set_server_url(&mut self, url: String) {
        self.server_url = url;
        self.connection = Connection::Checking;
        self.invalid_url = None;
    }

    /// Models listed by a successful connection check. The selection is kept when the
    /// server still offers it.
    pub fn set_models(&mut self, models: Vec<ModelInfo>) {
        if let Some(selected) = &self.selected_model {
            if !models.iter().any(|m| &m.path == selected) {
                self.selected_model = None;
            }
        }
        self.models = models;
        self.connection = Connection::Connected;
        self.invalid_url = None;
    }

    /// The chat state is left alone; only the status and model list change.
    pub fn connection_failed(&mut self, error: &ProviderError) {
        self.connection = Connection::Failed;
        self.invalid_url = match error {
            ProviderError::InvalidUrl(_) => Some(error.to_string()),
            _ => None,
        };
        self.models.clear();
        self.selected_model = None;
    }

    pub fn select_model(&mut self, path: &str) -> bool {
        if !self.models.iter().any(|m| m.path == path) {
            return false;
        }
        self.selected_model = Some(path.to_string());
        true
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    fn target(&self, stream_id: u64) -> Option<&StreamTarget> {
        self.stream.as_ref().filter(|t| t.stream_id == stream_id)
    }

    fn placeholder_mut(&mut self, stream_id: u64) -> Option<&mut Message> {
        let session_id = self.target(stream_id)?.session_id.clone();
        self.session_mut(&session_id)?
            .messages
            .last_mut()
            .filter(|m| m.role == Role::Assistant)
    }
}
