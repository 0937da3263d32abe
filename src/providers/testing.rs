use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::ModelServer;
use super::types::{ChatRequest, ChatResponse, ModelInfo, ProviderError, StreamEvent};

/// In-process model server that replays a fixed script.
#[derive(Default)]
pub struct ScriptedServer {
    pub models: Vec<ModelInfo>,
    pub fragments: Vec<String>,
    /// Sent after the fragments instead of `Done`.
    pub stream_error: Option<String>,
    /// Keep the stream open after the fragments.
    pub hang: bool,
    pub reply: Option<String>,
    pub unreachable: bool,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedServer {
    pub fn with_model(path: &str) -> Self {
        Self {
            models: vec![ModelInfo::new(path)],
            ..Self::default()
        }
    }

    pub fn fragments(mut self, fragments: &[&str]) -> Self {
        self.fragments = fragments.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn recorded(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelServer for ScriptedServer {
    async fn list_models(&self, base_url: &str) -> Result<Vec<ModelInfo>, ProviderError> {
        if self.unreachable {
            return Err(ProviderError::Network(format!(
                "error sending request for url ({}/v1/models)",
                base_url
            )));
        }
        Ok(self.models.clone())
    }

    async fn respond(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        match &self.reply {
            Some(content) => Ok(ChatResponse {
                content: content.clone(),
            }),
            None => Err(ProviderError::RequestFailed("HTTP 500".to_string())),
        }
    }

    async fn stream_respond(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.requests.lock().unwrap().push(request);
        for fragment in &self.fragments {
            if tx.send(StreamEvent::Token(fragment.clone())).await.is_err() {
                return Ok(());
            }
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.stream_error {
            Some(error) => Err(ProviderError::RequestFailed(error.clone())),
            None => {
                let _ = tx.send(StreamEvent::Done).await;
                Ok(())
            }
        }
    }
}
