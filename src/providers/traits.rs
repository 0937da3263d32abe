use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatRequest, ChatResponse, ModelInfo, ProviderError, StreamEvent};

/// Connector to the local model server.
#[async_trait]
pub trait ModelServer: Send + Sync {
    async fn list_models(&self, base_url: &str) -> Result<Vec<ModelInfo>, ProviderError>;

    async fn respond(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Streams text fragments into `tx`, ending with `Done` or `Error`.
    /// Returning early is fine once the receiver is gone.
    async fn stream_respond(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError>;
}
