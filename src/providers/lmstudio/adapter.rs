use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;
use url::Url;

use super::models::*;
use crate::providers::traits::ModelServer;
use crate::providers::types::{
    ChatMessage, ChatRequest, ChatResponse, ModelInfo, ProviderError, StreamEvent,
};

pub struct LmStudioProvider {
    client: Client,
}

impl Default for LmStudioProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LmStudioProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn build_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            })
            .collect()
    }

    fn parse_error_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            return format!("HTTP {}: {}", status.as_u16(), parsed.error.message());
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    fn endpoint(base_url: &str, path: &str) -> Result<String, ProviderError> {
        let base = normalize_base_url(base_url)?;
        Ok(format!("{}{}", base, path))
    }

    async fn post_completion(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = Self::endpoint(&request.base_url, "/v1/chat/completions")?;

        let openai_request = OpenAiRequest {
            model: request.model.clone(),
            messages: Self::build_messages(&request.messages),
            stream,
        };

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        Ok(response)
    }
}

/// Turns a user-entered server address into an HTTP base URL.
///
/// Accepts the `ws://host:port` form LM Studio advertises for its SDK socket,
/// bare `host:port`, and plain HTTP(S) URLs.
pub fn normalize_base_url(raw: &str) -> Result<String, ProviderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::InvalidUrl("empty server URL".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "http",
        "https" | "wss" => "https",
        other => {
            return Err(ProviderError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| ProviderError::InvalidUrl(trimmed.to_string()))?;
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl ModelServer for LmStudioProvider {
    async fn list_models(&self, base_url: &str) -> Result<Vec<ModelInfo>, ProviderError> {
        let url = Self::endpoint(base_url, "/v1/models")?;

        let response = self.client.get(&url).send().await.map_err(|e| {
            ProviderError::Network(format!("Failed to connect to {}: {}", base_url, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed(Self::parse_error_message(
                status, &body,
            )));
        }

        let model_list: OpenAiModelList = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse model list: {}", e))
        })?;

        Ok(model_list
            .data
            .into_iter()
            .map(|m| ModelInfo::new(m.id))
            .collect())
    }

    async fn respond(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let response = self.post_completion(&request, false).await?;

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "No content in response".to_string(),
            ));
        }

        Ok(ChatResponse { content })
    }

    async fn stream_respond(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        use super::stream::parse_sse_stream;

        let response = self.post_completion(&request, true).await?;
        parse_sse_stream(response, tx).await;

        Ok(())
    }
}
