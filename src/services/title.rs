use std::sync::Arc;

use crate::config;
use crate::models::Role;
use crate::providers::{ChatMessage, ChatRequest, ModelServer, ProviderError};

pub struct TitleParams {
    pub session_id: String,
    pub base_url: String,
    pub model: String,
    pub prompt: String,
}

/// Trim the reply and drop one surrounding quote character on each side.
pub fn clean_title(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix(['"', '\''])
        .unwrap_or(trimmed);
    let trimmed = trimmed
        .strip_suffix(['"', '\''])
        .unwrap_or(trimmed);
    let title = trimmed.trim();

    (!title.is_empty()).then(|| title.to_string())
}

pub fn title_request(base_url: &str, model: &str, prompt: &str) -> ChatRequest {
    ChatRequest {
        base_url: base_url.to_string(),
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: Role::System,
                content: config::TITLE_PROMPT.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: prompt.to_string(),
            },
        ],
    }
}

pub async fn generate_title(
    server: &dyn ModelServer,
    base_url: &str,
    model: &str,
    prompt: &str,
) -> Result<String, ProviderError> {
    let response = server.respond(title_request(base_url, model, prompt)).await?;
    clean_title(&response.content)
        .ok_or_else(|| ProviderError::InvalidResponse("empty title".to_string()))
}

/// Fire-and-forget title generation. Failures only reach the log; the
/// session keeps its current title.
pub async fn run_title_task<F>(server: Arc<dyn ModelServer>, params: TitleParams, on_title: F)
where
    F: FnOnce(String, String) + Send,
{
    match generate_title(server.as_ref(), &params.base_url, &params.model, &params.prompt).await {
        Ok(title) => {
            tracing::debug!("Generated title for {}: {}", params.session_id, title);
            on_title(params.session_id, title);
        }
        Err(e) => tracing::warn!("Title generation failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::ScriptedServer;

    fn params() -> TitleParams {
        TitleParams {
            session_id: "s1".to_string(),
            base_url: "http://localhost:1234".to_string(),
            model: "qwen".to_string(),
            prompt: "How do I use tokio::select?".to_string(),
        }
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("  \"Rust Async Basics\"\n").as_deref(), Some("Rust Async Basics"));
        assert_eq!(clean_title("'Quantum Intro'").as_deref(), Some("Quantum Intro"));
        assert_eq!(clean_title("Plain Title").as_deref(), Some("Plain Title"));
        assert_eq!(clean_title("Don't Panic").as_deref(), Some("Don't Panic"));
        assert_eq!(clean_title("  \"\" "), None);
        assert_eq!(clean_title(""), None);
    }

    #[test]
    fn test_title_request_shape() {
        let request = title_request("http://h:1", "m", "hello");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("3-5 words"));
        assert_eq!(request.messages[1].content, "hello");
    }

    #[tokio::test]
    async fn test_title_task_reports_cleaned_title() {
        let mut server = ScriptedServer::with_model("qwen");
        server.reply = Some("\"Tokio Select Usage\"".to_string());
        let server = Arc::new(server);

        let mut result = None;
        run_title_task(server.clone(), params(), |id, title| result = Some((id, title))).await;

        assert_eq!(
            result,
            Some(("s1".to_string(), "Tokio Select Usage".to_string()))
        );
        assert_eq!(server.recorded()[0].messages[1].content, "How do I use tokio::select?");
    }

    #[tokio::test]
    async fn test_title_failure_is_silent() {
        let server = Arc::new(ScriptedServer::with_model("qwen"));
        let mut called = false;
        run_title_task(server, params(), |_, _| called = true).await;
        assert!(!called);
    }
}
