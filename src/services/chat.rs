use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::models::Message;
use crate::providers::{ChatMessage, ChatRequest, ModelInfo, ModelServer, ProviderError, StreamEvent};

use super::playback::PlaybackBuffer;

/// Parameters needed to dispatch a chat request to the model server.
pub struct ChatDispatchParams {
    pub base_url: String,
    pub model: Option<String>,
    pub history: Vec<Message>,
}

/// What the UI should do with the in-progress assistant message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Replace the visible text with this prefix of the reply.
    Reveal(String),
    /// Playback caught up with a completed reply.
    Finished(String),
    Failed(String),
}

/// The explicitly selected model, else the first one the server listed.
pub fn resolve_model(selected: Option<&str>, models: &[ModelInfo]) -> Option<String> {
    selected
        .map(str::to_string)
        .or_else(|| models.first().map(|m| m.path.clone()))
}

pub fn build_request(base_url: &str, model: &str, history: &[Message]) -> ChatRequest {
    ChatRequest {
        base_url: base_url.to_string(),
        model: model.to_string(),
        messages: history.iter().map(ChatMessage::from).collect(),
    }
}

/// Stream a reply and play it back at display rate through `on_event`.
///
/// Ends after `Finished` once every received character has been revealed,
/// after `Failed`, or silently when `cancel_token` fires.
pub async fn run_streaming<F>(
    server: Arc<dyn ModelServer>,
    params: ChatDispatchParams,
    cancel_token: CancellationToken,
    tick: Duration,
    mut on_event: F,
) where
    F: FnMut(ChatEvent) + Send,
{
    let Some(model) = params.model else {
        on_event(ChatEvent::Failed(ProviderError::NoModels.to_string()));
        return;
    };

    let request = build_request(&params.base_url, &model, &params.history);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<StreamEvent>(64);

    tracing::debug!("Streaming reply from {} with {}", params.base_url, model);

    // Dropping the handle aborts the request when playback stops early.
    let _stream_handle = AbortOnDropHandle::new(tokio::spawn(async move {
        if let Err(e) = server.stream_respond(request, tx.clone()).await {
            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
        }
    }));

    let mut buffer = PlaybackBuffer::new();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                tracing::debug!("Reply stopped after {} characters", buffer.revealed().len());
                return;
            }
            event = rx.recv(), if !buffer.is_closed() => {
                match event {
                    Some(StreamEvent::Token(token)) => buffer.push(&token),
                    Some(StreamEvent::Done) => buffer.close(),
                    Some(StreamEvent::Error(error)) => {
                        on_event(ChatEvent::Failed(error));
                        return;
                    }
                    None => {
                        if buffer.full_text().is_empty() {
                            on_event(ChatEvent::Failed("Stream ended unexpectedly".to_string()));
                            return;
                        }
                        buffer.close();
                    }
                }
            }
            _ = ticker.tick() => {
                if let Some(text) = buffer.tick() {
                    on_event(ChatEvent::Reveal(text.to_string()));
                }
                if buffer.is_drained() {
                    on_event(ChatEvent::Finished(buffer.full_text().to_string()));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::providers::testing::ScriptedServer;

    const TICK: Duration = Duration::from_millis(1);

    fn params(model: Option<&str>) -> ChatDispatchParams {
        ChatDispatchParams {
            base_url: "http://localhost:1234".to_string(),
            model: model.map(str::to_string),
            history: vec![Message::system_prompt(), Message::user("Explain quantum computing")],
        }
    }

    #[test]
    fn test_resolve_model_prefers_selection() {
        let models = vec![ModelInfo::new("a/first"), ModelInfo::new("b/second")];
        assert_eq!(resolve_model(Some("b/second"), &models).as_deref(), Some("b/second"));
        assert_eq!(resolve_model(None, &models).as_deref(), Some("a/first"));
        assert_eq!(resolve_model(None, &[]), None);
    }

    #[tokio::test]
    async fn test_reply_is_played_back_then_finished() {
        let server = Arc::new(
            ScriptedServer::with_model("qwen").fragments(&["Quantum ", "computing uses ", "qubits."]),
        );
        let mut events = Vec::new();

        run_streaming(
            server.clone(),
            params(Some("qwen")),
            CancellationToken::new(),
            TICK,
            |e| events.push(e),
        )
        .await;

        let full = "Quantum computing uses qubits.";
        assert_eq!(events.last(), Some(&ChatEvent::Finished(full.to_string())));

        let reveals: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Reveal(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reveals.last(), Some(&full));
        assert!(reveals.len() > 1);
        for pair in reveals.windows(2) {
            assert!(pair[1].starts_with(pair[0]));
        }

        let sent = server.recorded();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].model, "qwen");
        assert_eq!(sent[0].messages[0].role, Role::System);
        assert_eq!(sent[0].messages[1].content, "Explain quantum computing");
    }

    #[tokio::test]
    async fn test_stream_failure_reports_reason() {
        let mut server = ScriptedServer::with_model("qwen").fragments(&["partial"]);
        server.stream_error = Some("HTTP 500: model crashed".to_string());
        let mut events = Vec::new();

        run_streaming(
            Arc::new(server),
            params(Some("qwen")),
            CancellationToken::new(),
            TICK,
            |e| events.push(e),
        )
        .await;

        match events.last() {
            Some(ChatEvent::Failed(reason)) => assert!(reason.contains("model crashed")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, ChatEvent::Finished(_))));
    }

    #[tokio::test]
    async fn test_missing_model_fails_without_request() {
        let server = Arc::new(ScriptedServer::default());
        let mut events = Vec::new();

        run_streaming(server.clone(), params(None), CancellationToken::new(), TICK, |e| {
            events.push(e)
        })
        .await;

        assert_eq!(
            events,
            vec![ChatEvent::Failed(
                "No models found. Please download a model in LM Studio.".to_string()
            )]
        );
        assert!(server.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_ends_quietly() {
        let mut server = ScriptedServer::with_model("qwen").fragments(&["Hello there, this keeps going"]);
        server.hang = true;
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let mut events = Vec::new();

        run_streaming(Arc::new(server), params(Some("qwen")), cancel, TICK, |e| {
            if matches!(e, ChatEvent::Reveal(_)) {
                stopper.cancel();
            }
            events.push(e);
        })
        .await;

        // 29 characters waiting, so the first frame shows three of them.
        assert_eq!(events, vec![ChatEvent::Reveal("Hel".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_stream_without_done_fails() {
        struct Silent;

        #[async_trait::async_trait]
        impl ModelServer for Silent {
            async fn list_models(&self, _: &str) -> Result<Vec<ModelInfo>, ProviderError> {
                Ok(Vec::new())
            }
            async fn respond(
                &self,
                _: ChatRequest,
            ) -> Result<crate::providers::ChatResponse, ProviderError> {
                Err(ProviderError::RequestFailed("not scripted".to_string()))
            }
            async fn stream_respond(
                &self,
                _: ChatRequest,
                _: tokio::sync::mpsc::Sender<StreamEvent>,
            ) -> Result<(), ProviderError> {
                Ok(())
            }
        }

        let mut events = Vec::new();
        run_streaming(Arc::new(Silent), params(Some("x")), CancellationToken::new(), TICK, |e| {
            events.push(e)
        })
        .await;

        assert_eq!(
            events,
            vec![ChatEvent::Failed("Stream ended unexpectedly".to_string())]
        );
    }
}
