use bytes::BytesMut;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::models::OpenAiStreamChunk;
use crate::providers::types::StreamEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    Token(String),
    Done,
}

/// Incremental decoder for OpenAI-style `text/event-stream` bodies.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence or
/// between the two newlines that end an event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    bytes: BytesMut,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseItem> {
        self.bytes.extend_from_slice(chunk);
        self.decode_text();

        let mut items = Vec::new();
        while let Some(event_end) = self.buffer.find("\n\n") {
            let event_text: String = self.buffer.drain(..event_end + 2).collect();
            parse_event(&event_text, &mut items);
        }
        items
    }

    /// Flushes a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Vec<SseItem> {
        let mut items = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            parse_event(&rest, &mut items);
        }
        items
    }

    fn decode_text(&mut self) {
        loop {
            let take = match std::str::from_utf8(&self.bytes) {
                Ok(_) => self.bytes.len(),
                Err(e) => match e.error_len() {
                    // Invalid sequence: pass it through lossily.
                    Some(len) => e.valid_up_to() + len,
                    // Incomplete tail: wait for the rest.
                    None => e.valid_up_to(),
                },
            };
            if take == 0 {
                return;
            }
            let decoded = self.bytes.split_to(take);
            let text = String::from_utf8_lossy(&decoded);
            self.buffer.push_str(&text.replace('\r', ""));
            if self.bytes.is_empty() {
                return;
            }
        }
    }
}

fn parse_event(event_text: &str, items: &mut Vec<SseItem>) {
    for line in event_text.lines() {
        let payload = match line.strip_prefix("data:") {
            Some(p) => p.strip_prefix(' ').unwrap_or(p),
            None => continue,
        };

        if payload.trim() == "[DONE]" {
            items.push(SseItem::Done);
            continue;
        }

        match serde_json::from_str::<OpenAiStreamChunk>(payload) {
            Ok(chunk) => {
                if let Some(content) = chunk.choices.first().and_then(|c| c.delta.content.as_ref()) {
                    if !content.is_empty() {
                        items.push(SseItem::Token(content.clone()));
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to parse SSE data: {}", e);
            }
        }
    }
}

pub async fn parse_sse_stream(response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk_result) = stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(format!("Stream error: {}", e)))
                    .await;
                return;
            }
        };

        for item in decoder.feed(&bytes) {
            match item {
                SseItem::Token(token) => {
                    if tx.send(StreamEvent::Token(token)).await.is_err() {
                        return; // receiver dropped
                    }
                }
                SseItem::Done => {
                    let _ = tx.send(StreamEvent::Done).await;
                    return;
                }
            }
        }
    }

    for item in decoder.finish() {
        if let SseItem::Token(token) = item {
            if tx.send(StreamEvent::Token(token)).await.is_err() {
                return;
            }
        }
    }

    // Stream ended without [DONE]
    let _ = tx.send(StreamEvent::Done).await;
}
