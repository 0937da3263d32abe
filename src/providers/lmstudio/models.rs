use serde::{Deserialize, Serialize};

// --- Request types ---

#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

// --- Response types (non-streaming) ---

#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    pub choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiMessage,
}

// --- Model list ---

#[derive(Debug, Deserialize)]
pub struct OpenAiModelList {
    pub data: Vec<OpenAiModel>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiModel {
    pub id: String,
}

// --- Streaming types ---

#[derive(Debug, Deserialize)]
pub struct OpenAiStreamChunk {
    pub choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiStreamChoice {
    pub delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiDelta {
    pub content: Option<String>,
}

// --- Error types ---

#[derive(Debug, Deserialize)]
pub struct OpenAiErrorResponse {
    pub error: OpenAiErrorBody,
}

// LM Studio sometimes sends the error as a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OpenAiErrorBody {
    Detail { message: String },
    Text(String),
}

impl OpenAiErrorBody {
    pub fn message(&self) -> &str {
        match self {
            OpenAiErrorBody::Detail { message } => message,
            OpenAiErrorBody::Text(text) => text,
        }
    }
}
