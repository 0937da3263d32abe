use std::time::Duration;

pub const APP_ID: &str = "com.lmchat.LmChat";
pub const APP_NAME: &str = "LM Studio Chat";

// Storage keys
pub const SESSIONS_KEY: &str = "chat_sessions";
pub const LEGACY_MESSAGES_KEY: &str = "chat_messages";
pub const SERVER_URL_KEY: &str = "lm_studio_url";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:1234";

pub const NEW_CHAT_TITLE: &str = "New Chat";
pub const LEGACY_CHAT_TITLE: &str = "Previous Chat";

pub const SYSTEM_PROMPT: &str = "You are a specialized AI assistant strictly focused on AI tools, coding, and software technologies. You must ONLY answer questions directly related to these topics. If a user asks about anything else (e.g., movies, celebrities, general knowledge, politics, sports), you MUST refuse to answer and reply with a creative, AI-themed error message explaining that the topic is out of your scope.";

pub const TITLE_PROMPT: &str = "Generate a very short (3-5 words) title for this chat based on the user's first prompt. Do not use quotes. Output ONLY the title.";

pub const NO_MODELS_MESSAGE: &str = "No models found. Please download a model in LM Studio.";

/// One display frame.
pub const PLAYBACK_TICK: Duration = Duration::from_millis(16);

pub const SUGGESTIONS: &[(&str, &str)] = &[
    ("Explain quantum computing", "\u{269B}\u{FE0F}"),
    ("Write a Python script for scraping", "\u{1F40D}"),
    ("Analyze this code snippet", "\u{1F50D}"),
    ("Create a workout plan", "\u{1F4AA}"),
];
