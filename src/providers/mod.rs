pub mod lmstudio;
#[cfg(test)]
pub(crate) mod testing;
pub mod traits;
pub mod types;

pub use lmstudio::LmStudioProvider;
pub use traits::ModelServer;
pub use types::{ChatMessage, ChatRequest, ChatResponse, ModelInfo, ProviderError, StreamEvent};
