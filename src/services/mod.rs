pub mod chat;
pub mod database;
pub mod markdown;
pub mod playback;
pub mod sessions;
pub mod settings;
pub mod title;

pub use database::Database;
pub use sessions::{PersistHandle, PersistWriter, SessionStore};
pub use settings::SettingsService;
