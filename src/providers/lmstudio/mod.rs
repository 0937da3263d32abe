pub mod adapter;
pub mod models;
pub mod stream;

pub use adapter::{normalize_base_url, LmStudioProvider};
