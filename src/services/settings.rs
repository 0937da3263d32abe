use anyhow::Result;

use super::database::Database;
use crate::config;

pub struct SettingsService;

impl SettingsService {
    /// Saved server URL, or the default local address.
    pub async fn load_server_url(db: &Database) -> String {
        match db.get(config::SERVER_URL_KEY).await {
            Ok(Some(url)) if !url.trim().is_empty() => url,
            Ok(_) => config::DEFAULT_SERVER_URL.to_string(),
            Err(e) => {
                tracing::error!("Failed to read server URL: {}", e);
                config::DEFAULT_SERVER_URL.to_string()
            }
        }
    }

    pub async fn save_server_url(db: &Database, url: &str) -> Result<()> {
        db.set(config::SERVER_URL_KEY, url.trim()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_url_when_unset() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(
            SettingsService::load_server_url(&db).await,
            "http://localhost:1234"
        );
    }

    #[tokio::test]
    async fn test_saved_url_round_trip() {
        let db = Database::new_in_memory().unwrap();
        SettingsService::save_server_url(&db, " ws://10.0.0.5:1234 ")
            .await
            .unwrap();
        assert_eq!(
            SettingsService::load_server_url(&db).await,
            "ws://10.0.0.5:1234"
        );
    }
}
