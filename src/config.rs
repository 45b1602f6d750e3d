use std::time::Duration;
use thiserror::Error;

use crate::assembler::ChunkRetry;

/// Route prefix under which short IDs are served.
pub const FILE_ROUTE: &str = "/d/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
    #[error("URL is not set; public links cannot be built")]
    MissingBaseUrl,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub telegram: TelegramConfig,
    /// Public base URL used to build absolute links (e.g. `https://files.example.com`)
    pub base_url: Option<String>,
    /// Upload API password. `None` leaves the API open.
    pub password: Option<String>,
    pub mode: UploadMode,
    /// Maximum upload size in bytes (drive mode)
    pub max_upload_size: u64,
    pub chunk_retry: ChunkRetry,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    /// Chat or channel (`@name` or numeric id) receiving uploads
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Images and common video formats only, 20 MiB cap
    Images,
    /// Any file type, capped by `max_upload_size`
    Drive,
}

impl UploadMode {
    pub const IMAGE_UPLOAD_LIMIT: u64 = 20 * 1024 * 1024;

    pub const IMAGE_EXTENSIONS: &'static [&'static str] = &[
        ".jpg", ".jpeg", ".png", ".gif", ".webp", ".mp4", ".mov", ".avi",
    ];
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            target: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8088".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let api_url = std::env::var("TELEGRAM_API_URL")
            .unwrap_or_else(|_| TelegramConfig::default().api_url);
        let bot_token = std::env::var("TOKEN").unwrap_or_default();
        let target = std::env::var("TARGET").unwrap_or_default();

        let base_url = std::env::var("URL")
            .ok()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        let password = std::env::var("PASS")
            .ok()
            .filter(|p| !p.is_empty() && p != "none");

        let mode = match std::env::var("MODE").unwrap_or_default().as_str() {
            "p" => UploadMode::Drive,
            _ => UploadMode::Images,
        };

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let defaults = ChunkRetry::default();
        let attempts = std::env::var("CHUNK_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.attempts);
        let backoff_unit = std::env::var("CHUNK_RETRY_UNIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.backoff_unit);

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            telegram: TelegramConfig {
                api_url,
                bot_token,
                target,
            },
            base_url,
            password,
            mode,
            max_upload_size,
            chunk_retry: ChunkRetry {
                attempts,
                backoff_unit,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::ValidationError(
                "TOKEN cannot be empty".to_string(),
            ));
        }

        if self.telegram.target.is_empty() {
            return Err(ConfigError::ValidationError(
                "TARGET cannot be empty".to_string(),
            ));
        }

        if self.chunk_retry.attempts == 0 {
            return Err(ConfigError::ValidationError(
                "CHUNK_RETRY_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.base_url.is_none() {
            tracing::warn!("URL is not set. Upload replies and captions will carry relative links only.");
        }

        Ok(())
    }

    /// Upload size limit for the configured mode.
    pub fn upload_limit(&self) -> u64 {
        match self.mode {
            UploadMode::Images => UploadMode::IMAGE_UPLOAD_LIMIT,
            UploadMode::Drive => self.max_upload_size,
        }
    }

    /// Absolute public link for a short ID.
    pub fn public_link(&self, short_id: &str) -> Result<String, ConfigError> {
        let base = self.base_url.as_deref().ok_or(ConfigError::MissingBaseUrl)?;
        Ok(format!("{base}{}", relative_link(short_id)))
    }
}

/// Path part of a public link, e.g. `/d/abc123`.
pub fn relative_link(short_id: &str) -> String {
    format!("{FILE_ROUTE}{short_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: Option<&str>) -> Config {
        Config {
            node: NodeConfig {
                bind_address: "127.0.0.1:0".to_string(),
                data_dir: "./data".to_string(),
            },
            telegram: TelegramConfig {
                bot_token: "token".to_string(),
                target: "@chan".to_string(),
                ..Default::default()
            },
            base_url: base_url.map(|s| s.to_string()),
            password: None,
            mode: UploadMode::Images,
            max_upload_size: 1024,
            chunk_retry: ChunkRetry::default(),
        }
    }

    #[test]
    fn test_public_link() {
        let config = config(Some("https://files.example.com"));
        assert_eq!(
            config.public_link("abc123").unwrap(),
            "https://files.example.com/d/abc123"
        );
    }

    #[test]
    fn test_public_link_without_base_url() {
        let config = config(None);
        assert!(matches!(
            config.public_link("abc123"),
            Err(ConfigError::MissingBaseUrl)
        ));
        assert_eq!(relative_link("abc123"), "/d/abc123");
    }

    #[test]
    fn test_upload_limit_by_mode() {
        let mut config = config(None);
        assert_eq!(config.upload_limit(), UploadMode::IMAGE_UPLOAD_LIMIT);
        config.mode = UploadMode::Drive;
        assert_eq!(config.upload_limit(), 1024);
    }

    #[test]
    fn test_validate_requires_token() {
        let mut config = config(None);
        config.telegram.bot_token.clear();
        assert!(config.validate().is_err());
    }
}
