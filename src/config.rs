use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub environment: String,
    #[serde(rename = "server_port")]
    pub port: u16,
    #[serde(rename = "cors_allowed_origins")]
    pub frontend_urls: Vec<String>,
    pub jwt_expiration_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
    pub page_size: u32,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::InvalidFormat(err.to_string())
    }
}

const REQUIRED: [&str; 2] = ["database_url", "jwt_secret"];

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_environment(Environment::default())
    }

    fn from_environment(source: Environment) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("environment", "development")?
            .set_default("server_port", 8080)?
            .set_default(
                "cors_allowed_origins",
                vec!["http://localhost:3001", "http://localhost:3000"],
            )?
            .set_default("jwt_expiration_hours", 24)?
            .set_default("media_root", "media")?
            .set_default("media_url", "/media/")?
            .set_default("page_size", 10)?
            .set_default("max_upload_bytes", 10 * 1024 * 1024)?
            .add_source(
                source
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins"),
            )
            .build()?;

        for key in REQUIRED {
            if settings.get_string(key).is_err() {
                return Err(ConfigError::MissingVariable(key.to_uppercase()));
            }
        }

        let mut config: AppConfig = settings.try_deserialize()?;
        config.frontend_urls = config
            .frontend_urls
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if config.jwt_expiration_hours <= 0 {
            return Err(ConfigError::InvalidFormat(
                "JWT_EXPIRATION_HOURS must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Public URL for a stored media path.
    pub fn media_link(&self, path: &str) -> String {
        format!("{}/{}", self.media_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}
