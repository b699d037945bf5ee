//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub social: SocialConfig,
    /// Session restored at startup (optional)
    #[serde(default)]
    pub session: Option<SessionConfig>,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub host: String,
    /// Port number (e.g., 8787)
    pub port: u16,
    /// Origins allowed to call the API cross-origin (empty = any)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which relational store the social graph lives in
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Local SQLite file (offline mode, development, tests)
    #[default]
    Sqlite,
    /// Hosted PostgREST-compatible API
    Rest,
}

/// Backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rest: RestBackendConfig,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Hosted backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestBackendConfig {
    /// Project URL (e.g. "https://project.example.co")
    pub url: Option<String>,
    /// Public (anon) API key sent as the `apikey` header
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_rest_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RestBackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_seconds: default_rest_timeout_seconds(),
        }
    }
}

fn default_rest_timeout_seconds() -> u64 {
    15
}

/// Social store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    /// How long fetched follow data is reused before refetching (default: 60)
    pub cache_ttl_seconds: u64,
}

impl SocialConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

/// Session to sign in with at startup
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub user_id: String,
    pub access_token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        format!("cinecircle={},tower_http=debug", self.level.to_ascii_lowercase())
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CINECIRCLE__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8787)?
            .set_default("backend.mode", "sqlite")?
            .set_default("backend.database.path", "data/cinecircle.db")?
            .set_default("backend.rest.timeout_seconds", 15)?
            .set_default("social.cache_ttl_seconds", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("CINECIRCLE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.social.cache_ttl_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "social.cache_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.backend.mode == BackendMode::Rest {
            let url = self
                .backend
                .rest
                .url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    crate::error::AppError::Config(
                        "backend.rest.url is required when backend.mode=rest".to_string(),
                    )
                })?;

            let parsed = url::Url::parse(url).map_err(|e| {
                crate::error::AppError::Config(format!("backend.rest.url is invalid: {}", e))
            })?;
            if parsed.scheme() != "https" && parsed.scheme() != "http" {
                return Err(crate::error::AppError::Config(
                    "backend.rest.url must use http or https".to_string(),
                ));
            }

            if self
                .backend
                .rest
                .api_key
                .as_deref()
                .is_none_or(|key| key.trim().is_empty())
            {
                return Err(crate::error::AppError::Config(
                    "backend.rest.api_key is required when backend.mode=rest".to_string(),
                ));
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {})",
                self.logging.level
            )));
        }
        if !self.logging.is_json() && !self.logging.format.eq_ignore_ascii_case("pretty") {
            return Err(crate::error::AppError::Config(format!(
                "logging.format must be pretty or json (got {})",
                self.logging.format
            )));
        }

        if let Some(session) = &self.session {
            if session.user_id.trim().is_empty() {
                return Err(crate::error::AppError::Config(
                    "session.user_id must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
