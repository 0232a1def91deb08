//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, then config/local.toml)
//! 3. Environment variables (JAIPP__*, override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Backend selector
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Hosted BaaS over its PostgREST endpoint
    #[default]
    Rest,
    /// Embedded SQLite file
    Sqlite,
}

/// Relationship/artist backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub mode: BackendMode,
    #[serde(default)]
    pub rest: RestBackendConfig,
    #[serde(default)]
    pub sqlite: SqliteBackendConfig,
}

/// Hosted BaaS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RestBackendConfig {
    /// Project URL (e.g., "https://xyz.supabase.co")
    pub url: Option<String>,
    /// Public anon key, sent as `apikey`
    pub anon_key: Option<String>,
    /// Relationship table name
    #[serde(default = "default_relationships_table")]
    pub relationships_table: String,
    /// Artist table name
    #[serde(default = "default_artists_table")]
    pub artists_table: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RestBackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            relationships_table: default_relationships_table(),
            artists_table: default_artists_table(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_relationships_table() -> String {
    "relationships".to_string()
}

fn default_artists_table() -> String {
    "artists".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Embedded SQLite configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteBackendConfig {
    /// Path to SQLite database file
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("data/jaipp.db")
}

/// Artist search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Quiet period before a typed search term is queried (default: 250)
    pub debounce_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (JAIPP__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("backend.mode", "rest")?
            .set_default("backend.sqlite.path", "data/jaipp.db")?
            .set_default("backend.rest.relationships_table", "relationships")?
            .set_default("backend.rest.artists_table", "artists")?
            .set_default("backend.rest.timeout_seconds", 30)?
            .set_default("search.debounce_ms", 250)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("JAIPP")
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

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.backend.mode == BackendMode::Rest {
            let url = self
                .backend
                .rest
                .url
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    AppError::Config(
                        "backend.rest.url is required when backend.mode=rest".to_string(),
                    )
                })?;

            let parsed = url::Url::parse(url)
                .map_err(|e| AppError::Config(format!("backend.rest.url is invalid: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::Config(
                    "backend.rest.url must use http or https".to_string(),
                ));
            }

            if self
                .backend
                .rest
                .anon_key
                .as_deref()
                .map(str::trim)
                .is_none_or(str::is_empty)
            {
                return Err(AppError::Config(
                    "backend.rest.anon_key is required when backend.mode=rest".to_string(),
                ));
            }

            if self.backend.rest.timeout_seconds == 0 {
                return Err(AppError::Config(
                    "backend.rest.timeout_seconds must be greater than 0".to_string(),
                ));
            }
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }
}
