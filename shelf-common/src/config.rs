//! Configuration loading
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (applied by the binary after loading)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! A missing TOML file is never fatal: a warning is logged and defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SHELF_CONFIG";

const APP_DIR: &str = "shelfsense";

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// SQLite database file; `None` uses the platform data directory
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub google_books: GoogleBooksConfig,
    pub open_library: OpenLibraryConfig,
    pub generator: GeneratorConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5780".to_string(),
            database_path: None,
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            google_books: GoogleBooksConfig::default(),
            open_library: OpenLibraryConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Recommendation engine tuning
///
/// The caps bound outbound call volume and prompt size per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of seeds fed to the query planner
    pub seed_cap: usize,
    /// Maximum number of distinct query variants issued per request
    pub query_variant_cap: usize,
    /// Maximum candidate pool length after deduplication
    pub pool_cap: usize,
    /// Length of the head-token query variant, in characters
    pub head_token_chars: usize,
    /// Length of candidate description snippets in the prompt, in characters
    pub description_snippet_chars: usize,
    /// Literal query used when no seed yields a variant
    pub fallback_query: String,
    /// Number of pool candidates persisted in the image flow (0 disables)
    pub persist_candidates: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed_cap: 8,
            query_variant_cap: 6,
            pool_cap: 60,
            head_token_chars: 12,
            description_snippet_chars: 180,
            fallback_query: "programming".to_string(),
            persist_candidates: 20,
        }
    }
}

/// Google Books backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleBooksConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Results per query (the API caps this at 40)
    pub max_results: u32,
    pub rate_per_second: u32,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key: None,
            max_results: 10,
            rate_per_second: 10,
        }
    }
}

/// Open Library backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLibraryConfig {
    pub base_url: String,
    pub limit: u32,
    pub rate_per_second: u32,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openlibrary.org".to_string(),
            limit: 20,
            rate_per_second: 5,
        }
    }
}

/// Generative model endpoint settings (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub structured_model: String,
    pub fallback_model: String,
    pub vision_model: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            structured_model: "gpt-4o-mini".to_string(),
            fallback_model: "gpt-4o".to_string(),
            vision_model: "gpt-4o".to_string(),
            timeout_secs: 60,
        }
    }
}

impl ShelfConfig {
    /// Load configuration from TOML (if any) and apply environment overrides
    ///
    /// # Arguments
    /// * `explicit_path` - Config file named on the command line. Unlike the
    ///   search-path locations, a missing explicit file is an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match locate_config_file(explicit_path)? {
            Some(path) => {
                let config = Self::from_toml_file(&path)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Apply environment variable overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(addr) = env_value("SHELF_BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(path) = env_value("SHELF_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(level) = env_value("SHELF_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(key) = env_value("SHELF_GOOGLE_BOOKS_API_KEY") {
            self.google_books.api_key = Some(key);
        }
        if let Some(url) = env_value("SHELF_GENERATOR_BASE_URL") {
            self.generator.base_url = url;
        }

        // Service-specific variable wins over the conventional one
        if let Some(key) = env_value("SHELF_OPENAI_API_KEY").or_else(|| env_value("OPENAI_API_KEY")) {
            self.generator.api_key = Some(key);
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        for (name, value) in [
            ("engine.seed_cap", engine.seed_cap),
            ("engine.query_variant_cap", engine.query_variant_cap),
            ("engine.pool_cap", engine.pool_cap),
            ("engine.head_token_chars", engine.head_token_chars),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if engine.fallback_query.trim().is_empty() {
            return Err(Error::Config("engine.fallback_query must not be empty".to_string()));
        }
        if self.google_books.rate_per_second == 0 || self.open_library.rate_per_second == 0 {
            return Err(Error::Config("backend rate_per_second must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Generator API key, or a configuration error explaining where to set it
    pub fn generator_api_key(&self) -> Result<String> {
        match self.generator.api_key.as_deref() {
            Some(key) if is_valid_key(key) => Ok(key.to_string()),
            _ => Err(Error::Config(
                "Generator API key not configured. Set one of:\n\
                 1. Environment: SHELF_OPENAI_API_KEY or OPENAI_API_KEY\n\
                 2. TOML config: [generator] api_key = \"...\""
                    .to_string(),
            )),
        }
    }

    /// Database path, falling back to the platform data directory
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Find the config file to load, if any
///
/// Order: explicit path, `SHELF_CONFIG`, user config dir, `/etc/shelfsense`.
fn locate_config_file(explicit_path: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit_path {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!("Config file not found: {}", path.display())));
    }

    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc").join(APP_DIR).join("config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    Ok(None)
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./shelfsense_data"))
        .join("shelfsense.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = ShelfConfig::default();
        assert_eq!(config.engine.query_variant_cap, 6);
        assert_eq!(config.engine.seed_cap, 8);
        assert_eq!(config.engine.pool_cap, 60);
        assert_eq!(config.engine.head_token_chars, 12);
        assert_eq!(config.engine.fallback_query, "programming");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_cap_rejected() {
        let mut config = ShelfConfig::default();
        config.engine.pool_cap = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("engine.pool_cap"));
    }

    #[test]
    fn test_blank_key_is_invalid() {
        assert!(!is_valid_key("   "));
        assert!(is_valid_key("sk-test"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ShelfConfig = toml::from_str(
            r#"
            [engine]
            query_variant_cap = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.query_variant_cap, 8);
        assert_eq!(config.engine.pool_cap, 60);
        assert_eq!(config.bind_address, "127.0.0.1:5780");
    }
}
