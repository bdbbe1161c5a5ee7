//! Configuration management for oppminer.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.oppminer/config.toml`)
//! 3. Environment variable overrides (`OPPMINER_` prefix)

mod defaults;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level configuration for the oppminer service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Data storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// LLM provider credentials and model selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Bearer token for the chat-completions endpoint.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the chat-completions API.
    #[serde(default = "defaults::llm_base_url")]
    pub base_url: String,

    /// Model used for theme naming and idea generation.
    #[serde(default = "defaults::ideation_model")]
    pub ideation_model: String,

    /// Model tried after the primary exhausts its daily quota.
    #[serde(default = "defaults::fallback_model")]
    pub fallback_model: Option<String>,

    /// Stronger model used for the market-validation pass.
    #[serde(default = "defaults::validation_model")]
    pub validation_model: String,

    /// Per-job spend ceiling in USD. Enforced best-effort: the validator
    /// is skipped once the ledger crosses it.
    #[serde(default = "defaults::cost_limit_usd")]
    pub cost_limit_usd: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: defaults::llm_base_url(),
            ideation_model: defaults::ideation_model(),
            fallback_model: defaults::fallback_model(),
            validation_model: defaults::validation_model(),
            cost_limit_usd: defaults::cost_limit_usd(),
        }
    }
}

/// SQLite storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file. `~` expands to the home directory.
    #[serde(default = "defaults::db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: defaults::db_path(),
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply
    /// environment overrides.
    ///
    /// A missing file is not an error; defaults are used.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if std::path::Path::new(p).exists() => {
                let raw = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                    path: p.to_string(),
                })?;
                toml::from_str(&raw).map_err(|source| ConfigError::ParseError { source })?
            }
            _ => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `OPPMINER_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("OPPMINER_LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Ok(v) = env::var("OPPMINER_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = env::var("OPPMINER_IDEATION_MODEL") {
            self.llm.ideation_model = v;
        }
        if let Ok(v) = env::var("OPPMINER_FALLBACK_MODEL") {
            self.llm.fallback_model = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = env::var("OPPMINER_VALIDATION_MODEL") {
            self.llm.validation_model = v;
        }
        if let Ok(v) = env::var("OPPMINER_COST_LIMIT_USD") {
            if let Ok(parsed) = v.parse::<f64>() {
                self.llm.cost_limit_usd = parsed;
            }
        }
        if let Ok(v) = env::var("OPPMINER_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Ok(v) = env::var("OPPMINER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("OPPMINER_PORT") {
            if let Ok(parsed) = v.parse::<u16>() {
                self.server.port = parsed;
            }
        }
    }

    /// Validate the loaded configuration.
    ///
    /// A job started with an invalid configuration fails immediately, so
    /// this is called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::MissingField {
                field: "llm.api_key".to_string(),
            });
        }
        if self.llm.base_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "llm.base_url".to_string(),
            });
        }
        if self.llm.ideation_model.is_empty() {
            return Err(ConfigError::MissingField {
                field: "llm.ideation_model".to_string(),
            });
        }
        if self.llm.cost_limit_usd <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.cost_limit_usd".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.storage.db_path.is_empty() {
            return Err(ConfigError::MissingField {
                field: "storage.db_path".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_except_api_key() {
        let config = Config::default();
        match config.validate() {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "llm.api_key"),
            other => panic!("expected missing api_key, got: {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_models() {
        let config = Config::default();
        assert_eq!(config.llm.ideation_model, "gpt-4o-mini");
        assert_eq!(config.llm.validation_model, "gpt-4o");
        assert_eq!(config.llm.fallback_model.as_deref(), Some("gpt-3.5-turbo"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn parses_partial_toml() {
        let raw = r#"
            [llm]
            api_key = "sk-test"
            ideation_model = "llama-3.1-70b"

            [server]
            port = 9000
        "#;
        let config: Config = toml::from_str(raw).expect("parse");
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.llm.ideation_model, "llama-3.1-70b");
        // Untouched sections keep their defaults.
        assert_eq!(config.llm.validation_model, "gpt-4o");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn rejects_nonpositive_cost_limit() {
        let mut config = Config::default();
        config.llm.api_key = "sk-test".to_string();
        config.llm.cost_limit_usd = 0.0;
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "llm.cost_limit_usd");
            }
            other => panic!("expected invalid cost limit, got: {other:?}"),
        }
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let config = Config::load(Some("/nonexistent/oppminer.toml")).expect("load");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }
}
