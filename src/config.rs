use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::GrocerError;

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3001
}
fn default_data_dir() -> String {
    "./grocerai.data".into()
}
fn default_gemini_api_key() -> String {
    String::new()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_provider_timeout_secs() -> u64 {
    30
}
fn default_chat_rate_limit() -> usize {
    50
}
fn default_chat_rate_window_secs() -> u64 {
    15 * 60
}
fn default_admin_rate_limit() -> usize {
    20
}
fn default_admin_rate_window_secs() -> u64 {
    10 * 60
}
fn default_context_window_turns() -> usize {
    10
}
fn default_history_limit() -> usize {
    50
}
fn default_sessions_limit() -> usize {
    10
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Completion-provider credential. Falls back to the GEMINI_API_KEY
    /// environment variable when left empty; may stay empty, in which case
    /// chat requests fail with a configuration error at request time.
    #[serde(default = "default_gemini_api_key")]
    pub gemini_api_key: String,
    #[serde(default)]
    pub gemini_base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    #[serde(default = "default_chat_rate_limit")]
    pub chat_rate_limit: usize,
    #[serde(default = "default_chat_rate_window_secs")]
    pub chat_rate_window_secs: u64,
    #[serde(default = "default_admin_rate_limit")]
    pub admin_rate_limit: usize,
    #[serde(default = "default_admin_rate_window_secs")]
    pub admin_rate_window_secs: u64,
    /// How many caller-supplied history turns are included in the prompt.
    #[serde(default = "default_context_window_turns")]
    pub context_window_turns: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_sessions_limit")]
    pub sessions_limit: usize,
    /// Only honor X-Forwarded-For when the server sits behind a trusted proxy.
    #[serde(default)]
    pub trust_x_forwarded_for: bool,
}

impl Config {
    pub fn data_root_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn resolve_config_path() -> Result<Option<PathBuf>, GrocerError> {
        if let Ok(custom) = std::env::var("GROCERAI_CONFIG") {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(GrocerError::Config(format!(
                "GROCERAI_CONFIG points to non-existent file: {custom}"
            )));
        }

        if std::path::Path::new("./grocerai.config.yaml").exists() {
            return Ok(Some(PathBuf::from("./grocerai.config.yaml")));
        }
        if std::path::Path::new("./grocerai.config.yml").exists() {
            return Ok(Some(PathBuf::from("./grocerai.config.yml")));
        }
        Ok(None)
    }

    /// Load config from YAML file, or fall back to defaults when no file
    /// exists (the server can run entirely off GEMINI_API_KEY).
    pub fn load() -> Result<Self, GrocerError> {
        let mut config = match Self::resolve_config_path()? {
            Some(path) => {
                let path_str = path.to_string_lossy().to_string();
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    GrocerError::Config(format!("Failed to read {path_str}: {e}"))
                })?;
                serde_yaml::from_str::<Config>(&content).map_err(|e| {
                    GrocerError::Config(format!("Failed to parse {path_str}: {e}"))
                })?
            }
            None => serde_yaml::from_str::<Config>("{}")
                .map_err(|e| GrocerError::Config(format!("Failed to build defaults: {e}")))?,
        };
        config.post_deserialize()?;
        Ok(config)
    }

    /// Apply post-deserialization normalization and validation.
    pub(crate) fn post_deserialize(&mut self) -> Result<(), GrocerError> {
        if self.gemini_api_key.trim().is_empty() {
            if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                self.gemini_api_key = key;
            }
        }
        self.gemini_api_key = self.gemini_api_key.trim().to_string();
        self.model = self.model.trim().to_string();

        if self.model.is_empty() {
            return Err(GrocerError::Config("model must not be empty".into()));
        }
        if self.chat_rate_limit == 0 || self.admin_rate_limit == 0 {
            return Err(GrocerError::Config(
                "rate limits must be greater than zero".into(),
            ));
        }
        if self.chat_rate_window_secs == 0 || self.admin_rate_window_secs == 0 {
            return Err(GrocerError::Config(
                "rate limit windows must be greater than zero".into(),
            ));
        }
        if self.context_window_turns == 0 {
            return Err(GrocerError::Config(
                "context_window_turns must be greater than zero".into(),
            ));
        }
        if self.provider_timeout_secs == 0 {
            return Err(GrocerError::Config(
                "provider_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn api_key_configured(&self) -> bool {
        !self.gemini_api_key.trim().is_empty()
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        let mut config: Config = serde_yaml::from_str("{}").unwrap();
        config.gemini_api_key = "test-key".into();
        config
    }
}
