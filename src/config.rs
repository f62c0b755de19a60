//! Persisted user settings threaded through every remote call.
//!
//! Each field lives under its own key in the `settings` table; a missing row
//! means "use the default". Reads always clamp `max_tokens` to the ceiling of
//! the currently selected model.

use crate::db::Database;
use crate::llm::http::HttpGatewayConfig;
use crate::llm::{Credentials, ModelId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const API_KEY: &str = "gemini-api-key";
pub const SELECTED_MODEL: &str = "selectedModel";
pub const MAX_TOKENS: &str = "ai-max-tokens";
pub const TEMPERATURE: &str = "ai-temperature";
pub const GATEWAY_BASE_URL: &str = "gateway-base-url";
pub const GATEWAY_TIMEOUT_SECS: &str = "gateway-timeout-secs";

pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const DEFAULT_GATEWAY_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub api_key: Option<String>,
    pub model: ModelId,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelId::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl Configuration {
    /// Everything a generation call needs, or `None` when no key is stored.
    pub fn credentials(&self) -> Option<Credentials> {
        self.api_key.as_ref().map(|api_key| Credentials {
            model: self.model,
            api_key: api_key.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("API key must not be empty")]
    EmptyApiKey,
    #[error("max tokens must be between 1 and {ceiling} for {model}, got {value}")]
    MaxTokensOutOfRange {
        value: u32,
        ceiling: u32,
        model: ModelId,
    },
    #[error("temperature must be between 0 and 2, got {0}")]
    TemperatureOutOfRange(f32),
}

impl Serialize for ConfigError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Sole owner of [`Configuration`]; every mutation is written through immediately.
#[derive(Clone)]
pub struct ConfigStore {
    db: Arc<Database>,
}

impl ConfigStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self) -> Result<Configuration, ConfigError> {
        let defaults = Configuration::default();

        let api_key = self
            .db
            .get_setting(API_KEY)?
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let model = match self.db.get_setting(SELECTED_MODEL)? {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring stored model");
                defaults.model
            }),
            None => defaults.model,
        };

        let max_tokens = self
            .parsed::<u32>(MAX_TOKENS)?
            .filter(|&v| v > 0)
            .unwrap_or(defaults.max_tokens)
            .min(model.max_output_tokens());

        let temperature = self
            .parsed::<f32>(TEMPERATURE)?
            .filter(|t| t.is_finite())
            .map(|t| t.clamp(0.0, MAX_TEMPERATURE))
            .unwrap_or(defaults.temperature);

        Ok(Configuration {
            api_key,
            model,
            max_tokens,
            temperature,
        })
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(raw) = self.db.get_setting(key)? else {
            return Ok(None);
        };
        match raw.trim().parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparseable setting");
                Ok(None)
            }
        }
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), ConfigError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        self.db.set_setting(API_KEY, key)?;
        info!("API key saved");
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<(), ConfigError> {
        self.db.delete_setting(API_KEY)?;
        info!("API key deleted");
        Ok(())
    }

    /// Selects a model and re-persists `max_tokens` under its ceiling.
    pub fn set_model(&self, model: ModelId) -> Result<(), ConfigError> {
        let current = self.get()?;
        self.db.set_setting(SELECTED_MODEL, model.as_str())?;
        let ceiling = model.max_output_tokens();
        if current.max_tokens > ceiling {
            self.db.set_setting(MAX_TOKENS, &ceiling.to_string())?;
        }
        info!(%model, ceiling, "model selected");
        Ok(())
    }

    pub fn set_generation_params(
        &self,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<(), ConfigError> {
        let model = self.get()?.model;
        let ceiling = model.max_output_tokens();
        if max_tokens == 0 || max_tokens > ceiling {
            return Err(ConfigError::MaxTokensOutOfRange {
                value: max_tokens,
                ceiling,
                model,
            });
        }
        if !temperature.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(ConfigError::TemperatureOutOfRange(temperature));
        }
        self.db.set_setting(MAX_TOKENS, &max_tokens.to_string())?;
        self.db.set_setting(TEMPERATURE, &temperature.to_string())?;
        info!(max_tokens, temperature, "generation parameters applied");
        Ok(())
    }

    pub fn gateway_settings(&self) -> Result<HttpGatewayConfig, ConfigError> {
        let base_url = self
            .db
            .get_setting(GATEWAY_BASE_URL)?
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string());
        let timeout_secs = self
            .parsed::<u64>(GATEWAY_TIMEOUT_SECS)?
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT_SECS);
        Ok(HttpGatewayConfig {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
