pub mod http;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Models the remote service can run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gemini-1.5-flash")]
    Gemini15Flash,
    #[serde(rename = "gemini-1.5-pro")]
    Gemini15Pro,
    #[default]
    #[serde(rename = "gemini-2.0-flash")]
    Gemini20Flash,
    #[serde(rename = "gemini-2.5-flash-preview-05-20")]
    Gemini25FlashPreview,
    #[serde(rename = "gemini-2.5-pro-preview-05-06")]
    Gemini25ProPreview,
}

impl ModelId {
    pub const ALL: [ModelId; 5] = [
        ModelId::Gemini15Flash,
        ModelId::Gemini15Pro,
        ModelId::Gemini20Flash,
        ModelId::Gemini25FlashPreview,
        ModelId::Gemini25ProPreview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelId::Gemini15Flash => "gemini-1.5-flash",
            ModelId::Gemini15Pro => "gemini-1.5-pro",
            ModelId::Gemini20Flash => "gemini-2.0-flash",
            ModelId::Gemini25FlashPreview => "gemini-2.5-flash-preview-05-20",
            ModelId::Gemini25ProPreview => "gemini-2.5-pro-preview-05-06",
        }
    }

    /// Upper bound for `max_tokens` on this model.
    pub fn max_output_tokens(self) -> u32 {
        match self {
            ModelId::Gemini15Flash | ModelId::Gemini15Pro | ModelId::Gemini20Flash => 8192,
            ModelId::Gemini25FlashPreview | ModelId::Gemini25ProPreview => 65536,
        }
    }

    pub fn info(self) -> ModelInfo {
        let (name, tier) = match self {
            ModelId::Gemini15Flash => ("Gemini 1.5 Flash", Tier::Free),
            ModelId::Gemini15Pro => ("Gemini 1.5 Pro", Tier::Paid),
            ModelId::Gemini20Flash => ("Gemini 2.0 Flash", Tier::Free),
            ModelId::Gemini25FlashPreview => ("Gemini 2.5 Flash Preview 05-20", Tier::Free),
            ModelId::Gemini25ProPreview => ("Gemini 2.5 Pro Preview 05-06", Tier::Paid),
        };
        ModelInfo {
            id: self,
            name: name.to_string(),
            tier,
            max_output_tokens: self.max_output_tokens(),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown model: {0}")]
pub struct UnknownModel(pub String);

impl FromStr for ModelId {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownModel(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Paid,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModelInfo {
    pub id: ModelId,
    pub name: String,
    pub tier: Tier,
    pub max_output_tokens: u32,
}

/// Model, key and sampling parameters attached to every generation call.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub model: ModelId,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Body of the optimize-prompt call.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizePromptRequest {
    pub system_prompt: String,
    pub instructions: String,
    pub example_output: String,
    pub document_name: String,
    pub document_bytes: Vec<u8>,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Optimized prompt as currently edited by the user.
    pub prompt: String,
    pub document_text: Option<String>,
    pub credentials: Credentials,
}

impl GenerateRequest {
    /// Text sent as `prompt_result`: the prompt, then the document when there is one.
    pub fn prompt_result(&self) -> String {
        match self.document_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                format!("{}\n\nDocument content:\n{}", self.prompt, text)
            }
            _ => self.prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeResponseRequest {
    pub response: String,
    pub credentials: Credentials,
}

/// The four remote operations. Implementations do not retry.
#[async_trait::async_trait]
pub trait InferenceGateway: Send + Sync {
    async fn validate_key(&self, model: ModelId, api_key: &str) -> Result<(), GatewayError>;

    async fn optimize_prompt(&self, request: &OptimizePromptRequest)
        -> Result<String, GatewayError>;

    async fn generate_response(&self, request: &GenerateRequest) -> Result<String, GatewayError>;

    async fn optimize_response(
        &self,
        request: &OptimizeResponseRequest,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid API key: {0}")]
    InvalidKey(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Remote error: {0}")]
    Remote(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("No reply within {0:?}")]
    Timeout(Duration),
}

impl GatewayError {
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, GatewayError::InvalidKey(_))
    }
}

impl Serialize for GatewayError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            model: ModelId::Gemini20Flash,
            api_key: "k1".into(),
            max_tokens: 1024,
            temperature: 0.5,
        }
    }

    #[test]
    fn test_model_ids_parse_back() {
        for model in ModelId::ALL {
            assert_eq!(model.as_str().parse::<ModelId>().unwrap(), model);
        }
        assert_eq!(
            "gpt-4o".parse::<ModelId>(),
            Err(UnknownModel("gpt-4o".into()))
        );
    }

    #[test]
    fn test_model_serializes_as_wire_id() {
        let json = serde_json::to_string(&ModelId::Gemini25ProPreview).unwrap();
        assert_eq!(json, "\"gemini-2.5-pro-preview-05-06\"");
    }

    #[test]
    fn test_prompt_result_appends_document() {
        let request = GenerateRequest {
            prompt: "Summarize.".into(),
            document_text: Some("Patient reports headache.\n".into()),
            credentials: credentials(),
        };
        assert_eq!(
            request.prompt_result(),
            "Summarize.\n\nDocument content:\nPatient reports headache."
        );
    }

    #[test]
    fn test_prompt_result_without_document() {
        let request = GenerateRequest {
            prompt: "Summarize.".into(),
            document_text: Some("   ".into()),
            credentials: credentials(),
        };
        assert_eq!(request.prompt_result(), "Summarize.");
    }

    #[test]
    fn test_credentials_debug_redacts_key() {
        let debug = format!("{:?}", credentials());
        assert!(!debug.contains("k1"));
        assert!(debug.contains("REDACTED"));
    }
}
