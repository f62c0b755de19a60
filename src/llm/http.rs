use super::{
    Credentials, GatewayError, GenerateRequest, InferenceGateway, ModelId,
    OptimizePromptRequest, OptimizeResponseRequest,
};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// Talks to the prompt service over multipart forms and JSON replies.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: Client,
}

/// Either the payload text or an `{ "error": ... }` object in its place.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplyField {
    Text(String),
    Error { error: Value },
    Other(Value),
}

#[derive(Deserialize, Default)]
struct GatewayReply {
    #[serde(default)]
    response: Option<ReplyField>,
    #[serde(default)]
    prompt: Option<ReplyField>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Clone, Copy)]
enum Field {
    Response,
    Prompt,
}

fn error_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

impl HttpGateway {
    pub fn new(config: &HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generation_form(credentials: &Credentials) -> Form {
        Form::new()
            .text("models", credentials.model.as_str())
            .text("api_key", credentials.api_key.clone())
            .text("max_tokens", credentials.max_tokens.to_string())
            .text("ai_temperature", credentials.temperature.to_string())
    }

    async fn post(&self, endpoint: &str, form: Form) -> Result<GatewayReply, GatewayError> {
        debug!(endpoint, "posting to prompt service");
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayReply>(&text)
                .ok()
                .and_then(|reply| reply.error)
                .map(|e| error_text(&e))
                .unwrap_or(text);
            warn!(endpoint, status, "prompt service returned an error status");
            return Err(GatewayError::Api { status, message });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Pulls the success text out of a reply, mapping embedded errors through `on_error`.
    fn extract(
        reply: GatewayReply,
        field: Field,
        on_error: fn(String) -> GatewayError,
    ) -> Result<String, GatewayError> {
        if let Some(error) = reply.error {
            return Err(on_error(error_text(&error)));
        }
        let value = match field {
            Field::Response => reply.response,
            Field::Prompt => reply.prompt,
        };
        match value {
            Some(ReplyField::Text(text)) => Ok(text),
            Some(ReplyField::Error { error }) => Err(on_error(error_text(&error))),
            Some(ReplyField::Other(other)) => Err(GatewayError::Parse(format!(
                "unexpected reply field: {}",
                other
            ))),
            None => Err(GatewayError::Parse("reply has no result field".into())),
        }
    }
}

#[async_trait::async_trait]
impl InferenceGateway for HttpGateway {
    async fn validate_key(&self, model: ModelId, api_key: &str) -> Result<(), GatewayError> {
        let form = Form::new()
            .text("models", model.as_str())
            .text("api_key", api_key.to_string());
        let reply = self.post("Validate_key", form).await?;
        Self::extract(reply, Field::Response, GatewayError::InvalidKey).map(|_| ())
    }

    async fn optimize_prompt(
        &self,
        request: &OptimizePromptRequest,
    ) -> Result<String, GatewayError> {
        let file = Part::bytes(request.document_bytes.clone())
            .file_name(request.document_name.clone());
        let form = Self::generation_form(&request.credentials)
            .part("file", file)
            .text("system_prompt", request.system_prompt.clone())
            .text("istructions", request.instructions.clone())
            .text("example_output", request.example_output.clone());
        let reply = self.post("chat", form).await?;
        Self::extract(reply, Field::Prompt, GatewayError::Remote)
    }

    async fn generate_response(&self, request: &GenerateRequest) -> Result<String, GatewayError> {
        let form = Self::generation_form(&request.credentials)
            .text("prompt_result", request.prompt_result());
        let reply = self.post("generate_response", form).await?;
        Self::extract(reply, Field::Response, GatewayError::Remote)
    }

    async fn optimize_response(
        &self,
        request: &OptimizeResponseRequest,
    ) -> Result<String, GatewayError> {
        let form = Self::generation_form(&request.credentials)
            .text("response_result", request.response.clone());
        let reply = self.post("optimize_response", form).await?;
        Self::extract(reply, Field::Response, GatewayError::Remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> GatewayReply {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_text_field() {
        let text = HttpGateway::extract(
            reply(r#"{"success": true, "document_name": "a.txt", "prompt": "OPTIMIZED"}"#),
            Field::Prompt,
            GatewayError::Remote,
        )
        .unwrap();
        assert_eq!(text, "OPTIMIZED");
    }

    #[test]
    fn test_extract_nested_error() {
        let err = HttpGateway::extract(
            reply(r#"{"response": {"error": "Invalid API Key"}}"#),
            Field::Response,
            GatewayError::InvalidKey,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidKey(m) if m == "Invalid API Key"));
    }

    #[test]
    fn test_extract_top_level_error() {
        let err = HttpGateway::extract(
            reply(r#"{"error": " Api key is missing"}"#),
            Field::Response,
            GatewayError::Remote,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::Remote(m) if m == "Api key is missing"));
    }

    #[test]
    fn test_extract_missing_field_is_parse_error() {
        let err = HttpGateway::extract(reply("{}"), Field::Prompt, GatewayError::Remote)
            .unwrap_err();
        assert!(matches!(err, GatewayError::Parse(_)));
    }
}
