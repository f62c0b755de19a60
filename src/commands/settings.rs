use crate::config::ConfigError;
use crate::llm::{ModelId, ModelInfo};
use crate::pipeline::Pipeline;
use serde::Serialize;
use tauri::State;

#[derive(Debug, Serialize, Clone)]
pub struct SettingsView {
    /// Masked for display; the raw key never leaves the backend.
    pub api_key: Option<String>,
    pub model: ModelId,
    pub max_tokens: u32,
    pub max_tokens_ceiling: u32,
    pub temperature: f32,
}

fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return key.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "•".repeat(chars.len() - 8), tail)
}

#[tauri::command]
pub fn get_settings(pipeline: State<'_, Pipeline>) -> Result<SettingsView, ConfigError> {
    let config = pipeline.config().get()?;
    Ok(SettingsView {
        api_key: config.api_key.as_deref().map(mask_api_key),
        model: config.model,
        max_tokens: config.max_tokens,
        max_tokens_ceiling: config.model.max_output_tokens(),
        temperature: config.temperature,
    })
}

#[tauri::command]
pub fn set_api_key(pipeline: State<'_, Pipeline>, key: String) -> Result<(), ConfigError> {
    pipeline.config().set_api_key(&key)
}

#[tauri::command]
pub fn clear_api_key(pipeline: State<'_, Pipeline>) -> Result<(), ConfigError> {
    pipeline.config().clear_api_key()
}

#[tauri::command]
pub fn set_model(pipeline: State<'_, Pipeline>, model: ModelId) -> Result<(), ConfigError> {
    pipeline.config().set_model(model)
}

#[tauri::command]
pub fn set_generation_params(
    pipeline: State<'_, Pipeline>,
    max_tokens: u32,
    temperature: f32,
) -> Result<(), ConfigError> {
    pipeline.config().set_generation_params(max_tokens, temperature)
}

#[tauri::command]
pub fn list_models() -> Vec<ModelInfo> {
    ModelId::ALL.into_iter().map(ModelId::info).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("short"), "short");
        assert_eq!(mask_api_key("AIzaSyABCDEF1234"), "AIza••••••••1234");
    }
}
