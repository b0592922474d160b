pub mod claude;
pub mod ollama;
pub mod openai;

use spedition_core::config::ClassifierConfig;

use crate::provider::{LlmError, LlmProvider};

/// Create the appropriate LLM provider based on config.
pub fn create_provider(config: &ClassifierConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = config
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = config
                .openai_base_url
                .as_deref()
                .unwrap_or("https://api.openai.com");
            Ok(Box::new(openai::OpenAiProvider::new(
                api_key.clone(),
                config.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "anthropic" | "claude" => {
            let api_key = config
                .anthropic_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Box::new(claude::ClaudeProvider::new(
                api_key.clone(),
                config.anthropic_model.clone(),
            )))
        }
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
        ))),
        "off" => Err(LlmError::NotConfigured(
            "classification oracle disabled".into(),
        )),
        other => Err(LlmError::NotConfigured(format!(
            "unknown classifier provider: '{}'",
            other
        ))),
    }
}
