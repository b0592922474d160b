use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::provider::{LlmError, LlmProvider, OraclePrompt};

/// Local Ollama instance, for classification without any API key.
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(url: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            model,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        prompt: &OraclePrompt,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.url);

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        });

        debug!("Ollama request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let content = resp["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::MalformedReply("missing message.content".into()))?
            .to_string();

        Ok(content)
    }
}
