//! Seam between the classifier and whichever LLM backs the oracle.

use async_trait::async_trait;

/// One oracle round: a system prompt that pins the reply format and a user
/// prompt carrying the file evidence. Classification never needs more turns
/// than that, so the seam is a single exchange rather than a chat history.
#[derive(Debug, Clone)]
pub struct OraclePrompt {
    pub system: String,
    pub user: String,
}

/// An LLM backend the classifier can consult.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one prompt round and return the raw reply text.
    async fn complete(
        &self,
        prompt: &OraclePrompt,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} — {body}")]
    Api { status: u16, body: String },
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}
