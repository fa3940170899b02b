use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// OpenAI-compatible chat-completions request.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<CompletionMessage<'a>>,
}

#[derive(Debug, Serialize)]
pub struct CompletionMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Error envelope returned by the provider on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ProviderErrorBody {
    pub error: ProviderError,
}

#[derive(Debug, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, ThisError)]
pub enum LlmError {
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    #[error("API quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("LLM service returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}
