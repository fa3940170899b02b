use std::time::Duration;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::llm::LlmSettings;
use crate::models::llm::{
    CompletionMessage, CompletionRequest, CompletionResponse, LlmError, ProviderErrorBody,
};

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl LlmService {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `prompt` as a single user message and returns the generated text.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!("Calling LLM service with model {}", self.model);

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![CompletionMessage { role: "user", content: prompt }],
        };

        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::NetworkError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("LLM service returned error {}: {}", status, error_text);
            return Err(classify_error(status.as_u16(), &error_text));
        }

        let body = response.text().await?;
        let completion: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("No completion content".to_string()))
    }
}

/// Maps a provider error response onto the error kinds callers distinguish.
fn classify_error(status: u16, body: &str) -> LlmError {
    let parsed = serde_json::from_str::<ProviderErrorBody>(body).ok().map(|b| b.error);
    let code = parsed
        .as_ref()
        .and_then(|e| e.code.clone().or_else(|| e.error_type.clone()))
        .unwrap_or_default();
    let message = parsed
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    match (status, code.as_str()) {
        (_, "invalid_api_key") | (401, _) => LlmError::InvalidApiKey(message),
        (_, "insufficient_quota") | (429, _) => LlmError::QuotaExceeded(message),
        _ => LlmError::Upstream { status, message },
    }
}
