use std::time::Duration;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::terra::TerraSettings;
use crate::models::terra::{WidgetSession, WidgetSessionRequest};
use crate::models::wearable::Category;
use crate::wearable::HistoryWindow;

#[derive(Debug, Error)]
pub enum TerraError {
    #[error("Terra API error: {0}")]
    Api(String),

    #[error("Invalid JSON response: {0}...")]
    InvalidJson(String),

    #[error("Terra request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// REST client for the Terra wearable-data aggregator.
#[derive(Clone)]
pub struct TerraClient {
    client: Client,
    base_url: String,
    dev_id: String,
    api_key: SecretString,
}

impl TerraClient {
    pub fn new(settings: &TerraSettings) -> Result<Self, TerraError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            dev_id: settings.dev_id.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    /// Creates a hosted widget session the user opens to link a device.
    pub async fn generate_widget_session(
        &self,
        request: &WidgetSessionRequest<'_>,
    ) -> Result<WidgetSession, TerraError> {
        let value = self
            .call(Method::POST, "/auth/generateWidgetSession", Some(request), None)
            .await?;
        serde_json::from_value(value).map_err(|e| TerraError::Api(format!("Unexpected widget session: {}", e)))
    }

    /// Asks the aggregator to deliver one category for `window` through the webhook.
    pub async fn request_history(
        &self,
        category: Category,
        terra_user_id: &str,
        window: &HistoryWindow,
    ) -> Result<Value, TerraError> {
        let start_date = window.start_param();
        let end_date = window.end_param();
        let params = [
            ("user_id", terra_user_id),
            ("start_date", start_date.as_str()),
            ("end_date", end_date.as_str()),
            ("to_webhook", "true"),
        ];
        self.call::<()>(Method::GET, &format!("/{}", category.as_str()), None, Some(&params))
            .await
    }

    pub async fn subscriptions(&self) -> Result<Value, TerraError> {
        self.call::<()>(Method::GET, "/subscriptions", None, None).await
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        params: Option<&[(&str, &str)]>,
    ) -> Result<Value, TerraError> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%method, %url, "Calling Terra API");

        let mut request = self
            .client
            .request(method, &url)
            .header("dev-id", &self.dev_id)
            .header("x-api-key", self.api_key.expose_secret())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(params) = params {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(%status, "Terra API responded");

        let data: Value = serde_json::from_str(&text).map_err(|_| {
            tracing::error!("Terra returned a non-JSON body: {}", text);
            TerraError::InvalidJson(text.chars().take(100).collect())
        })?;

        if !status.is_success() {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string());
            return Err(TerraError::Api(message));
        }

        Ok(data)
    }
}
