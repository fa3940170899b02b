use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::wearable::Category;

/// User block attached to every aggregator webhook delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerraUser {
    pub user_id: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub scopes: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

/// Raw webhook body as posted by the aggregator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerraWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user: Option<TerraUser>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub number_of_payloads: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    AuthSuccess,
    AuthFailure,
    LargeRequestProcessing,
    LargeRequestSending,
    Data(Category),
    Other,
}

impl TerraWebhookEvent {
    pub fn kind(&self) -> WebhookEventKind {
        match self.event_type.as_str() {
            "auth" if self.status.as_deref() == Some("success") => WebhookEventKind::AuthSuccess,
            "auth" => WebhookEventKind::AuthFailure,
            "large_request_processing" => WebhookEventKind::LargeRequestProcessing,
            "large_request_sending" => WebhookEventKind::LargeRequestSending,
            other => match Category::from_event_type(other) {
                Some(category) => WebhookEventKind::Data(category),
                None => WebhookEventKind::Other,
            },
        }
    }

    pub fn terra_user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .map(|user| user.user_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct WidgetSessionRequest<'a> {
    pub providers: &'a str,
    pub language: &'a str,
    pub reference_id: &'a str,
    pub auth_success_redirect_url: &'a str,
    pub auth_failure_redirect_url: &'a str,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WidgetSession {
    pub url: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}
