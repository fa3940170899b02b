use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::json;

use super::wearable_error_response;
use crate::config::terra::WearableLinkSettings;
use crate::db::Store;
use crate::models::terra::TerraWebhookEvent;
use crate::services::TerraClient;
use crate::wearable::{ingest, signature};

fn header_value<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|value| value.to_str().ok())
}

/// Receives aggregator deliveries. The raw body is kept for signature checks.
#[tracing::instrument(
    name = "Terra webhook",
    skip(req, body, store, terra, link_settings),
    fields(terra_reference = tracing::field::Empty)
)]
pub async fn receive_webhook(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<Store>,
    terra: web::Data<TerraClient>,
    link_settings: web::Data<WearableLinkSettings>,
) -> HttpResponse {
    let terra_reference = header_value(&req, "terra-reference");
    let terra_signature = header_value(&req, "terra-signature");
    if let Some(reference) = terra_reference {
        tracing::Span::current().record("terra_reference", reference);
    }

    if let Some(secret) = &link_settings.webhook_secret {
        let valid = terra_signature
            .map(|header| signature::verify(secret.expose_secret(), header, &body))
            .unwrap_or(false);
        if !valid {
            tracing::warn!("Rejecting webhook with an invalid signature");
            return HttpResponse::Unauthorized().json(json!({
                "error": "Invalid webhook signature"
            }));
        }
    } else {
        tracing::debug!(signature = ?terra_signature, "Webhook signature not verified");
    }

    let event: TerraWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Malformed webhook payload: {}", e);
            return HttpResponse::BadRequest().json(json!({
                "error": "Invalid webhook payload",
                "details": e.to_string()
            }));
        }
    };

    match ingest::process_event(store.wearables.as_ref(), &terra, &event, Utc::now()).await {
        Ok(outcome) => {
            tracing::debug!(?outcome, "Webhook processed");
            HttpResponse::Ok().json(json!({ "success": true }))
        }
        Err(e) => {
            tracing::error!("Terra webhook error: {}", e);
            wearable_error_response(e, "Webhook processing failed")
        }
    }
}
