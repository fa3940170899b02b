use std::collections::HashMap;

use actix_web::{http::header, web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::config::terra::WearableLinkSettings;
use crate::db::Store;
use crate::models::wearable::Provider;

/// Browser redirect target after the aggregator widget finishes.
#[tracing::instrument(name = "Terra auth callback", skip(query, store, link_settings))]
pub async fn auth_callback(
    query: web::Query<HashMap<String, String>>,
    store: web::Data<Store>,
    link_settings: web::Data<WearableLinkSettings>,
) -> HttpResponse {
    let terra_user_id = query.get("user_id").filter(|id| !id.is_empty());
    let reference_id = query.get("reference_id").filter(|id| !id.is_empty());

    let (Some(terra_user_id), Some(reference_id)) = (terra_user_id, reference_id) else {
        tracing::warn!(query = ?query.0, "Terra callback without a linked user");
        return HttpResponse::BadRequest().json(json!({
            "error": "Authentication failed",
            "details": query.0
        }));
    };
    let provider = query
        .get("resource")
        .map(|resource| Provider::parse(resource))
        .unwrap_or(Provider::Other);

    match store
        .wearables
        .link_from_callback(reference_id, terra_user_id, provider, Utc::now())
        .await
    {
        Ok(()) => {
            tracing::info!(%reference_id, %terra_user_id, %provider, "Wearable linked from callback");
            HttpResponse::Found()
                .insert_header((header::LOCATION, link_settings.frontend_url.as_str()))
                .finish()
        }
        Err(e) => {
            tracing::error!("Terra callback error: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Authentication failed",
                "details": e.to_string()
            }))
        }
    }
}

pub async fn auth_callback_error(query: web::Query<HashMap<String, String>>) -> HttpResponse {
    tracing::warn!(query = ?query.0, "Terra reported a failed device authentication");
    HttpResponse::BadRequest().json(json!({
        "error": "Authentication failed",
        "details": query.0
    }))
}
