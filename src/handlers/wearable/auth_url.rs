use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::config::terra::WearableLinkSettings;
use crate::models::terra::WidgetSessionRequest;
use crate::models::wearable::Provider;
use crate::services::TerraClient;

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    pub user_id: Option<String>,
}

#[tracing::instrument(name = "Generate wearable auth URL", skip(query, terra, link_settings))]
pub async fn generate_auth_url(
    provider: web::Path<String>,
    query: web::Query<AuthUrlQuery>,
    terra: web::Data<TerraClient>,
    link_settings: web::Data<WearableLinkSettings>,
) -> HttpResponse {
    let Some(reference_id) = query.user_id.as_deref().filter(|id| !id.trim().is_empty()) else {
        return HttpResponse::BadRequest().json(json!({
            "error": "user_id query parameter is required"
        }));
    };
    let provider = Provider::parse(&provider);

    let request = WidgetSessionRequest {
        providers: provider.as_str(),
        language: "en",
        reference_id,
        auth_success_redirect_url: &link_settings.auth_success_redirect_url,
        auth_failure_redirect_url: &link_settings.auth_failure_redirect_url,
    };

    match terra.generate_widget_session(&request).await {
        Ok(session) => {
            tracing::info!(reference_id, %provider, "Widget session created");
            HttpResponse::Ok().json(json!({
                "success": true,
                "widget_url": session.url,
                "session_id": session.session_id,
                "expires_in": session.expires_in,
                "reference_id": reference_id
            }))
        }
        Err(e) => {
            tracing::error!("Auth URL generation error: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to generate auth URL",
                "details": e.to_string()
            }))
        }
    }
}
