use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::db::Store;

/// Full stored record for one user, buckets kept keyed.
#[tracing::instrument(name = "Get wearable user data", skip(store))]
pub async fn get_user_data(
    reference_id: web::Path<String>,
    store: web::Data<Store>,
) -> HttpResponse {
    match store.wearables.find_by_reference(&reference_id).await {
        Ok(Some(link)) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "provider": link.provider,
                "lastSync": link.last_sync,
                "healthData": link.health_data,
                "pendingRequest": link.pending_request
            }
        })),
        Ok(None) => HttpResponse::NotFound().json(json!({
            "error": "User not found"
        })),
        Err(e) => {
            tracing::error!("Failed to fetch user data: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to fetch user data",
                "details": e.to_string()
            }))
        }
    }
}
