use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::wearable_error_response;
use crate::db::Store;
use crate::models::wearable::Category;
use crate::services::TerraClient;
use crate::wearable::historical;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataRequest {
    #[serde(default)]
    pub reference_id: Option<String>,
}

#[tracing::instrument(
    name = "Request historical data",
    skip(request, store, terra),
    fields(reference_id = ?request.reference_id)
)]
pub async fn request_historical_data(
    request: web::Json<HistoricalDataRequest>,
    store: web::Data<Store>,
    terra: web::Data<TerraClient>,
) -> HttpResponse {
    let reference_id = request.reference_id.as_deref().unwrap_or_default().trim();
    if reference_id.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "referenceId (email) is required"
        }));
    }

    match historical::initiate(store.wearables.as_ref(), &terra, reference_id, Utc::now()).await {
        Ok(batch) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Historical data request initiated",
            "reference": batch.reference,
            "failedDataTypes": batch.failed
        })),
        Err(e) => {
            tracing::error!("Historical data request error: {}", e);
            wearable_error_response(e, "Failed to request historical data")
        }
    }
}

/// Stored buckets flattened to payload lists, used by the connect page's polling loop.
#[tracing::instrument(name = "Get stored historical data", skip(store))]
pub async fn get_historical_data(
    reference_id: web::Path<String>,
    store: web::Data<Store>,
) -> HttpResponse {
    let link = match store.wearables.find_by_reference(&reference_id).await {
        Ok(Some(link)) => link,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({
                "error": "User not found"
            }))
        }
        Err(e) => {
            tracing::error!("Error fetching historical data: {}", e);
            return HttpResponse::InternalServerError().json(json!({
                "error": e.to_string()
            }));
        }
    };

    let health_data = &link.health_data;
    let has_data = !health_data.is_empty();
    tracing::info!(
        activity_count = health_data.activity.len(),
        daily_count = health_data.daily.len(),
        sleep_count = health_data.sleep.len(),
        body_count = health_data.body.len(),
        has_data,
        "Found health data"
    );

    HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "activity": health_data.payloads(Category::Activity),
            "daily": health_data.payloads(Category::Daily),
            "sleep": health_data.payloads(Category::Sleep),
            "body": health_data.payloads(Category::Body)
        },
        "hasData": has_data,
        "user": {
            "terraUserId": link.terra_user_id,
            "provider": link.provider,
            "lastSync": link.last_sync
        }
    }))
}
