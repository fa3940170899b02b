use actix_web::HttpResponse;
use serde_json::json;

use crate::wearable::WearableError;

pub mod auth_url;
pub mod callback;
pub mod historical_data;
pub mod user_data;
pub mod webhook;

/// Client errors keep their own message; everything else becomes `failure` plus details.
fn wearable_error_response(error: WearableError, failure: &str) -> HttpResponse {
    match error {
        WearableError::Validation(message) => HttpResponse::BadRequest().json(json!({
            "error": message
        })),
        WearableError::NotFound(message) => HttpResponse::NotFound().json(json!({
            "error": message
        })),
        other => HttpResponse::InternalServerError().json(json!({
            "error": failure,
            "details": other.to_string()
        })),
    }
}
