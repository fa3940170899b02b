use std::collections::HashMap;

use actix_web::{get, post, web, HttpRequest, HttpResponse};

use crate::config::terra::WearableLinkSettings;
use crate::db::Store;
use crate::handlers::wearable::{
    auth_url::{generate_auth_url, AuthUrlQuery},
    callback::{auth_callback, auth_callback_error},
    connection_test::test_connection as terra_connection_test,
    historical_data::{get_historical_data, request_historical_data, HistoricalDataRequest},
    user_data::get_user_data,
    webhook::receive_webhook,
};
use crate::services::TerraClient;

#[get("/auth/{provider}")]
pub async fn auth_url(
    provider: web::Path<String>,
    query: web::Query<AuthUrlQuery>,
    terra: web::Data<TerraClient>,
    link_settings: web::Data<WearableLinkSettings>,
) -> HttpResponse {
    generate_auth_url(provider, query, terra, link_settings).await
}

#[get("/callback")]
pub async fn callback(
    query: web::Query<HashMap<String, String>>,
    store: web::Data<Store>,
    link_settings: web::Data<WearableLinkSettings>,
) -> HttpResponse {
    auth_callback(query, store, link_settings).await
}

#[get("/callback/error")]
pub async fn callback_error(query: web::Query<HashMap<String, String>>) -> HttpResponse {
    auth_callback_error(query).await
}

#[post("/webhook")]
pub async fn webhook(
    req: HttpRequest,
    body: web::Bytes,
    store: web::Data<Store>,
    terra: web::Data<TerraClient>,
    link_settings: web::Data<WearableLinkSettings>,
) -> HttpResponse {
    receive_webhook(req, body, store, terra, link_settings).await
}

#[post("/historical-data")]
pub async fn request_historical(
    request: web::Json<HistoricalDataRequest>,
    store: web::Data<Store>,
    terra: web::Data<TerraClient>,
) -> HttpResponse {
    request_historical_data(request, store, terra).await
}

#[get("/historical-data/{reference_id}")]
pub async fn get_historical(
    reference_id: web::Path<String>,
    store: web::Data<Store>,
) -> HttpResponse {
    get_historical_data(reference_id, store).await
}

#[get("/data/{reference_id}")]
pub async fn user_data(
    reference_id: web::Path<String>,
    store: web::Data<Store>,
) -> HttpResponse {
    get_user_data(reference_id, store).await
}

#[get("/test/connection")]
pub async fn test_connection(terra: web::Data<TerraClient>) -> HttpResponse {
    terra_connection_test(terra).await
}
