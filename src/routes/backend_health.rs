use actix_web::{get, Responder};

use crate::handlers::backend_health_handler::{api_health_check, backend_health_check};

#[get("/backend_health")]
pub async fn backend_health() -> impl Responder {
    backend_health_check().await
}

#[get("/api/health")]
pub async fn api_health() -> impl Responder {
    api_health_check().await
}
