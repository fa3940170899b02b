use actix_web::{error, http, web, App, HttpRequest, HttpResponse, HttpServer};
use actix_web::dev::Server;
use serde_json::json;
use tracing_actix_web::TracingLogger;
use std::net::TcpListener;
use actix_cors::Cors;

pub mod config;
mod routes;
mod handlers;
pub mod models;
pub mod db;
pub mod services;
pub mod telemetry;
pub mod wearable;

use crate::config::terra::WearableLinkSettings;
use crate::db::Store;
use crate::routes::init_routes;
use crate::services::{LlmService, TerraClient};

/// Aggregator chunks can be several megabytes.
const MAX_PAYLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Rejected JSON bodies get the same `{ error, details }` shape as handler errors.
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    tracing::warn!("Rejecting request body: {}", err);
    let response = HttpResponse::BadRequest().json(json!({
        "error": "Invalid request body",
        "details": err.to_string()
    }));
    error::InternalError::from_response(err, response).into()
}

pub fn run(
    listener: TcpListener,
    store: Store,
    llm_service: LlmService,
    terra_client: TerraClient,
    link_settings: WearableLinkSettings,
    allowed_origins: Vec<String>,
) -> Result<Server, std::io::Error> {
    // Wrap using web::Data, which boils down to an Arc smart pointer
    let store = web::Data::new(store);
    let llm_service = web::Data::new(llm_service);
    let terra_client = web::Data::new(terra_client);
    let link_settings = web::Data::new(link_settings);

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                http::header::ACCEPT,
                http::header::CONTENT_TYPE,
            ])
            .max_age(3600);
        for origin in &allowed_origins {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(TracingLogger::default())
            .wrap(cors)
            .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
            .app_data(
                web::JsonConfig::default()
                    .limit(MAX_PAYLOAD_BYTES)
                    .error_handler(json_error_handler),
            )
            // Get a pointer copy and attach it to the application state
            .app_data(store.clone())
            .app_data(llm_service.clone())
            .app_data(terra_client.clone())
            .app_data(link_settings.clone())
            .configure(init_routes)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
