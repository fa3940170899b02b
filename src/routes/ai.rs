use actix_web::{get, post, web, HttpResponse};

use crate::db::Store;
use crate::handlers::ai_handler;
use crate::models::ai_interaction::{ChatRequest, GenerateRequest};
use crate::services::LlmService;

#[post("/generate")]
pub async fn generate(
    request: web::Json<GenerateRequest>,
    store: web::Data<Store>,
    llm: web::Data<LlmService>,
) -> HttpResponse {
    ai_handler::generate(request, store, llm).await
}

#[post("/chat")]
pub async fn chat(
    request: web::Json<ChatRequest>,
    store: web::Data<Store>,
    llm: web::Data<LlmService>,
) -> HttpResponse {
    ai_handler::chat(request, store, llm).await
}

#[get("/history")]
pub async fn history(store: web::Data<Store>) -> HttpResponse {
    ai_handler::history(store).await
}
