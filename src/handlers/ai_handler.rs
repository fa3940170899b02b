use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::db::Store;
use crate::models::ai_interaction::{
    AIInteraction, ChatRequest, GenerateRequest, NewInteraction, DEFAULT_HISTORY_LIMIT,
};
use crate::models::llm::LlmError;
use crate::services::LlmService;

enum ProxyError {
    Llm(LlmError),
    Persistence(String),
}

fn llm_error_response(error: &LlmError) -> HttpResponse {
    match error {
        LlmError::InvalidApiKey(details) => HttpResponse::Unauthorized().json(json!({
            "error": "Invalid API key",
            "details": details
        })),
        LlmError::QuotaExceeded(details) => HttpResponse::TooManyRequests().json(json!({
            "error": "API quota exceeded",
            "details": details
        })),
        other => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to generate AI response",
            "details": other.to_string()
        })),
    }
}

impl ProxyError {
    fn into_response(self) -> HttpResponse {
        match self {
            ProxyError::Llm(e) => llm_error_response(&e),
            ProxyError::Persistence(details) => HttpResponse::InternalServerError().json(json!({
                "error": "Failed to generate AI response",
                "details": details
            })),
        }
    }
}

/// Sends `prompt` upstream and stores the exchange.
async fn complete_and_record(
    store: &Store,
    llm: &LlmService,
    prompt: String,
) -> Result<AIInteraction, ProxyError> {
    let response = llm.complete(&prompt).await.map_err(|e| {
        tracing::error!("AI generation error: {}", e);
        ProxyError::Llm(e)
    })?;

    store
        .interactions
        .record_interaction(NewInteraction {
            prompt,
            response,
            model: llm.model().to_string(),
        })
        .await
        .map_err(|e| {
            tracing::error!("Failed to store AI interaction: {}", e);
            ProxyError::Persistence(e.to_string())
        })
}

#[tracing::instrument(
    name = "Generate AI response",
    skip(request, store, llm),
    fields(prompt_len = %request.prompt().len())
)]
pub async fn generate(
    request: web::Json<GenerateRequest>,
    store: web::Data<Store>,
    llm: web::Data<LlmService>,
) -> HttpResponse {
    let prompt = request.into_inner().prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Prompt is required"
        }));
    }

    match complete_and_record(&store, &llm, prompt).await {
        Ok(interaction) => {
            tracing::info!(interaction_id = %interaction.id, "AI response generated");
            HttpResponse::Ok().json(json!({
                "success": true,
                "data": {
                    "response": interaction.response,
                    "interactionId": interaction.id
                }
            }))
        }
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(
    name = "Answer chat question",
    skip(request, store, llm),
    fields(context_len = %request.context().len())
)]
pub async fn chat(
    request: web::Json<ChatRequest>,
    store: web::Data<Store>,
    llm: web::Data<LlmService>,
) -> HttpResponse {
    if request.question().trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "error": "Question is required"
        }));
    }

    match complete_and_record(&store, &llm, request.to_prompt()).await {
        Ok(interaction) => HttpResponse::Ok().json(json!({
            "success": true,
            "response": interaction.response,
            "interactionId": interaction.id
        })),
        Err(e) => e.into_response(),
    }
}

#[tracing::instrument(name = "Fetch AI history", skip(store))]
pub async fn history(store: web::Data<Store>) -> HttpResponse {
    match store.interactions.recent_interactions(DEFAULT_HISTORY_LIMIT).await {
        Ok(interactions) => HttpResponse::Ok().json(json!({
            "success": true,
            "data": interactions
        })),
        Err(e) => {
            tracing::error!("History fetch error: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Failed to fetch AI interaction history",
                "details": e.to_string()
            }))
        }
    }
}
