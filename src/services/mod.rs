pub mod llm_service;
pub mod terra_client;

pub use llm_service::LlmService;
pub use terra_client::{TerraClient, TerraError};
