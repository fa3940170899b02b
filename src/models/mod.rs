pub mod ai_interaction;
pub mod llm;
pub mod terra;
pub mod wearable;
