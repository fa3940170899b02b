pub mod settings;
pub mod llm;
pub mod terra;
