pub mod ai_handler;
pub mod backend_health_handler;
pub mod wearable;
