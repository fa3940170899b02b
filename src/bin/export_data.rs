//! Dumps a sample of stored wearable links and AI interactions to
//! `exports/export.json`. Usage: `export-data [limit]` (default 3 per collection).

use std::path::Path;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;

use visionz_backend::config::settings::{get_config, StoreBackend};
use visionz_backend::db::Store;
use visionz_backend::telemetry::{get_subscriber, init_subscriber};

const DEFAULT_LIMIT: i64 = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config()?;
    init_subscriber(get_subscriber(
        "export-data".into(),
        config.application.log_level.clone(),
        std::io::stderr,
    ));

    let limit = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<i64>()?,
        None => DEFAULT_LIMIT,
    };

    let store = match config.database.backend {
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(10))
                .connect(config.database.connection_string().expose_secret())
                .await?;
            Store::postgres(pool)
        }
        StoreBackend::Memory => Store::in_memory(),
    };

    let links = store.wearables.list_links(limit).await?;
    let interactions = store.interactions.recent_interactions(limit).await?;
    tracing::info!(links = links.len(), interactions = interactions.len(), "Fetched records");

    let output_dir = Path::new("exports");
    std::fs::create_dir_all(output_dir)?;
    let output_path = output_dir.join("export.json");
    let snapshot = json!({
        "user_wearables": links,
        "ai_interactions": interactions,
    });
    std::fs::write(&output_path, serde_json::to_string_pretty(&snapshot)?)?;

    tracing::info!(path = %output_path.display(), "Data exported");
    Ok(())
}
