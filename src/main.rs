use std::net::TcpListener;
use std::time::Duration;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

use visionz_backend::run;
use visionz_backend::config::settings::{get_config, StoreBackend};
use visionz_backend::db::Store;
use visionz_backend::services::{LlmService, TerraClient};
use visionz_backend::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Panic if we can't read the config
    let config = get_config().expect("Failed to read the config.");

    let subscriber = get_subscriber(
        "visionz-backend".into(),
        config.application.log_level.clone(),
        std::io::stdout
    );
    init_subscriber(subscriber);

    if let Err(e) = config.validate_credentials() {
        tracing::error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let store = match config.database.backend {
        StoreBackend::Postgres => {
            let connection_pool = PgPoolOptions::new()
                .max_connections(32)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
                .connect_lazy(
                    config.database.connection_string().expose_secret()
                )
                .expect("Failed to create Postgres connection pool");
            if let Err(e) = sqlx::migrate!("./migrations").run(&connection_pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
                std::process::exit(1);
            }
            tracing::info!("Database connected and migrated");
            Store::postgres(connection_pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Store::in_memory()
        }
    };

    let llm_service = LlmService::new(&config.llm).expect("Failed to create LLM client");
    let terra_client = TerraClient::new(&config.terra).expect("Failed to create Terra client");

    let address = format!("{}:{}", config.application.host, config.application.port);
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server is running on {}", address);

    run(
        listener,
        store,
        llm_service,
        terra_client,
        config.wearable_link_settings(),
        config.application.allowed_origins.clone(),
    )?.await
}
