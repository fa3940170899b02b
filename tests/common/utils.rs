use std::net::TcpListener;

use once_cell::sync::Lazy;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;
use wiremock::MockServer;

use visionz_backend::config::settings::{get_config, DatabaseSettings, Settings};
use visionz_backend::db::Store;
use visionz_backend::run;
use visionz_backend::services::{LlmService, TerraClient};
use visionz_backend::telemetry::{get_subscriber, init_subscriber};

pub const TEST_OPENAI_KEY: &str = "sk-test-key";
pub const TEST_TERRA_KEY: &str = "terra-test-key";
pub const TEST_TERRA_DEV_ID: &str = "visionz-test-dev";
pub const TEST_MODEL: &str = "gpt-4-turbo-preview";

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::stdout
        );
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::sink
        );
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub store: Store,
    pub llm_server: MockServer,
    pub terra_server: MockServer,
    pub api_client: Client,
}

fn secret(value: &str) -> SecretString {
    SecretString::new(value.to_string().into_boxed_str())
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Starts the server on a random port with the in-memory store and both
/// upstream services replaced by mock servers.
pub async fn spawn_app_with<F>(customise: F) -> TestApp
where
    F: FnOnce(&mut Settings),
{
    spawn(customise, false).await
}

/// Same as `spawn_app`, backed by a freshly migrated Postgres database.
pub async fn spawn_app_on_postgres() -> TestApp {
    spawn(|_| {}, true).await
}

async fn spawn<F>(customise: F, postgres: bool) -> TestApp
where
    F: FnOnce(&mut Settings),
{
    // The first time `initialize` is invoked the code in `TRACING` is executed.
    // All other invocations will instead skip execution.
    Lazy::force(&TRACING);

    let llm_server = MockServer::start().await;
    let terra_server = MockServer::start().await;

    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    // Get port assigned by the OS
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_config().expect("Failed to read configuration.");
    configuration.application.public_base_url = address.clone();
    configuration.llm.base_url = llm_server.uri();
    configuration.llm.api_key = secret(TEST_OPENAI_KEY);
    configuration.llm.model = TEST_MODEL.to_string();
    configuration.terra.base_url = terra_server.uri();
    configuration.terra.api_key = secret(TEST_TERRA_KEY);
    configuration.terra.dev_id = TEST_TERRA_DEV_ID.to_string();
    configuration.terra.webhook_secret = None;
    customise(&mut configuration);

    let store = if postgres {
        Store::postgres(configure_db(&mut configuration.database).await)
    } else {
        Store::in_memory()
    };
    let llm_service = LlmService::new(&configuration.llm).expect("Failed to build LLM client");
    let terra_client = TerraClient::new(&configuration.terra).expect("Failed to build Terra client");

    let server = run(
        listener,
        store.clone(),
        llm_service,
        terra_client,
        configuration.wearable_link_settings(),
        configuration.application.allowed_origins.clone(),
    )
        .expect("Failed to bind address");
    // Launch the server as a background task
    // tokio::spawn returns a handle to the spawned future,
    // but we have no use for it here, hence the non-binding let
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        llm_server,
        terra_server,
        api_client: Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client"),
    }
}

/// Creates a uniquely named database, points `config` at it and runs the migrations.
pub async fn configure_db(config: &mut DatabaseSettings) -> PgPool {
    config.db_name = Uuid::new_v4().to_string();
    let server = config.connection_string_without_db();

    // Create database
    let mut connection = PgConnection::connect(server.expose_secret())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.db_name).as_str())
        .await
        .expect("Failed to create database.");
    config.db_url = Some(secret(&format!("{}/{}", server.expose_secret(), config.db_name)));

    // Migrate database
    let connection_pool = PgPool::connect(config.connection_string().expose_secret())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database");

    connection_pool
}

/// Repository handle over a fresh database, for store-level tests.
pub async fn postgres_store() -> Store {
    let mut configuration = get_config().expect("Failed to read configuration.");
    Store::postgres(configure_db(&mut configuration.database).await)
}

impl TestApp {
    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Sends `body` verbatim as a JSON request, for bodies `serde_json` would refuse to build.
    pub async fn post_raw_json(&self, path: &str, body: &str) -> reqwest::Response {
        self.api_client
            .post(&format!("{}{}", self.address, path))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_webhook(&self, event: &Value) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/wearable/webhook", self.address))
            .header("terra-reference", Uuid::new_v4().to_string())
            .json(event)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_historical(&self, reference_id: &str) -> reqwest::Response {
        self.get(&format!("/api/wearable/historical-data/{}", reference_id)).await
    }
}

/// OpenAI-style completion body.
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
