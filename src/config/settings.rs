use std::env;
use config::{Config, File, ConfigError};
use dotenv::dotenv;
use secrecy::{ExposeSecret, SecretString};

use crate::config::llm::LlmSettings;
use crate::config::terra::{TerraSettings, WearableLinkSettings};

#[derive(serde::Deserialize, Debug)]
pub struct Settings{
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub llm: LlmSettings,
    pub terra: TerraSettings,
}

#[derive(serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Debug)]
pub struct DatabaseSettings{
    pub backend: StoreBackend,
    pub user: String,
    pub password: SecretString,
    pub port: u16,
    pub host: String,
    pub db_name: String,
    #[serde(default)]
    pub db_url: Option<SecretString>
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> SecretString {
        match &self.db_url {
            Some(db_url) => db_url.clone(),
            None => {
                SecretString::new(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    self.user, self.password.expose_secret(), self.host, self.port, self.db_name
                ).into_boxed_str())
            }
        }
    }

    /// Server URL without a database path, for administrative connections.
    pub fn connection_string_without_db(&self) -> SecretString {
        match &self.db_url {
            Some(db_url) => {
                let url = db_url.expose_secret();
                let without_query = url.split('?').next().unwrap_or(url);
                let server = match without_query.rsplit_once('/') {
                    Some((server, _)) if !server.ends_with('/') => server,
                    _ => without_query,
                };
                SecretString::new(server.to_string().into_boxed_str())
            }
            None => {
                SecretString::new(format!(
                    "postgres://{}:{}@{}:{}",
                    self.user, self.password.expose_secret(), self.host, self.port
                ).into_boxed_str())
            }
        }
    }
}

#[derive(serde::Deserialize, Debug)]
pub struct ApplicationSettings{
    pub port: u16,
    pub host: String,
    pub log_level: String,
    /// Where the device-connection callback sends the browser back to
    pub frontend_url: String,
    /// Externally reachable base URL of this server, used for aggregator redirects
    pub public_base_url: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

pub fn get_config() -> Result<Settings, ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| ConfigError::Message(format!("Failed to determine the current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    dotenv().ok();

    let environment: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let env_filename = format!("{}.yml", environment.as_str());
    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("base.yml")))
        .add_source(File::from(configuration_directory.join(env_filename)).required(false))
        .add_source(
            config::Environment::default()
                .prefix("APP")
                .prefix_separator("__")
                .separator("__")
        )
        .build()?;

    let mut settings = config.try_deserialize::<Settings>()?;

    // Hosted deployments expose these directly as env vars
    if let Ok(db_url) = env::var("DATABASE_URL") {
        settings.database.db_url = Some(SecretString::new(db_url.into_boxed_str()));
    }
    if let Ok(port) = env::var("PORT") {
        settings.application.port = port
            .parse()
            .map_err(|e| ConfigError::Message(format!("Invalid PORT '{}': {}", port, e)))?;
    }
    if let Ok(api_key) = env::var("OPENAI_API_KEY") {
        settings.llm.api_key = SecretString::new(api_key.into_boxed_str());
    }
    if let Ok(api_key) = env::var("TERRA_API_KEY") {
        settings.terra.api_key = SecretString::new(api_key.into_boxed_str());
    }
    if let Ok(dev_id) = env::var("TERRA_DEV_ID") {
        settings.terra.dev_id = dev_id;
    }
    if let Ok(secret) = env::var("TERRA_WEBHOOK_SECRET") {
        settings.terra.webhook_secret = Some(SecretString::new(secret.into_boxed_str()));
    }

    Ok(settings)
}

impl Settings {
    /// Checks the credentials the server cannot run without.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.llm.api_key.expose_secret().is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if self.terra.api_key.expose_secret().is_empty() {
            missing.push("TERRA_API_KEY");
        }
        if self.terra.dev_id.is_empty() {
            missing.push("TERRA_DEV_ID");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(format!(
                "Missing required credentials: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn wearable_link_settings(&self) -> WearableLinkSettings {
        let base = self.application.public_base_url.trim_end_matches('/');
        WearableLinkSettings {
            frontend_url: self.application.frontend_url.clone(),
            auth_success_redirect_url: format!("{}/api/wearable/callback", base),
            auth_failure_redirect_url: format!("{}/api/wearable/callback/error", base),
            webhook_secret: self.terra.webhook_secret.clone(),
        }
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. \
                Use either `local` or `production`.",
                other
            )),
        }
    }
}
