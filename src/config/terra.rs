use serde::Deserialize;
use secrecy::SecretString;

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Debug, Clone)]
pub struct TerraSettings {
    pub base_url: String,
    pub dev_id: String,
    pub api_key: SecretString,
    /// Signing secret for webhook deliveries. Signatures are only checked when set.
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Redirect targets and webhook settings used by the device-linking routes.
#[derive(Debug, Clone)]
pub struct WearableLinkSettings {
    pub frontend_url: String,
    pub auth_success_redirect_url: String,
    pub auth_failure_redirect_url: String,
    pub webhook_secret: Option<SecretString>,
}
