use serde::Deserialize;
use secrecy::SecretString;

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Deserialize, Debug, Clone)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}
