use config::{Config, ConfigError};
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path, path::PathBuf, result::Result};

#[derive(Debug, Deserialize)]
pub struct GmailConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
    pub scopes: Vec<String>,
}

impl GmailConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        builder.try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Address mail is sent from; must match the authorized account
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Default cap on messages fetched per batch run
    pub max_emails: u32,
    /// Default mail search query, empty for none
    pub query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesConfig {
    /// Directory holding optional per-extractor rule files
    pub dir: String,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    account: AccountConfig,
    api: ApiConfig,
    model: ModelConfig,
    batch: BatchConfig,
    rules: RulesConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub gmail_config: GmailConfig,
    pub account: AccountConfig,
    pub api: ApiConfig,
    pub model: ModelConfig,
    pub batch: BatchConfig,
    pub rules: RulesConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\nModel: {:?}\n\nBatch: {:?}\n\nRules: {:?}",
            self.model, self.batch, self.rules,
        )
    }
}

fn config_root() -> String {
    env::var("APP_DIR").unwrap_or_else(|_| {
        let dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
        let dir = Path::new(&dir).parent().unwrap().display().to_string();
        format!("{}/config", dir)
    })
}

/// Location of the stored OAuth token, overridable for deployments
pub fn token_path() -> PathBuf {
    if let Ok(path) = env::var("TOKEN_PATH") {
        return PathBuf::from(path);
    }
    PathBuf::from(config_root()).join("token.json")
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let root = config_root();
        let path = format!("{root}/client_secret.toml");
        let gmail_config = GmailConfig::from_file(&path).expect("client_secret.toml is required");

        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            account,
            mut api,
            model,
            batch,
            rules,
        } = cfg_file;

        if let Ok(key) = env::var("GENAI_API_KEY") {
            api.key = key;
        }

        ServerConfig {
            gmail_config,
            account,
            api,
            model,
            batch,
            rules,
        }
    };
}
