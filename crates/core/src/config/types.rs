use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub analyzer: AnalyzerConfig,
    pub image: ImageConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("toonmill.db")
}

/// Content analyzer (validation and scenario generation)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    pub api_key: String,
    #[serde(default = "default_analyzer_model")]
    pub model: String,
    /// Overrides the public Gemini endpoint (proxies, tests)
    #[serde(default)]
    pub api_base: Option<String>,
    /// Per-request timeout in seconds (default: 120)
    #[serde(default = "default_analyzer_timeout")]
    pub timeout_secs: u64,
    /// Sampling temperature for scenario generation (default: 0.7)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_analyzer_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_analyzer_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.7
}

/// Image generator
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageConfig {
    pub api_key: String,
    #[serde(default = "default_image_model")]
    pub model: String,
    /// Faster model for the character sheet; `model` when unset
    #[serde(default)]
    pub sheet_model: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Per-request timeout in seconds (default: 180)
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_image_timeout() -> u64 {
    180
}

/// Artifact storage
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding generated images
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// Prefix of returned URLs. A path (e.g. "/artifacts") is also served
    /// by the server itself.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_public_base_url() -> String {
    "/artifacts".to_string()
}

/// Operator notifications; absent transports are disabled
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub analyzer: SanitizedAnalyzerConfig,
    pub image: SanitizedImageConfig,
    pub storage: StorageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<SanitizedTelegramConfig>,
    pub orchestrator: OrchestratorConfig,
}

/// Sanitized analyzer config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAnalyzerConfig {
    pub model: String,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
    pub temperature: f32,
}

/// Sanitized image config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedImageConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_model: Option<String>,
    pub api_key_configured: bool,
    pub timeout_secs: u64,
}

/// Sanitized Telegram config (bot token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub chat_id: String,
    pub bot_token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            analyzer: SanitizedAnalyzerConfig {
                model: config.analyzer.model.clone(),
                api_key_configured: !config.analyzer.api_key.is_empty(),
                timeout_secs: config.analyzer.timeout_secs,
                temperature: config.analyzer.temperature,
            },
            image: SanitizedImageConfig {
                model: config.image.model.clone(),
                sheet_model: config.image.sheet_model.clone(),
                api_key_configured: !config.image.api_key.is_empty(),
                timeout_secs: config.image.timeout_secs,
            },
            storage: config.storage.clone(),
            telegram: config
                .notifier
                .telegram
                .as_ref()
                .map(|t| SanitizedTelegramConfig {
                    chat_id: t.chat_id.clone(),
                    bot_token_configured: !t.bot_token.is_empty(),
                }),
            orchestrator: config.orchestrator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[analyzer]
api_key = "analyzer-key"

[image]
api_key = "image-key"
"#;

    #[test]
    fn test_deserialize_minimal_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "toonmill.db");
        assert_eq!(config.analyzer.model, "gemini-2.5-flash");
        assert_eq!(config.analyzer.timeout_secs, 120);
        assert_eq!(config.image.model, "gemini-2.5-flash-image");
        assert!(config.image.sheet_model.is_none());
        assert_eq!(config.storage.public_base_url, "/artifacts");
        assert!(config.notifier.telegram.is_none());
        assert_eq!(config.orchestrator.max_input_chars, 30_000);
        assert_eq!(config.orchestrator.retry.max_attempts, 3);
    }

    #[test]
    fn test_deserialize_missing_analyzer_fails() {
        let toml = r#"
[image]
api_key = "image-key"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/toonmill.sqlite"

[analyzer]
api_key = "analyzer-key"
model = "gemini-2.5-pro"
api_base = "http://localhost:9999"
temperature = 0.4

[image]
api_key = "image-key"
sheet_model = "gemini-fast-image"
timeout_secs = 60

[storage]
root = "/srv/toonmill"
public_base_url = "https://cdn.example.com/toonmill"

[notifier.telegram]
bot_token = "123:abc"
chat_id = "-100200"

[orchestrator]
max_attachments = 5

[orchestrator.retry]
max_attempts = 4
backoff = "exponential"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.analyzer.model, "gemini-2.5-pro");
        assert_eq!(config.analyzer.api_base.as_deref(), Some("http://localhost:9999"));
        assert_eq!(config.image.sheet_model.as_deref(), Some("gemini-fast-image"));
        assert_eq!(config.image.timeout_secs, 60);
        assert_eq!(config.storage.root.to_str().unwrap(), "/srv/toonmill");
        assert_eq!(config.notifier.telegram.as_ref().unwrap().chat_id, "-100200");
        assert_eq!(config.orchestrator.max_attachments, 5);
        assert_eq!(config.orchestrator.retry.max_attempts, 4);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.notifier.telegram = Some(TelegramConfig {
            bot_token: "123:secret".to_string(),
            chat_id: "42".to_string(),
            api_base: None,
        });

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.analyzer.api_key_configured);
        assert!(sanitized.image.api_key_configured);
        assert!(sanitized.telegram.as_ref().unwrap().bot_token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("analyzer-key"));
        assert!(!json.contains("image-key"));
        assert!(!json.contains("123:secret"));
    }
}
