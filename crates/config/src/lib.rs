//! Configuration loading, validation, and the startup self-check for
//! larkbridge.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. The env variable names match what deployments of the bot
//! have historically used (`APPID`, `SECRET`, `BOTNAME`, `KEY`, `MODEL`,
//! `MAX_TOKEN`), so existing setups keep working.
//!
//! The self-check (`AppConfig::self_check`) replaces ad-hoc credential
//! probing scattered through request handling: the config is injected once
//! at startup and validated once, and the same report is served on `GET /`
//! and by `larkbridge doctor`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Messaging platform credentials.
    #[serde(default)]
    pub feishu: FeishuConfig,

    /// Completion API settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// HTTP server and storage settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Messaging platform (Feishu/Lark) application credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct FeishuConfig {
    /// Application id; platform-issued ids start with `cli_`.
    #[serde(default)]
    pub app_id: String,

    /// Application secret.
    #[serde(default)]
    pub app_secret: String,

    /// The bot's display name; group messages must mention this name.
    #[serde(default)]
    pub bot_name: String,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            bot_name: String::new(),
        }
    }
}

impl std::fmt::Debug for FeishuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeishuConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("bot_name", &self.bot_name)
            .finish()
    }
}

/// Completion API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key; issued keys start with `sk-`.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the completions API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model name for the completions endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per completion. This value also serves as the
    /// per-session history budget: the eviction policy trims stored turns
    /// once their cumulative character count exceeds it.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "text-davinci-003".into()
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_api_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// HTTP server and storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path. `sqlite::memory:` gives an ephemeral store.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9000
}
fn default_db_path() -> String {
    "data.db".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("feishu", &self.feishu)
            .field("openai", &self.openai)
            .field("server", &self.server)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from `config.toml` in the working directory,
    /// then apply environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(Path::new("config.toml"))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path. A missing file yields
    /// defaults (everything can come from the environment).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Environment variables take priority over the config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("APPID") {
            self.feishu.app_id = v;
        }
        if let Ok(v) = std::env::var("SECRET") {
            self.feishu.app_secret = v;
        }
        if let Ok(v) = std::env::var("BOTNAME") {
            self.feishu.bot_name = v;
        }
        if let Ok(v) = std::env::var("KEY") {
            self.openai.api_key = v;
        }
        if let Ok(v) = std::env::var("MODEL") {
            self.openai.model = v;
        }
        if let Ok(v) = std::env::var("MAX_TOKEN")
            && let Ok(n) = v.parse::<u32>()
        {
            self.openai.max_tokens = n;
        }
    }

    /// Structural validation, separate from the credential self-check.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.openai.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "openai.max_tokens must be greater than zero".into(),
            ));
        }
        if self.server.db_path.is_empty() {
            return Err(ConfigError::ValidationError(
                "server.db_path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Run the credential self-check and produce a bilingual report.
    ///
    /// Checks run in a fixed order and the first failure wins, matching the
    /// behavior operators are used to when bootstrapping a deployment.
    pub fn self_check(&self) -> SelfCheck {
        if self.feishu.app_id.is_empty() {
            return SelfCheck::failure(
                "你没有配置飞书应用的 AppID，请检查 & 部署后重试",
                "Feishu App ID is missing, please check & re-deploy & call again",
            );
        }
        if !self.feishu.app_id.starts_with("cli_") {
            return SelfCheck::failure(
                "你配置的飞书应用的 AppID 是错误的，请检查后重试。飞书应用的 AppID 以 cli_ 开头。",
                "Feishu App ID is wrong, please check and call again. A Feishu App ID starts with cli_",
            );
        }
        if self.feishu.app_secret.is_empty() {
            return SelfCheck::failure(
                "你没有配置飞书应用的 Secret，请检查 & 部署后重试",
                "Feishu App Secret is missing, please check & re-deploy & call again",
            );
        }
        if self.feishu.bot_name.is_empty() {
            return SelfCheck::failure(
                "你没有配置飞书应用的名称，请检查 & 部署后重试",
                "Feishu bot name is missing, please check & re-deploy & call again",
            );
        }
        if self.openai.api_key.is_empty() {
            return SelfCheck::failure(
                "你没有配置 OpenAI 的 Key，请检查 & 部署后重试",
                "OpenAI key is missing, please check & re-deploy & call again",
            );
        }
        if !self.openai.api_key.starts_with("sk-") {
            return SelfCheck::failure(
                "你配置的 OpenAI Key 是错误的，请检查后重试。OpenAI 的 Key 以 sk- 开头。",
                "OpenAI key is wrong, please check and call again. An OpenAI key starts with sk-",
            );
        }

        SelfCheck {
            code: 0,
            message: BilingualMessage {
                zh_cn: "✅ 配置成功，接下来你可以在飞书应用当中使用机器人来完成你的工作。".into(),
                en_us: "✅ Configuration is correct, you can use this bot in your Feishu app".into(),
            },
            meta: Some(SelfCheckMeta {
                app_id: self.feishu.app_id.clone(),
                model: self.openai.model.clone(),
                max_tokens: self.openai.max_tokens,
                bot_name: self.feishu.bot_name.clone(),
            }),
        }
    }
}

/// Result of the configuration self-check, serialized on `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCheck {
    /// 0 = healthy, 1 = misconfigured.
    pub code: u8,
    pub message: BilingualMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<SelfCheckMeta>,
}

impl SelfCheck {
    fn failure(zh_cn: &str, en_us: &str) -> Self {
        Self {
            code: 1,
            message: BilingualMessage {
                zh_cn: zh_cn.into(),
                en_us: en_us.into(),
            },
            meta: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Operator-facing message in both languages the bot serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilingualMessage {
    pub zh_cn: String,
    pub en_us: String,
}

/// Non-secret settings echoed back on a successful self-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfCheckMeta {
    pub app_id: String,
    pub model: String,
    pub max_tokens: u32,
    pub bot_name: String,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            feishu: FeishuConfig {
                app_id: "cli_a1b2c3".into(),
                app_secret: "shhh".into(),
                bot_name: "chatbot".into(),
            },
            openai: OpenAiConfig {
                api_key: "sk-test".into(),
                ..OpenAiConfig::default()
            },
            server: ServerConfig::default(),
        }
    }

    #[test]
    fn default_config_has_expected_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.openai.max_tokens, 1024);
        assert_eq!(config.openai.model, "text-davinci-003");
        assert!(config.openai.api_url.contains("api.openai.com"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = valid_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.feishu.app_id, "cli_a1b2c3");
        assert_eq!(parsed.server.port, config.server.port);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().server.port, 9000);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let mut config = valid_config();
        config.openai.max_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn self_check_passes_on_valid_config() {
        let report = valid_config().self_check();
        assert!(report.is_ok());
        let meta = report.meta.unwrap();
        assert_eq!(meta.app_id, "cli_a1b2c3");
        assert_eq!(meta.bot_name, "chatbot");
    }

    #[test]
    fn self_check_missing_app_id() {
        let mut config = valid_config();
        config.feishu.app_id.clear();
        let report = config.self_check();
        assert_eq!(report.code, 1);
        assert!(report.message.en_us.contains("App ID is missing"));
        assert!(report.meta.is_none());
    }

    #[test]
    fn self_check_wrong_app_id_prefix() {
        let mut config = valid_config();
        config.feishu.app_id = "app_123".into();
        let report = config.self_check();
        assert_eq!(report.code, 1);
        assert!(report.message.en_us.contains("starts with cli_"));
    }

    #[test]
    fn self_check_missing_secret() {
        let mut config = valid_config();
        config.feishu.app_secret.clear();
        assert_eq!(config.self_check().code, 1);
    }

    #[test]
    fn self_check_missing_bot_name() {
        let mut config = valid_config();
        config.feishu.bot_name.clear();
        let report = config.self_check();
        assert_eq!(report.code, 1);
        assert!(report.message.en_us.contains("bot name"));
    }

    #[test]
    fn self_check_wrong_key_prefix() {
        let mut config = valid_config();
        config.openai.api_key = "pk-wrong".into();
        let report = config.self_check();
        assert_eq!(report.code, 1);
        assert!(report.message.en_us.contains("sk-"));
    }

    #[test]
    fn secrets_redacted_in_debug() {
        let config = valid_config();
        let debug = format!("{config:?}");
        assert!(!debug.contains("shhh"));
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[feishu]
app_id = "cli_xyz"
app_secret = "s"
bot_name = "helper"

[openai]
api_key = "sk-abc"
max_tokens = 2048

[server]
port = 8080
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.feishu.app_id, "cli_xyz");
        assert_eq!(config.openai.max_tokens, 2048);
        assert_eq!(config.server.port, 8080);
        // Unspecified fields fall back to defaults
        assert_eq!(config.openai.model, "text-davinci-003");
    }
}
