use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{QqtgError, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_ONEBOT_PATH: &str = "/onebot";
/// Bot API download limit for bots not running a local server.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_GROUP_CACHE_TTL_SECS: u64 = 600;

/// Top-level config (qqtg.toml + QQTG_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QqtgConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub onebot: OneBotConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Telegram side: one forum supergroup, one or more bot tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// The forum-enabled supergroup every topic is created in.
    pub chat_id: i64,
    /// Bot tokens. The first one is the master bot: it creates topics and is
    /// the only one that polls for updates. All of them share outbound load.
    pub tokens: Vec<String>,
    /// Topic that receives relay failure reports. `None` posts to General.
    #[serde(default)]
    pub admin_thread_id: Option<i32>,
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

/// QQ side, spoken through a OneBot v11 implementation (NapCat, Lagrange, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    /// Base URL of the OneBot HTTP API, e.g. `http://127.0.0.1:3000`.
    pub api_url: String,
    /// Sent as `Authorization: Bearer` on API calls.
    #[serde(default)]
    pub access_token: Option<String>,
    /// HMAC-SHA1 secret used to sign event reports (`X-Signature`).
    #[serde(default)]
    pub secret: Option<String>,
    /// Route the OneBot implementation posts events to.
    #[serde(default = "default_onebot_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Prefix group senders with a colour-block identicon.
    #[serde(default = "bool_true")]
    pub show_identicon: bool,
    /// Render QQ mentions as `tg://user` links to the master bot.
    #[serde(default = "bool_true")]
    pub mention_links: bool,
    #[serde(default = "default_group_cache_ttl_secs")]
    pub group_cache_ttl_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            show_identicon: true,
            mention_links: true,
            group_cache_ttl_secs: DEFAULT_GROUP_CACHE_TTL_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_onebot_path() -> String {
    DEFAULT_ONEBOT_PATH.to_string()
}
fn default_max_attachment_bytes() -> u64 {
    DEFAULT_MAX_ATTACHMENT_BYTES
}
fn default_group_cache_ttl_secs() -> u64 {
    DEFAULT_GROUP_CACHE_TTL_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.qqtg/qqtg.db", home)
}

impl QqtgConfig {
    /// Load config from a TOML file with QQTG_* env var overrides.
    ///
    /// Nested keys are separated by a double underscore so that field names
    /// containing `_` survive, e.g. `QQTG_TELEGRAM__CHAT_ID=-100123`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        Self::extract(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("QQTG_").split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: QqtgConfig = figment
            .extract()
            .map_err(|e| QqtgError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.chat_id == 0 {
            return Err(QqtgError::InvalidConfig {
                field: "telegram.chat_id",
                reason: "must be the id of a forum supergroup".to_string(),
            });
        }
        if self.telegram.tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(QqtgError::InvalidConfig {
                field: "telegram.tokens",
                reason: "at least one bot token is required".to_string(),
            });
        }
        if !self.onebot.path.starts_with('/') {
            return Err(QqtgError::InvalidConfig {
                field: "onebot.path",
                reason: format!("route must start with '/': {}", self.onebot.path),
            });
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.qqtg/qqtg.toml", home)
}
