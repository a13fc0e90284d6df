//! Application settings and Telegram configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.db")
}

impl TelegramConfig {
    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID` and `TG_API_HASH` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let session_path = std::env::var("TG_SESSION_PATH")
            .map_or_else(|_| default_session_path(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            session_path,
        })
    }
}

/// Federation management bots whose replies are trusted by the fban commands.
pub const DEFAULT_FED_BOTS: [i64; 4] = [609_517_172, 2_059_887_769, 1_376_954_911, 885_745_757];

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Command prefix for bot commands.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Account that owns the bot. Resolved from the session when unset.
    #[serde(default)]
    pub owner_id: Option<i64>,

    /// Users allowed to run commands besides the owner.
    #[serde(default)]
    pub sudo_users: Vec<i64>,

    /// Channel that receives federation ban logs and proofs.
    #[serde(default)]
    pub fban_log_channel: Option<i64>,

    /// Federation bots queried by `fstat` and trusted by `cfban`.
    #[serde(default = "default_fed_bots")]
    pub fed_bots: Vec<i64>,

    /// Cloudflare Workers AI account.
    #[serde(default)]
    pub cf_account_id: Option<String>,

    /// Cloudflare Workers AI token.
    #[serde(default)]
    pub cf_api_token: Option<String>,

    /// Cloudflare text model, e.g. `@cf/meta/llama-3-8b-instruct`.
    #[serde(default)]
    pub text_ai_model: Option<String>,

    /// Directory holding the document store and the update marker.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Upstream repository of the extra modules, `owner/name`.
    #[serde(default = "default_extras_repo")]
    pub extras_repo: String,

    /// Upstream branch compared by `modgrade`.
    #[serde(default = "default_extras_branch")]
    pub extras_branch: String,

    /// Git checkout updated by `extupdate`.
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,

    /// Minimum spacing between fan-out messages in milliseconds.
    #[serde(default = "default_send_interval")]
    pub send_interval_ms: u64,
}

fn default_command_prefix() -> String {
    ".".to_owned()
}

fn default_fed_bots() -> Vec<i64> {
    DEFAULT_FED_BOTS.to_vec()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_extras_repo() -> String {
    "R0Xofficial/PlainUB-Extras".to_owned()
}

fn default_extras_branch() -> String {
    "main".to_owned()
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_send_interval() -> u64 {
    1000
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            owner_id: None,
            sudo_users: Vec::new(),
            fban_log_channel: None,
            fed_bots: default_fed_bots(),
            cf_account_id: None,
            cf_api_token: None,
            text_ai_model: None,
            data_dir: default_data_dir(),
            extras_repo: default_extras_repo(),
            extras_branch: default_extras_branch(),
            modules_dir: default_modules_dir(),
            send_interval_ms: default_send_interval(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    ///
    /// Malformed numeric values are ignored rather than rejected.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = Self::default();

        Self {
            command_prefix: env_string("COMMAND_PREFIX").unwrap_or(defaults.command_prefix),
            owner_id: env_string("OWNER_ID").and_then(|s| s.parse().ok()),
            sudo_users: env_string("SUDO_USERS")
                .map(|s| parse_id_list(&s))
                .unwrap_or_default(),
            fban_log_channel: env_string("FBAN_LOG_CHANNEL").and_then(|s| s.parse().ok()),
            fed_bots: env_string("FED_BOTS")
                .map(|s| parse_id_list(&s))
                .filter(|bots| !bots.is_empty())
                .unwrap_or(defaults.fed_bots),
            cf_account_id: env_string("CF_ACCOUNT_ID"),
            cf_api_token: env_string("CF_API_TOKEN"),
            text_ai_model: env_string("TEXT_AI"),
            data_dir: env_string("DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            extras_repo: env_string("EXTRAS_REPO").unwrap_or(defaults.extras_repo),
            extras_branch: env_string("EXTRAS_BRANCH").unwrap_or(defaults.extras_branch),
            modules_dir: env_string("MODULES_DIR").map_or(defaults.modules_dir, PathBuf::from),
            send_interval_ms: env_string("SEND_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.send_interval_ms),
        }
    }

    /// Returns true if the user may run commands (owner or sudo).
    #[must_use]
    pub fn is_privileged(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id) || self.sudo_users.contains(&user_id)
    }

    /// Spacing between consecutive fan-out messages.
    #[must_use]
    pub const fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// Path of the update marker file.
    #[must_use]
    pub fn update_marker_path(&self) -> PathBuf {
        self.data_dir.join("update.json")
    }
}

/// Reads a non-empty environment variable.
fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Parses a comma or whitespace separated list of numeric ids.
fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}
