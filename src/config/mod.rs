//! Configuration module for the extras bot.
//!
//! Handles loading of Telegram API credentials and bot settings
//! from the environment, plus the shared auto-delete timeout tiers.

mod settings;

pub use settings::{BotSettings, ConfigError, TelegramConfig};

/// Auto-delete delays used by command replies, in seconds.
pub mod timeouts {
    use std::time::Duration;

    pub const TINY: Duration = Duration::from_secs(3);
    pub const SMALL: Duration = Duration::from_secs(5);
    pub const MEDIUM: Duration = Duration::from_secs(10);
    pub const LONG: Duration = Duration::from_secs(20);
    pub const LARGE: Duration = Duration::from_secs(60);
}

/// Maximum length of a Telegram text message.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// Length long replies are cut down to before a trailer is appended.
pub const TRUNCATED_MESSAGE_LENGTH: usize = 4000;
