//! Telegram client wrapper module.
//!
//! Commands talk to Telegram through the [`ChatApi`] trait. [`TelegramBot`]
//! implements it over MTProto; the plain types in [`types`] keep grammers
//! out of the command layer.

mod api;
mod client;
mod error;
pub mod html;
mod listener;
#[cfg(test)]
pub mod mock;
mod rate_limiter;
pub mod types;

pub use api::{ChatApi, MediaStream};
pub use client::{TelegramBot, mask_phone};
pub use error::TelegramError;
pub use grammers_client::client::{LoginToken, PasswordToken};
pub use listener::{ListenError, Listeners, Subscription};
pub use rate_limiter::RateLimiter;
pub use types::{
    ChatId, ChatInfo, ChatKind, ChatMember, ChatPermissions, FileKind, IncomingMessage, MessageId,
    OutgoingMessage, UserId, UserInfo,
};
