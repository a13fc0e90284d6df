//! Extras User Bot Library
//!
//! A Telegram userbot that runs moderation, federation and utility
//! commands from chat messages.
//!
//! This crate provides the core functionality for:
//! - Connecting to Telegram via `MTProto`
//! - Parsing and dispatching prefixed chat commands
//! - Waiting for replies from other bots (federations, quotes)
//! - Persisting fed lists and notes in a JSON document store
//! - Deleting temporary replies on a schedule

pub mod commands;
pub mod config;
pub mod http;
pub mod plugins;
pub mod scheduler;
pub mod storage;
pub mod telegram;
