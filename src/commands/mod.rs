//! Command handling module.
//!
//! Parses `<prefix><name> [input]` messages, builds a [`CommandContext`]
//! and hands it to the plugin registered for the command.

mod context;
mod error;
mod handler;
#[cfg(test)]
pub mod testing;
mod types;

pub use context::{AppState, CommandContext, Target};
pub use error::CommandError;
pub use handler::CommandHandler;
pub use types::{BotCommand, ParsedCommand};
