//! Errors a command handler can return.

use std::time::Duration;

use thiserror::Error;

use crate::config::timeouts;
use crate::http::HttpError;
use crate::storage::StoreError;
use crate::telegram::{ListenError, TelegramError};

/// Failure of a single command invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Problem with the user's input; shown verbatim and removed after `delay`.
    #[error("{message}")]
    Usage { message: String, delay: Duration },

    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Listen(#[from] ListenError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// Input error removed after the SMALL tier.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::usage_for(message, timeouts::SMALL)
    }

    pub fn usage_for(message: impl Into<String>, delay: Duration) -> Self {
        Self::Usage {
            message: message.into(),
            delay,
        }
    }
}
