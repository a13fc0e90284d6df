//! Auto-delete scheduler module.
//!
//! Temporary replies (errors, confirmations) are removed after a delay
//! by a background task instead of a sleeping future per message.

mod runner;

pub use runner::{AutoDeleter, DeleteHandle, SchedulerMessage};
