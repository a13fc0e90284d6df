//! Telegram utilities: quotes, forward origins, locks, fed status, notes
//! and member info.

pub mod fedstat;
pub mod fetchcreator;
pub mod joininfo;
pub mod locks;
pub mod notes;
pub mod perms;
pub mod quote;
