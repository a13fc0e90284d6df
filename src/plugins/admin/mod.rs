//! Moderation and federation commands.

pub mod cfban;
pub mod dkick;
pub mod feds;
pub mod title;
