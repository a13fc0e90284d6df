//! Translation, song downloads and extras-repository maintenance.

pub mod song;
pub mod translate;
pub mod updates;
