//! Light-hearted commands.

pub mod ascii;
pub mod decide;
pub mod joke;
pub mod slap;
pub mod tts;
