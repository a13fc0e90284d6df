//! Outbound HTTP: the shared client plus typed API wrappers.

mod client;
pub mod github;

pub use client::{HttpError, RequestBuilderExt, create_client};
pub use github::GitHub;
