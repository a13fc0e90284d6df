//! Shared HTTP client and response helpers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

/// Browser-like User-Agent; several device APIs reject unknown agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors returned by HTTP helpers.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to send request: {0}")]
    SendRequest(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    BadStatus { status: StatusCode, body: String },

    #[error("Failed to read response: {0}")]
    ReadResponse(#[source] reqwest::Error),

    #[error("Unexpected response shape: {0}")]
    UnexpectedJson(#[source] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("URL cannot take a path: {0}")]
    BaseUrl(String),
}

impl HttpError {
    /// Status code of a non-success response.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::BadStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::SendRequest(err)
        }
    }
}

/// Creates the client shared by all commands.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn create_client() -> Result<reqwest::Client, HttpError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(HttpError::Build)
}

/// Reading helpers for request builders.
#[async_trait]
pub trait RequestBuilderExt {
    async fn read_json<Res: DeserializeOwned>(self) -> Result<Res, HttpError>;

    async fn read_text(self) -> Result<String, HttpError>;

    async fn read_bytes(self) -> Result<Vec<u8>, HttpError>;
}

#[async_trait]
impl RequestBuilderExt for RequestBuilder {
    async fn read_json<Res: DeserializeOwned>(self) -> Result<Res, HttpError> {
        let bytes = self.read_bytes().await?;

        serde_json::from_slice(&bytes).map_err(|err| {
            match std::str::from_utf8(&bytes) {
                Ok(response_body) => warn!(response_body, "Bad JSON response"),
                Err(_) => warn!(len = bytes.len(), "Bad JSON response (not UTF-8)"),
            }
            HttpError::UnexpectedJson(err)
        })
    }

    async fn read_text(self) -> Result<String, HttpError> {
        let bytes = self.read_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn read_bytes(self) -> Result<Vec<u8>, HttpError> {
        let res = self.send().await.map_err(HttpError::from_send)?;
        let status = res.status();
        debug!(%status, url = %res.url(), "Response received");

        if status.is_client_error() || status.is_server_error() {
            let body = match res.text().await {
                Ok(it) => it,
                Err(err) => format!("Could not collect the error response body text: {err}"),
            };
            return Err(HttpError::BadStatus { status, body });
        }

        res.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(HttpError::ReadResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_accessor() {
        let err = HttpError::BadStatus {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(HttpError::Timeout.status(), None);
    }

    #[test]
    fn test_client_builds() {
        assert!(create_client().is_ok());
    }
}
