//! Test fixtures for command handlers.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Notify, mpsc};

use super::context::{AppState, CommandContext};
use super::types::BotCommand;
use crate::config::BotSettings;
use crate::http::{GitHub, create_client};
use crate::plugins::android::DeviceCache;
use crate::scheduler::{DeleteHandle, SchedulerMessage};
use crate::storage::DocumentStore;
use crate::telegram::mock::MockApi;
use crate::telegram::{IncomingMessage, Listeners, RateLimiter};

/// Shared state over `api` with sudo user 42 and a temporary store.
///
/// Scheduled deletions are discarded.
pub fn test_app(api: Arc<MockApi>) -> (Arc<AppState>, TempDir) {
    test_app_with(api, BotSettings::default())
}

pub fn test_app_with(api: Arc<MockApi>, settings: BotSettings) -> (Arc<AppState>, TempDir) {
    let (app, dir, rx) = test_app_scheduled(api, settings);
    // Keep the receiver alive so scheduling never warns.
    std::mem::forget(rx);
    (app, dir)
}

/// Like [`test_app_with`], also returning the queue of scheduled deletions.
pub fn test_app_scheduled(
    api: Arc<MockApi>,
    mut settings: BotSettings,
) -> (
    Arc<AppState>,
    TempDir,
    mpsc::UnboundedReceiver<SchedulerMessage>,
) {
    let dir = TempDir::new().unwrap();
    settings.owner_id = Some(1);
    settings.sudo_users.push(42);
    settings.data_dir = dir.path().to_path_buf();

    let (deleter, rx) = DeleteHandle::channel();

    let http = create_client().unwrap();
    let app = AppState {
        api,
        listeners: Arc::new(Listeners::new()),
        deleter,
        store: DocumentStore::open(dir.path()).unwrap(),
        github: GitHub::new(http.clone()),
        http,
        owner_id: 1,
        fanout: RateLimiter::from_millis(0),
        devices: DeviceCache::default(),
        restart: Arc::new(Notify::new()),
        settings,
    };
    (Arc::new(app), dir, rx)
}

/// Context for `command` issued by `message`.
pub fn context(
    app: &Arc<AppState>,
    command: BotCommand,
    message: IncomingMessage,
    input: &str,
    replied: Option<IncomingMessage>,
) -> CommandContext {
    CommandContext {
        app: Arc::clone(app),
        command,
        message,
        input: input.to_owned(),
        replied,
    }
}

/// Answers one HTTP request on a local port with `body` as JSON.
///
/// Returns the base URL to point an API client at.
pub async fn serve_json(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
    });
    format!("http://{addr}/")
}
