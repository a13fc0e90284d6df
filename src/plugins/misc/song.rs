//! `song`/`sg`: download a track with yt-dlp and send it as MP3.
//!
//! The query is a YouTube link found in the replied message (plain or hidden
//! text link), otherwise the command input as a YouTube search.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::html::escape;
use crate::telegram::{FileKind, IncomingMessage, MessageId, TelegramError};

const YOUTUBE_HOSTS: [&str; 6] = [
    "www.youtube.com",
    "youtube.com",
    "m.youtube.com",
    "youtu.be",
    "www.youtube-nocookie.com",
    "music.youtube.com",
];

#[derive(Debug, Error)]
enum SongError {
    #[error("Song Not found.")]
    NotFound,

    #[error("Download failed.")]
    NoAudio,

    #[error("yt-dlp failed: {0}")]
    Downloader(String),

    #[error("Unexpected yt-dlp output: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Metadata printed by yt-dlp for the downloaded entry.
#[derive(Debug, Clone, Deserialize)]
struct TrackInfo {
    title: String,
    webpage_url: String,
}

fn is_youtube_url(link: &str) -> bool {
    Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(|host| YOUTUBE_HOSTS.contains(&host)))
        .unwrap_or(false)
}

/// First YouTube link in the message words, then in its hidden links.
fn youtube_link(message: &IncomingMessage) -> Option<String> {
    message
        .text
        .split_whitespace()
        .chain(message.links.iter().map(String::as_str))
        .find(|link| is_youtube_url(link))
        .map(str::to_owned)
}

fn search_term(query: &str) -> String {
    if query.starts_with("http") {
        query.to_owned()
    } else {
        format!("ytsearch:{query}")
    }
}

/// Downloads the best audio of `query` into `dir` as MP3.
async fn download(query: &str, dir: &Path) -> Result<TrackInfo, SongError> {
    let template = dir.join("%(title)s.%(ext)s");
    let output = Command::new("yt-dlp")
        .args(["--format", "bestaudio/best", "--extract-audio"])
        .args(["--audio-format", "mp3", "--audio-quality", "192K"])
        .args(["--no-playlist", "--geo-bypass", "--no-check-certificates"])
        .args(["--dump-json", "--no-simulate", "--quiet", "--output"])
        .arg(template)
        .arg(search_term(query))
        .kill_on_drop(true)
        .output()
        .await?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(line) = stdout.lines().find(|l| !l.trim().is_empty()) else {
        if output.status.success() {
            return Err(SongError::NotFound);
        }
        return Err(SongError::Downloader(
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ));
    };
    Ok(serde_json::from_str(line)?)
}

async fn find_audio(dir: &Path) -> Result<Option<PathBuf>, SongError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "mp3") {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Sends the MP3 found in `dir`, captioned with a link to the track.
async fn upload(
    ctx: &CommandContext,
    progress: MessageId,
    dir: &Path,
    info: &TrackInfo,
) -> Result<(), SongError> {
    let audio = find_audio(dir).await?.ok_or(SongError::NoAudio)?;
    let name = audio
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Err(e) = ctx
        .edit(progress, format!("<code>Uploading {}....</code>", escape(&name)))
        .await
    {
        debug!("Could not update song progress: {}", e);
    }
    let caption = format!(
        "<a href='{}'>{}</a>",
        escape(&info.webpage_url),
        escape(&info.title)
    );
    ctx.api()
        .send_file(
            ctx.chat_id(),
            &audio,
            FileKind::Audio,
            Some(caption),
            ctx.message.reply_to,
        )
        .await?;
    Ok(())
}

async fn fetch_song(
    ctx: &CommandContext,
    query: &str,
    progress: MessageId,
) -> Result<(), SongError> {
    let workdir = tempfile::tempdir()?;
    let info = download(query, workdir.path()).await?;
    debug!("Downloaded {} from {}", info.title, info.webpage_url);
    upload(ctx, progress, workdir.path(), &info).await
}

pub async fn song(ctx: &CommandContext) -> Result<(), CommandError> {
    let query = ctx
        .replied
        .as_ref()
        .and_then(youtube_link)
        .unwrap_or_else(|| ctx.input.clone());
    if query.is_empty() {
        return Err(CommandError::usage_for(
            "Give a song name or link to download.",
            timeouts::MEDIUM,
        ));
    }

    let progress = ctx.reply("<code>Searching....</code>").await?;
    match fetch_song(ctx, &query, progress).await {
        Ok(()) => {
            ctx.api().delete_messages(ctx.chat_id(), &[progress]).await?;
            Ok(())
        }
        Err(e) => {
            ctx.edit_temp(
                progress,
                format!("<b>Error:</b> <code>{}</code>", escape(&e.to_string())),
                timeouts::LONG,
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};

    #[test]
    fn test_youtube_hosts() {
        assert!(is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://music.youtube.com/watch?v=abc"));
        assert!(!is_youtube_url("https://vimeo.com/123"));
        assert!(!is_youtube_url("youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_link_from_text_then_hidden_links() {
        let mut message = incoming(5, 3, "listen to this https://youtu.be/abc please");
        assert_eq!(youtube_link(&message).as_deref(), Some("https://youtu.be/abc"));

        message.text = "this one".to_owned();
        message.links = vec![
            "https://example.com".to_owned(),
            "https://www.youtube.com/watch?v=xyz".to_owned(),
        ];
        assert_eq!(
            youtube_link(&message).as_deref(),
            Some("https://www.youtube.com/watch?v=xyz")
        );

        message.links.clear();
        assert_eq!(youtube_link(&message), None);
    }

    #[test]
    fn test_search_term() {
        assert_eq!(search_term("never gonna"), "ytsearch:never gonna");
        assert_eq!(search_term("https://youtu.be/abc"), "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_song_without_query() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let replied = incoming(5, 2, "no links here");
        let ctx = context(&app, BotCommand::Song, incoming(5, 3, ".song"), "", Some(replied));
        let err = song(&ctx).await.unwrap_err();
        assert!(matches!(err, CommandError::Usage { .. }));
        assert!(api.recorded.lock().unwrap().sent.is_empty());
    }

    #[tokio::test]
    async fn test_upload_sends_mp3_with_link_caption() {
        let api = Arc::new(MockApi::new());
        let (app, dir) = test_app(api.clone());
        let songs = dir.path().join("songs");
        std::fs::create_dir(&songs).unwrap();
        std::fs::write(songs.join("cover.jpg"), b"jpg").unwrap();
        std::fs::write(songs.join("Track & Co.mp3"), b"mp3").unwrap();

        let ctx = context(&app, BotCommand::Song, incoming(5, 3, ".song track"), "track", None);
        let info = TrackInfo {
            title: "Track & Co".to_owned(),
            webpage_url: "https://youtu.be/abc".to_owned(),
        };
        upload(&ctx, 1001, &songs, &info).await.unwrap();

        let recorded = api.recorded.lock().unwrap();
        let (chat, path, kind, caption) = &recorded.files[0];
        assert_eq!(*chat, 5);
        assert!(path.ends_with("Track & Co.mp3"));
        assert!(matches!(kind, FileKind::Audio));
        assert_eq!(
            caption.as_deref(),
            Some("<a href='https://youtu.be/abc'>Track &amp; Co</a>")
        );
        assert_eq!(recorded.edits[0].2.html, "<code>Uploading Track &amp; Co.mp3....</code>");
    }

    #[tokio::test]
    async fn test_upload_without_audio() {
        let api = Arc::new(MockApi::new());
        let (app, dir) = test_app(api.clone());
        let ctx = context(&app, BotCommand::Song, incoming(5, 3, ".song x"), "x", None);
        let info = TrackInfo {
            title: "x".to_owned(),
            webpage_url: "https://youtu.be/x".to_owned(),
        };
        let err = upload(&ctx, 1001, dir.path(), &info).await.unwrap_err();
        assert_eq!(err.to_string(), "Download failed.");
    }
}
