//! `cut start-end`: trim a replied audio or video with ffmpeg.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::html::escape;
use crate::telegram::types::MediaInfo;
use crate::telegram::{ChatApi, ChatId, FileKind, IncomingMessage, MessageId, TelegramError};

#[derive(Debug, Error)]
enum CutError {
    #[error("FFmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("Trimmed file was not created or is empty. Check time format.")]
    EmptyOutput,

    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Splits `start-end` into its two trimmed halves.
fn parse_range(input: &str) -> Result<(String, String), CommandError> {
    if !input.contains('-') {
        return Err(CommandError::usage_for(
            "<b>Usage:</b> <code>.cut [start]-[end]</code> (e.g., <code>.cut 1:10-1:25</code>)",
            timeouts::MEDIUM,
        ));
    }
    match input.split('-').map(str::trim).collect::<Vec<_>>().as_slice() {
        [start, end] if !start.is_empty() && !end.is_empty() => {
            Ok(((*start).to_owned(), (*end).to_owned()))
        }
        _ => Err(CommandError::usage_for(
            "<b>Invalid time format.</b> Please use <code>start-end</code>.",
            timeouts::MEDIUM,
        )),
    }
}

/// File name for the download, keeping the original extension.
fn input_name(media: &MediaInfo) -> String {
    let ext = media
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .unwrap_or(if media.is_video() { "mp4" } else { "mp3" });
    format!("media.{ext}")
}

/// Streams the media of message `id` into `path`.
async fn save_media(
    api: &dyn ChatApi,
    chat: ChatId,
    id: MessageId,
    path: &Path,
) -> Result<u64, CutError> {
    let mut stream = api.download_media(chat, id).await?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Path of the trimmed copy next to `input`.
fn output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("media");
    let name = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_cut.{ext}"),
        None => format!("{stem}_cut"),
    };
    input.with_file_name(name)
}

async fn trim(input: &Path, output: &Path, start: &str, end: &str) -> Result<(), CutError> {
    let result = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .args(["-ss", start, "-to", end, "-c", "copy", "-y"])
        .arg(output)
        .kill_on_drop(true)
        .output()
        .await?;
    if !result.status.success() {
        return Err(CutError::Ffmpeg(
            String::from_utf8_lossy(&result.stderr).trim().to_owned(),
        ));
    }
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(CutError::EmptyOutput),
    }
}

async fn cut_media(
    ctx: &CommandContext,
    replied: &IncomingMessage,
    media: &MediaInfo,
    progress: MessageId,
    (start, end): (&str, &str),
) -> Result<(), CutError> {
    let workdir = tempfile::tempdir()?;
    let input = workdir.path().join(input_name(media));
    let size = save_media(ctx.api(), replied.chat.id, replied.id, &input).await?;
    debug!("Downloaded {} bytes for cutting", size);

    let trimming = format!(
        "<code>Trimming from {} to {}...</code>",
        escape(start),
        escape(end)
    );
    if let Err(e) = ctx.edit(progress, trimming).await {
        debug!("Could not update cut progress: {}", e);
    }
    let output = output_path(&input);
    trim(&input, &output, start, end).await?;

    if let Err(e) = ctx.edit(progress, "<code>Uploading file...</code>").await {
        debug!("Could not update cut progress: {}", e);
    }
    let kind = if media.is_video() {
        FileKind::Video
    } else {
        FileKind::Audio
    };
    let caption = format!(
        "Trimmed from <code>{}</code> to <code>{}</code>.",
        escape(start),
        escape(end)
    );
    ctx.api()
        .send_file(ctx.chat_id(), &output, kind, Some(caption), Some(replied.id))
        .await?;
    Ok(())
}

pub async fn cut(ctx: &CommandContext) -> Result<(), CommandError> {
    let target = ctx.replied.as_ref().and_then(|m| {
        m.media
            .as_ref()
            .filter(|media| media.is_audio_or_video())
            .map(|media| (m, media))
    });
    let Some((replied, media)) = target else {
        return Err(CommandError::usage_for(
            "Please reply to a video or audio file to cut it.",
            timeouts::MEDIUM,
        ));
    };
    let (start, end) = parse_range(&ctx.input)?;

    let progress = ctx.reply("<code>Downloading media...</code>").await?;
    match cut_media(ctx, replied, media, progress, (&start, &end)).await {
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
    use crate::telegram::types::MediaKind;

    fn video() -> MediaInfo {
        MediaInfo {
            kind: MediaKind::Video,
            file_name: Some("clip.mkv".to_owned()),
            mime_type: Some("video/x-matroska".to_owned()),
            size: 8,
        }
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            parse_range("1:10 - 1:25").unwrap(),
            ("1:10".to_owned(), "1:25".to_owned())
        );
        assert!(parse_range("1:10").unwrap_err().to_string().starts_with("<b>Usage:</b>"));
        assert!(parse_range("1-2-3").unwrap_err().to_string().starts_with("<b>Invalid time format.</b>"));
        assert!(parse_range("1:10-").is_err());
    }

    #[test]
    fn test_file_names() {
        assert_eq!(input_name(&video()), "media.mkv");
        let voice = MediaInfo {
            kind: MediaKind::Voice,
            file_name: None,
            mime_type: None,
            size: 1,
        };
        assert_eq!(input_name(&voice), "media.mp3");
        assert_eq!(output_path(Path::new("/tmp/x/media.mkv")), PathBuf::from("/tmp/x/media_cut.mkv"));
    }

    #[tokio::test]
    async fn test_media_is_saved_to_disk() {
        let api = MockApi::new();
        api.script.lock().unwrap().media.insert((-5, 3), b"0123456789".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.mkv");

        let written = save_media(&api, -5, 3, &path).await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_requires_media_reply() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api);

        let ctx = context(&app, BotCommand::Cut, incoming(-5, 4, ".cut 0:01-0:02"), "0:01-0:02", Some(incoming(-5, 3, "text")));
        let err = cut(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Please reply to a video or audio file to cut it.");

        let mut replied = incoming(-5, 3, "");
        replied.media = Some(video());
        let ctx = context(&app, BotCommand::Cut, incoming(-5, 4, ".cut 0:01"), "0:01", Some(replied));
        assert!(matches!(cut(&ctx).await, Err(CommandError::Usage { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_media_reports_error_after_progress() {
        let api = Arc::new(MockApi::new());
        api.script.lock().unwrap().media.insert((-5, 3), b"not a video".to_vec());
        let (app, _dir) = test_app(api.clone());

        let mut replied = incoming(-5, 3, "");
        replied.media = Some(video());
        let ctx = context(&app, BotCommand::Cut, incoming(-5, 4, ".cut 0:01-0:02"), "0:01-0:02", Some(replied));
        cut(&ctx).await.unwrap();

        // ffmpeg rejects the bytes, or is not installed; either way nothing is uploaded.
        let recorded = api.recorded.lock().unwrap();
        assert_eq!(recorded.edits[0].2.html, "<code>Trimming from 0:01 to 0:02...</code>");
        assert!(recorded.files.is_empty());
        assert!(recorded.last_text.starts_with("<b>Error:</b> <code>"));
    }
}
