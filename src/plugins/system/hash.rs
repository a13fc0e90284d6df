//! `hash`: MD5, SHA1 and SHA256 of a replied document.

use futures::StreamExt;
use md5::Context as Md5Context;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tracing::debug;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::html::escape;

const PROGRESS_STEP: u64 = 10 * 1024 * 1024;

/// Human readable size with two decimals above one KB.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    #[allow(clippy::cast_precision_loss)]
    let size = bytes as f64;
    if bytes < 1024 {
        format!("{bytes} B")
    } else if size < KB * KB {
        format!("{:.2} KB", size / KB)
    } else if size < KB * KB * KB {
        format!("{:.2} MB", size / (KB * KB))
    } else {
        format!("{:.2} GB", size / (KB * KB * KB))
    }
}

/// Running digests of a streamed file.
pub struct FileHasher {
    md5: Md5Context,
    sha1: Sha1,
    sha256: Sha256,
    size: u64,
}

impl Default for FileHasher {
    fn default() -> Self {
        Self {
            md5: Md5Context::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
            size: 0,
        }
    }
}

/// Final digests in lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub size: u64,
}

impl FileHasher {
    /// Feeds a chunk; returns true when a progress boundary was crossed.
    pub fn update(&mut self, chunk: &[u8]) -> bool {
        let before = self.size / PROGRESS_STEP;
        self.md5.consume(chunk);
        self.sha1.update(chunk);
        self.sha256.update(chunk);
        self.size += chunk.len() as u64;
        self.size / PROGRESS_STEP > before
    }

    pub fn finish(self) -> FileHashes {
        FileHashes {
            md5: format!("{:x}", self.md5.compute()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
            size: self.size,
        }
    }
}

pub async fn hash(ctx: &CommandContext) -> Result<(), CommandError> {
    let document = ctx
        .replied
        .as_ref()
        .filter(|m| m.media.as_ref().is_some_and(|media| media.is_document()));
    let Some(document) = document else {
        return Err(CommandError::usage_for(
            "Please reply to a file to calculate its hashes.",
            timeouts::MEDIUM,
        ));
    };
    let file_name = document
        .media
        .as_ref()
        .and_then(|m| m.file_name.clone())
        .unwrap_or_else(|| "file".to_owned());

    let progress = ctx
        .reply("<code>Downloading file to calculate hashes...</code>")
        .await?;

    let result = async {
        let mut stream = ctx.api().download_media(document.chat.id, document.id).await?;
        let mut hasher = FileHasher::default();
        while let Some(chunk) = stream.next().await {
            if hasher.update(&chunk?) {
                debug!("Hashed {} of {}", format_size(hasher.size), file_name);
                ctx.edit(
                    progress,
                    format!("<code>Processing... {}</code>", format_size(hasher.size)),
                )
                .await?;
            }
        }
        Ok::<_, CommandError>(hasher.finish())
    }
    .await;

    match result {
        Ok(hashes) => {
            ctx.edit(
                progress,
                format!(
                    "<b>File Details for:</b> <code>{}</code>\n\n<b>Size:</b> <code>{}</code>\n<b>MD5:</b> <code>{}</code>\n<b>SHA1:</b> <code>{}</code>\n<b>SHA256:</b> <code>{}</code>",
                    escape(&file_name),
                    format_size(hashes.size),
                    hashes.md5,
                    hashes.sha1,
                    hashes.sha256
                ),
            )
            .await
        }
        Err(e) => {
            ctx.edit_temp(
                progress,
                format!(
                    "<b>Error:</b> An error occurred while processing the file.\n<code>{}</code>",
                    escape(&e.to_string())
                ),
                timeouts::LARGE,
            )
            .await
        }
    }
}
