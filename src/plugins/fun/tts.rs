//! Text to speech through the Google Translate voice endpoint.

use std::io::Write;

use tracing::debug;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::RequestBuilderExt;
use crate::telegram::FileKind;
use crate::telegram::html::escape_pretty;

const TTS_URL: &str = "https://translate.google.com/translate_tts";
const DEFAULT_LANG: &str = "en";
/// Longest text the endpoint accepts per request.
const MAX_CHUNK_CHARS: usize = 100;

/// Returns the language of a `-xx` flag.
fn lang_flag(word: &str) -> Option<String> {
    let code = word.strip_prefix('-')?;
    (code.chars().count() == 2 && code.chars().all(char::is_alphabetic))
        .then(|| code.to_lowercase())
}

/// Text and language from the input, falling back to the replied text.
pub fn parse_request(input: &str, replied: Option<&str>) -> Option<(String, String)> {
    if let Some(text) = replied {
        let lang = lang_flag(input.trim()).unwrap_or_else(|| DEFAULT_LANG.to_owned());
        return Some((text.to_owned(), lang));
    }
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((flag, rest)) if lang_flag(flag).is_some() && !rest.trim().is_empty() => {
            Some((rest.trim().to_owned(), lang_flag(flag)?))
        }
        _ => Some((input.to_owned(), DEFAULT_LANG.to_owned())),
    }
}

/// Splits text on word boundaries into pieces the endpoint accepts.
pub fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word = word.to_owned();
        while word.chars().count() > MAX_CHUNK_CHARS {
            let head: String = word.chars().take(MAX_CHUNK_CHARS).collect();
            word = word.chars().skip(MAX_CHUNK_CHARS).collect();
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(head);
        }
        let extra = usize::from(!current.is_empty());
        if current.chars().count() + extra + word.chars().count() > MAX_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn synthesize(ctx: &CommandContext, text: &str, lang: &str) -> Result<Vec<u8>, CommandError> {
    let chunks = split_chunks(text);
    let total = chunks.len().to_string();
    let mut audio = Vec::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        debug!("Fetching speech chunk {}/{}", idx + 1, chunks.len());
        let (idx, textlen) = (idx.to_string(), chunk.chars().count().to_string());
        let bytes = ctx
            .app
            .http
            .get(TTS_URL)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", lang),
                ("q", chunk.as_str()),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .read_bytes()
            .await?;
        audio.extend_from_slice(&bytes);
    }
    Ok(audio)
}

pub async fn tts(ctx: &CommandContext) -> Result<(), CommandError> {
    let Some((text, lang)) = parse_request(&ctx.input, ctx.replied_text()) else {
        return Err(CommandError::usage_for(
            "Please provide text or reply to a message.",
            timeouts::MEDIUM,
        ));
    };
    if text.trim().is_empty() {
        return Err(CommandError::usage_for(
            "The message contains no text to convert.",
            timeouts::MEDIUM,
        ));
    }

    let progress = ctx
        .reply("<code>Converting text to speech...</code>")
        .await?;

    let result = async {
        let audio = synthesize(ctx, &text, &lang).await?;
        let mut file = tempfile::Builder::new()
            .prefix("tts-")
            .suffix(".mp3")
            .tempfile()?;
        file.write_all(&audio)?;
        file.flush()?;

        ctx.edit(progress, "<code>Sending...</code>").await?;
        let reply_to = ctx.message.reply_to.unwrap_or(ctx.message.id);
        ctx.api()
            .send_file(ctx.chat_id(), file.path(), FileKind::Voice, None, Some(reply_to))
            .await?;
        Ok::<_, CommandError>(())
    }
    .await;

    match result {
        Ok(()) => {
            ctx.api().delete_messages(ctx.chat_id(), &[progress]).await?;
            Ok(())
        }
        Err(e) => {
            ctx.edit_temp(
                progress,
                format!(
                    "<b>Error:</b> Could not generate speech.\n<code>{}</code>",
                    escape_pretty(&e.to_string())
                ),
                timeouts::LONG,
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_flag() {
        assert_eq!(
            parse_request("-pl Cześć", None),
            Some(("Cześć".to_owned(), "pl".to_owned()))
        );
        assert_eq!(
            parse_request("-pol Cześć", None),
            Some(("-pol Cześć".to_owned(), "en".to_owned()))
        );
        assert_eq!(
            parse_request("hello there", None),
            Some(("hello there".to_owned(), "en".to_owned()))
        );
        assert_eq!(parse_request("", None), None);
    }

    #[test]
    fn test_reply_uses_flag_only() {
        assert_eq!(
            parse_request("-DE", Some("Guten Tag")),
            Some(("Guten Tag".to_owned(), "de".to_owned()))
        );
        assert_eq!(
            parse_request("loud", Some("hi")),
            Some(("hi".to_owned(), "en".to_owned()))
        );
    }

    #[test]
    fn test_chunks_respect_limit() {
        let text = "word ".repeat(60);
        let chunks = split_chunks(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHUNK_CHARS));
        assert_eq!(chunks.join(" ").split(' ').count(), 60);

        let long = "x".repeat(250);
        let chunks = split_chunks(&long);
        assert_eq!(
            chunks.iter().map(String::len).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
    }
}
