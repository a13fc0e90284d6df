//! `tr`: Google Translate with automatic source detection.

use lazy_regex::regex_is_match;
use serde_json::Value;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::http::{HttpError, RequestBuilderExt};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape_pretty;

const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const DEFAULT_TARGET: &str = "en";

/// English language names accepted in place of a code.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("afrikaans", "af"),
    ("albanian", "sq"),
    ("amharic", "am"),
    ("arabic", "ar"),
    ("armenian", "hy"),
    ("assamese", "as"),
    ("azerbaijani", "az"),
    ("basque", "eu"),
    ("belarusian", "be"),
    ("bengali", "bn"),
    ("bosnian", "bs"),
    ("bulgarian", "bg"),
    ("catalan", "ca"),
    ("cebuano", "ceb"),
    ("corsican", "co"),
    ("croatian", "hr"),
    ("czech", "cs"),
    ("danish", "da"),
    ("dutch", "nl"),
    ("english", "en"),
    ("esperanto", "eo"),
    ("estonian", "et"),
    ("filipino", "tl"),
    ("finnish", "fi"),
    ("french", "fr"),
    ("frisian", "fy"),
    ("galician", "gl"),
    ("georgian", "ka"),
    ("german", "de"),
    ("greek", "el"),
    ("gujarati", "gu"),
    ("hausa", "ha"),
    ("hawaiian", "haw"),
    ("hebrew", "iw"),
    ("hindi", "hi"),
    ("hmong", "hmn"),
    ("hungarian", "hu"),
    ("icelandic", "is"),
    ("igbo", "ig"),
    ("indonesian", "id"),
    ("irish", "ga"),
    ("italian", "it"),
    ("japanese", "ja"),
    ("javanese", "jw"),
    ("kannada", "kn"),
    ("kazakh", "kk"),
    ("khmer", "km"),
    ("kinyarwanda", "rw"),
    ("korean", "ko"),
    ("kurdish", "ku"),
    ("kyrgyz", "ky"),
    ("lao", "lo"),
    ("latin", "la"),
    ("latvian", "lv"),
    ("lithuanian", "lt"),
    ("luxembourgish", "lb"),
    ("macedonian", "mk"),
    ("malagasy", "mg"),
    ("malay", "ms"),
    ("malayalam", "ml"),
    ("maltese", "mt"),
    ("maori", "mi"),
    ("marathi", "mr"),
    ("mongolian", "mn"),
    ("myanmar", "my"),
    ("nepali", "ne"),
    ("norwegian", "no"),
    ("odia", "or"),
    ("pashto", "ps"),
    ("persian", "fa"),
    ("polish", "pl"),
    ("portuguese", "pt"),
    ("punjabi", "pa"),
    ("romanian", "ro"),
    ("russian", "ru"),
    ("samoan", "sm"),
    ("serbian", "sr"),
    ("sesotho", "st"),
    ("shona", "sn"),
    ("sindhi", "sd"),
    ("sinhala", "si"),
    ("slovak", "sk"),
    ("slovenian", "sl"),
    ("somali", "so"),
    ("spanish", "es"),
    ("sundanese", "su"),
    ("swahili", "sw"),
    ("swedish", "sv"),
    ("tajik", "tg"),
    ("tamil", "ta"),
    ("tatar", "tt"),
    ("telugu", "te"),
    ("thai", "th"),
    ("turkish", "tr"),
    ("turkmen", "tk"),
    ("ukrainian", "uk"),
    ("urdu", "ur"),
    ("uyghur", "ug"),
    ("uzbek", "uz"),
    ("vietnamese", "vi"),
    ("welsh", "cy"),
    ("xhosa", "xh"),
    ("yiddish", "yi"),
    ("yoruba", "yo"),
    ("zulu", "zu"),
];

/// A translation request taken from the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub text: String,
    pub target: String,
}

/// Text from the reply (target from a leading `-xx` input) or from the
/// input itself.
pub fn parse_request(input: &str, replied: Option<&str>) -> Option<Request> {
    if let Some(text) = replied {
        let target = input
            .strip_prefix('-')
            .map_or_else(|| DEFAULT_TARGET.to_owned(), str::to_lowercase);
        return Some(Request {
            text: text.to_owned(),
            target,
        });
    }
    if input.is_empty() {
        return None;
    }
    let request = match input.split_once(char::is_whitespace) {
        Some((flag, rest)) if flag.starts_with('-') => Request {
            text: rest.trim().to_owned(),
            target: flag[1..].to_lowercase(),
        },
        _ => Request {
            text: input.to_owned(),
            target: DEFAULT_TARGET.to_owned(),
        },
    };
    Some(request)
}

fn is_language_code(code: &str) -> bool {
    regex_is_match!(r"^[a-z]{2,3}(-[a-z]{2,4})?$", code)
}

/// Code for a target given as a code or an English language name.
fn language_code(target: &str) -> Option<&str> {
    LANGUAGE_NAMES
        .iter()
        .find(|(name, _)| *name == target)
        .map(|(_, code)| *code)
        .or_else(|| is_language_code(target).then_some(target))
}

/// Joins the translated segments of a `translate_a/single` response.
pub fn parse_translation(body: &Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;
    let text: String = segments
        .iter()
        .filter_map(|s| s.get(0).and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

fn invalid_language(target: &str) -> CommandError {
    CommandError::usage_for(
        format!(
            "<b>Invalid language code:</b> <code>{}</code>",
            escape_pretty(target)
        ),
        timeouts::LARGE,
    )
}

async fn translate_text(ctx: &CommandContext, request: &Request) -> Result<String, CommandError> {
    let body: Value = match ctx
        .app
        .http
        .get(TRANSLATE_URL)
        .query(&[
            ("client", "gtx"),
            ("sl", "auto"),
            ("tl", request.target.as_str()),
            ("dt", "t"),
            ("q", request.text.as_str()),
        ])
        .read_json()
        .await
    {
        Ok(body) => body,
        Err(HttpError::BadStatus { status, .. }) if status.as_u16() == 400 => {
            return Err(invalid_language(&request.target));
        }
        Err(e) => return Err(e.into()),
    };
    parse_translation(&body).ok_or_else(|| {
        CommandError::usage_for(
            "<b>An error occurred:</b>\n<code>Empty translation.</code>",
            timeouts::LARGE,
        )
    })
}

pub async fn translate(ctx: &CommandContext) -> Result<(), CommandError> {
    let replied = ctx.replied.as_ref().map(|m| m.text.as_str()).filter(|t| !t.trim().is_empty());
    let Some(request) = parse_request(&ctx.input, replied) else {
        return Err(CommandError::usage_for(
            "Please provide text to translate or reply to a message.",
            timeouts::MEDIUM,
        ));
    };
    if request.text.trim().is_empty() {
        return Err(CommandError::usage_for(
            "The message contains no text to translate.",
            timeouts::MEDIUM,
        ));
    }
    let Some(target) = language_code(&request.target).map(str::to_owned) else {
        return Err(invalid_language(&request.target));
    };
    let request = Request { target, ..request };

    let progress = ctx.reply("<code>Translating...</code>").await?;
    let translated = match translate_text(ctx, &request).await {
        Ok(text) => text,
        Err(e) => return ctx.edit_error(progress, e).await,
    };

    let text = format!(
        "<b>🌍 Translation to: {}</b>\n\n<b>Input:</b>\n<blockquote expandable>{}</blockquote>\n\n<b>Output:</b>\n<blockquote expandable>{}</blockquote>",
        request.target,
        escape_pretty(&request.text),
        escape_pretty(&translated)
    );
    ctx.edit_with(progress, OutgoingMessage::new(text).no_preview())
        .await
}
