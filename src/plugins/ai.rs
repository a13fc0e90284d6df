//! `ask`: Cloudflare Workers AI text generation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{CommandContext, CommandError};
use crate::config::{BotSettings, timeouts};
use crate::http::{HttpError, RequestBuilderExt};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct RunRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    response: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    success: bool,
    result: Option<RunResult>,
    #[serde(default)]
    errors: Vec<Value>,
}

/// Workers AI credentials; `None` unless all three are usable.
struct Credentials<'a> {
    account_id: &'a str,
    token: &'a str,
    model: &'a str,
}

fn credentials(settings: &BotSettings) -> Result<Credentials<'_>, CommandError> {
    let model = settings
        .text_ai_model
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| {
            CommandError::usage_for(
                "<b>Cloudflare Text Model AI not configured.</b>",
                timeouts::LONG,
            )
        })?;

    match (
        settings.cf_account_id.as_deref(),
        settings.cf_api_token.as_deref(),
    ) {
        (Some(account_id), Some(token)) if !token.contains("YOUR_KEY") => Ok(Credentials {
            account_id,
            token,
            model,
        }),
        _ => Err(CommandError::usage_for(
            "<b>Cloudflare API or Account ID not configured.</b>",
            timeouts::LONG,
        )),
    }
}

/// The prompt sent to the model and the one shown in the answer.
fn build_prompt(input: &str, replied: Option<&str>) -> Option<(String, String)> {
    match (replied, input.is_empty()) {
        (Some(context), false) => Some((format!("{context}\n\n\n{input}"), input.to_owned())),
        (Some(context), true) => Some((context.to_owned(), "-".to_owned())),
        (None, false) => Some((input.to_owned(), input.to_owned())),
        (None, true) => None,
    }
}

fn model_short_name(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

pub async fn ask(ctx: &CommandContext) -> Result<(), CommandError> {
    let creds = credentials(ctx.settings())?;
    let Some((prompt, shown)) = build_prompt(&ctx.input, ctx.replied_text()) else {
        return Err(CommandError::usage_for(
            format!(
                "<b>Usage:</b> {}ask [question]",
                escape(&ctx.settings().command_prefix)
            ),
            timeouts::MEDIUM,
        ));
    };

    let progress = ctx.reply("<code>Thinking...</code>").await?;

    let answer = match run_model(ctx, &creds, &prompt).await {
        Ok(answer) => answer,
        Err(CommandError::Http(HttpError::Timeout)) => {
            return ctx
                .edit_temp(
                    progress,
                    "<b>Error:</b> The request to the AI timed out.",
                    timeouts::LONG,
                )
                .await;
        }
        Err(e) => return ctx.edit_error(progress, e).await,
    };

    let text = format!(
        "<b>Prompt:</b> <i>{}</i>\n<pre language={}>{}</pre>",
        escape(&shown),
        model_short_name(creds.model),
        escape(answer.trim())
    );

    match &ctx.replied {
        Some(replied) => {
            ctx.api()
                .send_message(ctx.chat_id(), OutgoingMessage::new(text).reply_to(replied.id))
                .await?;
            ctx.api().delete_messages(ctx.chat_id(), &[progress]).await?;
        }
        None => ctx.edit(progress, text).await?,
    }
    Ok(())
}

async fn run_model(
    ctx: &CommandContext,
    creds: &Credentials<'_>,
    prompt: &str,
) -> Result<String, CommandError> {
    let url = format!(
        "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
        creds.account_id, creds.model
    );
    let body = RunRequest {
        messages: [
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        max_tokens: 2048,
    };

    let response: RunResponse = ctx
        .app
        .http
        .post(url)
        .bearer_auth(creds.token)
        .timeout(REQUEST_TIMEOUT)
        .json(&body)
        .read_json()
        .await?;

    match response {
        RunResponse {
            success: true,
            result: Some(result),
            ..
        } => Ok(result.response),
        RunResponse { errors, .. } => {
            let errors = if errors.is_empty() {
                "Unknown error".to_owned()
            } else {
                Value::Array(errors).to_string()
            };
            Err(CommandError::usage_for(
                format!("API Error: {}", escape(&errors)),
                timeouts::LONG,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_combines_reply_and_input() {
        assert_eq!(
            build_prompt("why?", Some("sky is blue")),
            Some(("sky is blue\n\n\nwhy?".to_owned(), "why?".to_owned()))
        );
        assert_eq!(
            build_prompt("", Some("sky is blue")),
            Some(("sky is blue".to_owned(), "-".to_owned()))
        );
        assert_eq!(
            build_prompt("hi", None),
            Some(("hi".to_owned(), "hi".to_owned()))
        );
        assert_eq!(build_prompt("", None), None);
    }

    #[test]
    fn test_placeholder_token_counts_as_unset() {
        let settings = BotSettings {
            text_ai_model: Some("@cf/meta/llama-3-8b-instruct".to_owned()),
            cf_account_id: Some("acc".to_owned()),
            cf_api_token: Some("YOUR_KEY_HERE".to_owned()),
            ..BotSettings::default()
        };
        let err = credentials(&settings).err().unwrap();
        assert!(err.to_string().contains("API or Account ID"));

        let settings = BotSettings {
            cf_api_token: Some("real".to_owned()),
            ..settings
        };
        assert!(credentials(&settings).is_ok());
    }

    #[test]
    fn test_missing_model_is_reported_first() {
        let err = credentials(&BotSettings::default()).err().unwrap();
        assert!(err.to_string().contains("Text Model"));
    }

    #[test]
    fn test_response_parsing() {
        let ok: RunResponse =
            serde_json::from_str(r#"{"success":true,"result":{"response":" hi "},"errors":[]}"#)
                .unwrap();
        assert_eq!(ok.result.unwrap().response, " hi ");

        let failed: RunResponse =
            serde_json::from_str(r#"{"success":false,"errors":[{"code":7003,"message":"bad"}]}"#)
                .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.errors.len(), 1);
        assert_eq!(model_short_name("@cf/meta/llama-3-8b-instruct"), "llama-3-8b-instruct");
    }
}
