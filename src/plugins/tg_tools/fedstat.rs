//! `fstat`: ask every federation bot whether a user is fbanned.
//!
//! The bots are queried concurrently. A bot that offers a "fedban file"
//! gets its button pressed and the file is forwarded after the report.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::html::{escape, escape_pretty};
use crate::telegram::{
    ChatId, IncomingMessage, ListenError, MessageId, OutgoingMessage, TelegramError, UserId,
};

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(20);
const FILE_TIMEOUT: Duration = Duration::from_secs(15);
const FILE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const FILE_BUTTON: &str = "Make the fedban file";

const NOT_BANNED_PHRASES: [&str; 6] = [
    "no bans",
    "not banned",
    "hasn't been banned",
    "0 federation(s)!",
    "isn’t fbanned",
    "fbanned anywhere!",
];

/// One bot's line in the report plus a file to forward, if it sent one.
#[derive(Debug, PartialEq, Eq)]
pub struct BotReport {
    pub line: String,
    pub file: Option<(ChatId, MessageId)>,
}

impl BotReport {
    fn text(line: String) -> Self {
        Self { line, file: None }
    }
}

/// Report line for a plain text answer of `bot_name`.
pub fn classify_response(bot_name: &str, text: &str) -> String {
    let lower = text.to_lowercase();
    if NOT_BANNED_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        format!("<b>• {}:</b> <i>Not Banned</i>", escape(bot_name))
    } else {
        format!(
            "<b>• {}:</b> <blockquote expandable>{}</blockquote>",
            escape(bot_name),
            escape_pretty(text)
        )
    }
}

/// Waits for the next message of `bot` in its private chat.
async fn next_response(
    ctx: &CommandContext,
    bot: UserId,
    send: Option<String>,
) -> Result<IncomingMessage, CommandError> {
    let subscription = ctx
        .app
        .listeners
        .listen(bot, move |m| m.sender_id() == Some(bot))
        .await;
    if let Some(text) = send {
        ctx.app.fanout.wait_and_acquire().await;
        ctx.api().send_message(bot, OutgoingMessage::new(text)).await?;
    }
    Ok(subscription.recv(RESPONSE_TIMEOUT).await?)
}

/// Polls the bot chat for a document newer than `after`.
async fn find_file(ctx: &CommandContext, bot: UserId, after: MessageId) -> Option<MessageId> {
    let deadline = Instant::now() + FILE_TIMEOUT;
    while Instant::now() < deadline {
        match ctx.api().history(bot, 1).await {
            Ok(history) => {
                let file = history.into_iter().find(|m| {
                    m.id > after && m.media.as_ref().is_some_and(|media| media.is_document())
                });
                if let Some(file) = file {
                    return Some(file.id);
                }
            }
            Err(e) => debug!("History of {} unavailable: {}", bot, e),
        }
        tokio::time::sleep(FILE_POLL_INTERVAL).await;
    }
    None
}

async fn query_bot(ctx: &CommandContext, bot: UserId, user: UserId) -> BotReport {
    let bot_name = match ctx.api().resolve_user(&bot.to_string()).await {
        Ok(Some(info)) => info.first_name,
        Ok(None) | Err(TelegramError::PeerNotFound(_)) => {
            return BotReport::text(format!(
                "<b>• ID <code>{bot}</code>:</b> <i>Could not contact bot. (Have you started chat with him before?)</i>"
            ));
        }
        Err(e) => {
            return BotReport::text(format!(
                "<b>• ID <code>{bot}</code>:</b> <i>An unknown error occurred while getting bot info: {}</i>",
                escape(&e.to_string())
            ));
        }
    };
    let name = escape(&bot_name);

    let result = async {
        let mut response = next_response(ctx, bot, Some(format!("/fbanstat {user}"))).await?;
        if response.text.to_lowercase().contains("checking") {
            response = next_response(ctx, bot, None).await?;
        }
        Ok::<_, CommandError>(response)
    }
    .await;

    let response = match result {
        Ok(response) => response,
        Err(CommandError::Listen(ListenError::Timeout(_))) => {
            return BotReport::text(format!("<b>• {name}:</b> <i>No response (timeout).</i>"));
        }
        Err(CommandError::Telegram(TelegramError::PeerNotFound(_))) => {
            return BotReport::text(format!(
                "<b>• {name}:</b> <i>The bot is blocked or unreachable.</i>"
            ));
        }
        Err(CommandError::Telegram(TelegramError::Invocation(e))) if e.contains("BLOCKED") => {
            return BotReport::text(format!(
                "<b>• {name}:</b> <i>The bot is blocked or unreachable.</i>"
            ));
        }
        Err(e) => {
            warn!("Fed stat query to {} failed: {}", bot, e);
            return BotReport::text(format!("<b>• {name}:</b> <i>An unknown error occurred.</i>"));
        }
    };

    if let Some(button) = response.button_index(FILE_BUTTON) {
        if let Err(e) = ctx.api().click_button(bot, response.id, button).await {
            debug!("Could not press the file button of {}: {}", bot, e);
        }
        return match find_file(ctx, bot, response.id).await {
            Some(file) => BotReport {
                line: format!(
                    "<b>• {name}:</b> <i>The bot sent a file with the full ban list. Forwarding...</i>"
                ),
                file: Some((bot, file)),
            },
            None => BotReport::text(format!(
                "<b>• {name}:</b> <blockquote expandable>You can only use fed commands once every 5 minutes.</blockquote>"
            )),
        };
    }

    if response.text.is_empty() {
        return BotReport::text(format!(
            "<b>• {name}:</b> <i>Received an unsupported response type.</i>"
        ));
    }
    let sender = response.sender.map_or(bot_name, |s| s.first_name);
    BotReport::text(classify_response(&sender, &response.text))
}

pub async fn fed_stat(ctx: &CommandContext) -> Result<(), CommandError> {
    let progress = ctx.reply("<code>Checking fedstat...</code>").await?;

    let target = match ctx.target_or(Some(ctx.app.owner_id)).await {
        Ok(target) => target,
        Err(e) => {
            return ctx
                .edit_temp(
                    progress,
                    format!(
                        "<b>Error:</b> Could not find the specified user.\n<code>{}</code>",
                        escape(&e.to_string())
                    ),
                    timeouts::MEDIUM,
                )
                .await;
        }
    };

    let reports = join_all(
        ctx.settings()
            .fed_bots
            .iter()
            .map(|bot| query_bot(ctx, *bot, target.id)),
    )
    .await;

    let lines: Vec<&str> = reports.iter().map(|r| r.line.as_str()).collect();
    let report = format!(
        "<b>Federation Status for:</b> {}\n<b>User ID:</b> <code>{}</code>\n\n{}",
        target.mention(),
        target.id,
        lines.join("\n")
    );
    ctx.edit_with(progress, OutgoingMessage::new(report).no_preview())
        .await?;

    for (chat, file) in reports.iter().filter_map(|r| r.file) {
        ctx.api()
            .forward_messages(ctx.chat_id(), chat, &[file])
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app_with};
    use crate::config::BotSettings;
    use crate::telegram::UserInfo;
    use crate::telegram::mock::{MockApi, incoming};
    use crate::telegram::types::{MediaInfo, MediaKind};

    const BOT_A: UserId = 500;
    const BOT_B: UserId = 600;

    fn bot_message(bot: UserId, id: MessageId, text: &str) -> IncomingMessage {
        let mut message = incoming(bot, id, text);
        message.outgoing = false;
        message.sender = Some(UserInfo::new(bot, format!("Bot{bot}")));
        message
    }

    fn setup() -> (Arc<MockApi>, BotSettings) {
        let api = Arc::new(MockApi::new());
        api.add_user(UserInfo::new(BOT_A, "BotA"));
        api.add_user(UserInfo::new(BOT_B, "BotB"));
        api.add_user(UserInfo::new(777, "Target"));
        let settings = BotSettings {
            fed_bots: vec![BOT_A, BOT_B],
            ..BotSettings::default()
        };
        (api, settings)
    }

    #[test]
    fn test_classify_response() {
        assert_eq!(
            classify_response("Rose", "User is not banned in any fed"),
            "<b>• Rose:</b> <i>Not Banned</i>"
        );
        assert_eq!(
            classify_response("Rose", "Banned in 'Spam' fed"),
            "<b>• Rose:</b> <blockquote expandable>Banned in ’Spam’ fed</blockquote>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_answers_and_timeouts_are_reported_in_order() {
        let (api, settings) = setup();
        let (app, _dir) = test_app_with(api.clone(), settings);

        let ctx = context(&app, BotCommand::FedStat, incoming(-5, 1, ".fstat 777"), "777", None);
        let listeners = Arc::clone(&app.listeners);
        let bot = tokio::spawn(async move {
            while !listeners.offer(&bot_message(BOT_B, 10, "Checking...")).await {
                tokio::task::yield_now().await;
            }
            while !listeners.offer(&bot_message(BOT_B, 11, "No bans found")).await {
                tokio::task::yield_now().await;
            }
        });

        fed_stat(&ctx).await.unwrap();
        bot.await.unwrap();

        let report = api.last_text();
        assert!(report.starts_with("<b>Federation Status for:</b> <a href='tg://user?id=777'>Target</a>"));
        assert!(report.ends_with(
            "<b>• BotA:</b> <i>No response (timeout).</i>\n<b>• Bot600:</b> <i>Not Banned</i>"
        ));
        let sent_to: Vec<_> = api.recorded.lock().unwrap().sent.iter().map(|(c, _, _)| *c).collect();
        assert!(sent_to.contains(&BOT_A) && sent_to.contains(&BOT_B));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fedban_file_is_forwarded() {
        let (api, mut settings) = setup();
        settings.fed_bots = vec![BOT_A];
        let mut file = bot_message(BOT_A, 21, "");
        file.media = Some(MediaInfo {
            kind: MediaKind::Document,
            file_name: Some("fbans.csv".to_owned()),
            mime_type: None,
            size: 10,
        });
        api.script.lock().unwrap().history.insert(BOT_A, vec![file]);
        let (app, _dir) = test_app_with(api.clone(), settings);

        let ctx = context(&app, BotCommand::FedStat, incoming(-5, 1, ".fstat 777"), "777", None);
        let listeners = Arc::clone(&app.listeners);
        let bot = tokio::spawn(async move {
            let mut offer = bot_message(BOT_A, 20, "Banned in 40 feds");
            offer.buttons = vec![FILE_BUTTON.to_owned()];
            while !listeners.offer(&offer).await {
                tokio::task::yield_now().await;
            }
        });

        fed_stat(&ctx).await.unwrap();
        bot.await.unwrap();

        let recorded = api.recorded.lock().unwrap();
        assert_eq!(recorded.clicks, vec![(BOT_A, 20, 0)]);
        assert_eq!(recorded.forwarded, vec![(-5, BOT_A, vec![21])]);
        assert!(recorded.last_text.contains("Forwarding..."));
    }
}
