//! `q`: turn messages into a quote sticker through @QuotLyBot.

use std::time::Duration;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::html::escape;
use crate::telegram::{ListenError, UserId};

pub const QUOTLY_BOT_ID: UserId = 1_031_952_739;
const QUOTLY_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_MESSAGES: i32 = 15;

/// Number of messages to quote from the command input.
fn message_count(input: &str) -> i32 {
    input
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| i32::try_from(n).ok())
        .map_or(1, |n| n.clamp(1, MAX_MESSAGES))
}

pub async fn quote(ctx: &CommandContext) -> Result<(), CommandError> {
    let Some(replied) = &ctx.replied else {
        return Err(CommandError::usage_for(
            "Please reply to a message to quote.",
            timeouts::MEDIUM,
        ));
    };

    let count = message_count(&ctx.input);
    let progress = ctx
        .reply(format!("<code>Fetching {count} message(s)...</code>"))
        .await?;
    let ids: Vec<_> = (replied.id..replied.id + count).collect();

    let result = async {
        let subscription = ctx
            .app
            .listeners
            .listen(QUOTLY_BOT_ID, |m| m.sender_id() == Some(QUOTLY_BOT_ID))
            .await;
        ctx.api()
            .forward_messages(QUOTLY_BOT_ID, ctx.chat_id(), &ids)
            .await?;
        ctx.edit(progress, "<code>Waiting for @QuotLyBot's response...</code>")
            .await?;

        let sticker = subscription.recv(QUOTLY_TIMEOUT).await?;
        ctx.api()
            .copy_message(ctx.chat_id(), QUOTLY_BOT_ID, sticker.id, None)
            .await?;
        Ok::<_, CommandError>(())
    }
    .await;

    match result {
        Ok(()) => {
            ctx.api().delete_messages(ctx.chat_id(), &[progress]).await?;
            Ok(())
        }
        Err(CommandError::Listen(ListenError::Timeout(_))) => {
            ctx.edit_temp(
                progress,
                "<b>Error:</b> @QuotLyBot did not respond in time.",
                timeouts::LONG,
            )
            .await
        }
        Err(e) => {
            ctx.edit_temp(
                progress,
                format!(
                    "<b>Error:</b> Could not get a quote.\n<code>{}</code>",
                    escape(&e.to_string())
                ),
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
    use crate::telegram::UserInfo;
    use crate::telegram::mock::{MockApi, incoming};

    #[test]
    fn test_message_count() {
        assert_eq!(message_count(""), 1);
        assert_eq!(message_count("4"), 4);
        assert_eq!(message_count("40"), 15);
        assert_eq!(message_count("0"), 1);
        assert_eq!(message_count("abc"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticker_is_copied_back() {
        let api = Arc::new(MockApi::new());
        let mut sticker = incoming(QUOTLY_BOT_ID, 77, "");
        sticker.outgoing = false;
        sticker.sender = Some(UserInfo::new(QUOTLY_BOT_ID, "QuotLy"));
        api.add_message(sticker.clone());
        let (app, _dir) = test_app(api.clone());

        let ctx = context(&app, BotCommand::Quote, incoming(-5, 10, ".q 3"), "3", Some(incoming(-5, 4, "hi")));
        let listeners = Arc::clone(&app.listeners);
        let bot = tokio::spawn(async move {
            while !listeners.offer(&sticker).await {
                tokio::task::yield_now().await;
            }
        });

        quote(&ctx).await.unwrap();
        bot.await.unwrap();

        let recorded = api.recorded.lock().unwrap();
        assert_eq!(recorded.forwarded, vec![(QUOTLY_BOT_ID, -5, vec![4, 5, 6])]);
        assert_eq!(recorded.copied, vec![(-5, QUOTLY_BOT_ID, 77)]);
        assert_eq!(recorded.deleted, vec![(-5, 1001)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_bot_times_out() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());

        let ctx = context(&app, BotCommand::Quote, incoming(-5, 10, ".q"), "", Some(incoming(-5, 4, "hi")));
        quote(&ctx).await.unwrap();
        assert_eq!(api.last_text(), "<b>Error:</b> @QuotLyBot did not respond in time.");
        assert_eq!(app.listeners.pending_count().await, 0);
    }
}
