//! `joininfo`: when a user joined the current group.

use crate::commands::{CommandContext, CommandError, Target};
use crate::config::timeouts;
use crate::telegram::TelegramError;
use crate::telegram::html::escape;

async fn target(ctx: &CommandContext) -> Result<Target, CommandError> {
    if let Some(sender) = ctx.replied.as_ref().and_then(|m| m.sender.clone()) {
        return Ok(Target {
            id: sender.id,
            user: Some(sender),
        });
    }
    let query = match ctx.input.split_whitespace().next() {
        Some(query) => query.to_owned(),
        None => ctx
            .message
            .sender_id()
            .unwrap_or(ctx.app.owner_id)
            .to_string(),
    };
    ctx.resolve_target(&query).await.map_err(|_| {
        CommandError::usage_for("Could not find the specified user.", timeouts::MEDIUM)
    })
}

pub async fn join_info(ctx: &CommandContext) -> Result<(), CommandError> {
    if !ctx.message.chat.is_group() {
        return Err(CommandError::usage_for(
            "This command can only be used in groups.",
            timeouts::MEDIUM,
        ));
    }

    let target = target(ctx).await?;
    let mention = target.mention();
    let member = match ctx.api().get_chat_member(ctx.chat_id(), target.id).await {
        Ok(member) => member,
        Err(TelegramError::UserNotParticipant) => None,
        Err(e) => {
            ctx.reply_temp(
                format!("<b>Error:</b> <code>{}</code>", escape(&e.to_string())),
                timeouts::LONG,
            )
            .await?;
            return Ok(());
        }
    };

    let text = match member {
        None => format!("User {mention} is not a member of this chat."),
        Some(member) => match member.joined_date {
            Some(joined) => format!(
                "{mention} joined this chat on:\n<code>{}</code>",
                joined.format("%d %b %Y, %H:%M UTC")
            ),
            None => format!("Could not retrieve a specific join date for {mention}."),
        },
    };
    ctx.reply(text).await?;
    Ok(())
}
