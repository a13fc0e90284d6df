//! `dkick`: delete the replied message and kick its sender.

use tracing::warn;

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::html::escape;

pub async fn dkick(ctx: &CommandContext) -> Result<(), CommandError> {
    let me = ctx.app.owner_id;
    let can_restrict = ctx
        .api()
        .get_chat_member(ctx.chat_id(), me)
        .await?
        .is_some_and(|m| m.can_restrict());
    if !can_restrict {
        return Err(CommandError::usage_for(
            "I need admin rights to perform this action.",
            timeouts::MEDIUM,
        ));
    }

    let Some(replied) = &ctx.replied else {
        return Err(CommandError::usage_for(
            "Reply to a message to delete it and kick its sender.",
            timeouts::LONG,
        ));
    };
    let Some(user) = replied.sender.clone() else {
        return Err(CommandError::usage_for(
            "Unable to extract user info.",
            timeouts::LONG,
        ));
    };

    let result = async {
        ctx.api()
            .delete_messages(ctx.chat_id(), &[replied.id])
            .await?;
        ctx.api().ban_member(ctx.chat_id(), user.id).await?;
        ctx.api().unban_member(ctx.chat_id(), user.id).await
    }
    .await;

    if let Err(e) = result {
        warn!("dkick of {} failed: {}", user.id, e);
        ctx.reply_temp(escape(&e.to_string()), timeouts::LONG).await?;
        return Ok(());
    }

    let reason = if ctx.input.is_empty() {
        "Not specified".to_owned()
    } else {
        escape(&ctx.input)
    };
    ctx.reply(format!("Kicked: {}\nReason: {reason}", user.mention()))
        .await?;
    Ok(())
}
