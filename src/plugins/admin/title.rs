//! `title`: set or clear an administrator's custom title.

use crate::commands::{CommandContext, CommandError, Target};
use crate::config::timeouts;
use crate::telegram::html::escape;
use crate::telegram::types::MemberStatus;

pub async fn set_title(ctx: &CommandContext) -> Result<(), CommandError> {
    if !ctx.message.chat.is_group() {
        return Err(CommandError::usage_for(
            "This command can only be used in groups.",
            timeouts::MEDIUM,
        ));
    }

    let can_promote = ctx
        .api()
        .get_chat_member(ctx.chat_id(), ctx.app.owner_id)
        .await?
        .is_some_and(|m| m.can_promote());
    if !can_promote {
        return Err(CommandError::usage_for(
            "I need to be an admin with 'Promote Members' rights to do this.",
            timeouts::MEDIUM,
        ));
    }

    let (target, title) = target_and_title(ctx).await?;

    let status = ctx
        .api()
        .get_chat_member(ctx.chat_id(), target.id)
        .await?
        .map(|m| m.status);
    match status {
        Some(MemberStatus::Owner) => {
            return Err(CommandError::usage_for(
                "You cannot change the title of the group owner.",
                timeouts::MEDIUM,
            ));
        }
        Some(MemberStatus::Administrator) => {}
        _ => {
            return Err(CommandError::usage_for(
                "This user is not an administrator.",
                timeouts::MEDIUM,
            ));
        }
    }

    if let Err(e) = ctx
        .api()
        .set_admin_title(ctx.chat_id(), target.id, &title)
        .await
    {
        ctx.reply_temp(
            format!(
                "<b>Error:</b> Could not set title. <code>{}</code>",
                escape(&e.to_string())
            ),
            timeouts::LONG,
        )
        .await?;
        return Ok(());
    }

    let text = if title.is_empty() {
        format!("Successfully removed custom title from {}.", target.mention())
    } else {
        format!(
            "Successfully set title for {} to '<code>{}</code>'.",
            target.mention(),
            escape(&title)
        )
    };
    ctx.reply(text).await?;
    Ok(())
}

/// With a reply the whole input is the title, otherwise the first word
/// names the user.
async fn target_and_title(ctx: &CommandContext) -> Result<(Target, String), CommandError> {
    if let Some(user) = ctx.replied.as_ref().and_then(|m| m.sender.clone()) {
        return Ok((
            Target {
                id: user.id,
                user: Some(user),
            },
            ctx.input.clone(),
        ));
    }

    let (query, title) = ctx
        .input
        .split_once(' ')
        .map_or((ctx.input.as_str(), ""), |(q, t)| (q, t.trim()));
    if query.is_empty() {
        return Err(CommandError::usage_for(
            "You need to specify a user (reply, ID, or username).",
            timeouts::MEDIUM,
        ));
    }
    let target = ctx.resolve_target(query).await?;
    Ok((target, title.to_owned()))
}
