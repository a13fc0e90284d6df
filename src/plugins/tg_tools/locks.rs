//! `lock`, `unlock` and `locktypes`: toggle what members may do in a group.

use crate::commands::{CommandContext, CommandError};
use crate::config::timeouts;
use crate::telegram::ChatPermissions;
use crate::telegram::html::escape;

/// Lock names with the description shown by `locktypes`.
pub const LOCK_TYPES: [(&str, &str); 8] = [
    ("msg", "Send Messages"),
    ("media", "Send Media Messages"),
    ("stickers", "Send Other Messages"),
    ("polls", "Send Polls"),
    ("links", "Add Web Page Previews"),
    ("invite", "Invite Users"),
    ("pin", "Pin Messages"),
    ("info", "Change Info"),
];

/// Types restored by `unlock all`; pin and info stay admin-only.
const UNLOCK_ALL: [&str; 6] = ["msg", "media", "stickers", "polls", "links", "invite"];

fn flag<'a>(perms: &'a mut ChatPermissions, lock: &str) -> Option<&'a mut bool> {
    Some(match lock {
        "msg" => &mut perms.send_messages,
        "media" => &mut perms.send_media,
        "stickers" => &mut perms.send_other,
        "polls" => &mut perms.send_polls,
        "links" => &mut perms.embed_links,
        "invite" => &mut perms.invite_users,
        "pin" => &mut perms.pin_messages,
        "info" => &mut perms.change_info,
        _ => return None,
    })
}

/// Outcome of applying a lock request to a permission set.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LockChange {
    pub changed: Vec<String>,
    pub unknown: Vec<String>,
}

/// Applies `input` (space separated types or `all`) to `perms`.
pub fn apply_locks(perms: &mut ChatPermissions, input: &str, lock: bool) -> LockChange {
    let input = input.to_lowercase();
    let requested: Vec<String> = if input.trim() == "all" {
        if lock {
            LOCK_TYPES.iter().map(|(name, _)| (*name).to_owned()).collect()
        } else {
            UNLOCK_ALL.iter().map(|name| (*name).to_owned()).collect()
        }
    } else {
        input.split_whitespace().map(str::to_owned).collect()
    };

    let mut change = LockChange::default();
    for name in requested {
        match flag(perms, &name) {
            Some(allowed) => {
                *allowed = !lock;
                change.changed.push(name);
            }
            None => change.unknown.push(name),
        }
    }
    change
}

pub async fn change_lock(ctx: &CommandContext, lock: bool) -> Result<(), CommandError> {
    let chat = ctx.chat_id();
    if !ctx.message.chat.is_group() {
        return Err(CommandError::usage_for(
            "This command can only be used in groups.",
            timeouts::MEDIUM,
        ));
    }

    let me = ctx.api().get_chat_member(chat, ctx.app.owner_id).await?;
    if !me.is_some_and(|m| m.can_restrict()) {
        return Err(CommandError::usage_for(
            "I need admin rights to change chat permissions.",
            timeouts::MEDIUM,
        ));
    }

    if ctx.input.trim().is_empty() {
        return Err(CommandError::usage_for(
            "You need to specify what to lock/unlock.",
            timeouts::MEDIUM,
        ));
    }

    let mut perms = ctx.api().chat_permissions(chat).await?;
    let change = apply_locks(&mut perms, &ctx.input, lock);
    if change.changed.is_empty() {
        return Err(CommandError::usage_for(
            format!(
                "Invalid lock type(s): <code>{}</code>",
                escape(&change.unknown.join(" "))
            ),
            timeouts::MEDIUM,
        ));
    }

    if let Err(e) = ctx.api().set_chat_permissions(chat, perms).await {
        ctx.reply(format!(
            "<b>Error:</b> Could not change permissions. <code>{}</code>",
            escape(&e.to_string())
        ))
        .await?;
        return Ok(());
    }

    let action = if lock { "Locked" } else { "Unlocked" };
    let mut text = format!("<b>{action}:</b> <code>{}</code>", change.changed.join(" "));
    if !change.unknown.is_empty() {
        text.push_str(&format!(
            "\n<b>Not found:</b> <code>{}</code>",
            escape(&change.unknown.join(" "))
        ));
    }
    ctx.reply_temp(text, timeouts::MEDIUM).await?;
    Ok(())
}

pub async fn lock_types(ctx: &CommandContext) -> Result<(), CommandError> {
    let mut text = String::from("<b>Available Lock Types:</b>\n\n");
    for (name, description) in LOCK_TYPES {
        text.push_str(&format!("• <code>{name}</code> - {description}\n"));
    }
    text.push_str("\nUse <code>all</code> to affect all types at once.");
    ctx.reply(text).await?;
    Ok(())
}
