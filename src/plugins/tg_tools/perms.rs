//! `perms [chat] [user]`: a member's status and rights in a group.

use crate::commands::{CommandContext, CommandError, Target};
use crate::telegram::html::escape;
use crate::telegram::types::MemberStatus;
use crate::telegram::{ChatInfo, ChatMember, OutgoingMessage, TelegramError};

const NOT_FOUND: &str = "Could not find the specified chat or user. Please check the ID/username.";

/// Splits the arguments into a chat query and a user query.
///
/// `None` for the chat means the current chat; `None` for the user means
/// the replied sender, else the command sender.
fn split_args(input: &str, has_reply: bool) -> (Option<&str>, Option<&str>) {
    let args: Vec<&str> = input.split_whitespace().collect();
    match args.as_slice() {
        [chat, user, ..] => (Some(*chat), Some(*user)),
        [chat] if has_reply => (Some(*chat), None),
        [user] => (None, Some(*user)),
        [] => (None, None),
    }
}

fn bullet_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|item| format!("  – {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Report lines for `member` of `chat`.
pub fn render_permissions(target: &Target, chat: &ChatInfo, member: &ChatMember) -> String {
    let mut lines = vec![
        format!("<b>Permissions for {}</b>", target.mention()),
        format!("<b>in Chat:</b> {}\n", escape(chat.display_title())),
        format!("• <b>Status:</b> {}", member.status.label()),
    ];
    if let Some(title) = &member.custom_title {
        lines.push(format!("• <b>Custom Title:</b> {}", escape(title)));
    }

    match member.status {
        MemberStatus::Administrator => {
            let granted = member.admin_rights.unwrap_or_default().granted();
            if granted.is_empty() {
                lines.push("• <b>Permissions:</b> None".to_owned());
            } else {
                lines.push(format!(
                    "• <b>Permissions:</b>\n<blockquote expandable>{}</blockquote>",
                    bullet_list(&granted)
                ));
            }
        }
        MemberStatus::Owner => lines.push(
            "• <b>Permissions:</b>\n<blockquote expandable>  – All Permissions (Creator)</blockquote>"
                .to_owned(),
        ),
        MemberStatus::Restricted => {
            if let Some(permissions) = member.permissions {
                let denied = permissions.denied();
                if !denied.is_empty() {
                    lines.push(format!(
                        "• <b>Restrictions (Cannot):</b>\n<blockquote expandable>{}</blockquote>",
                        bullet_list(&denied)
                    ));
                }
            }
            let until = member.until_date.map_or_else(
                || "Forever".to_owned(),
                |until| until.format("%d %b %Y, %H:%M UTC").to_string(),
            );
            lines.push(format!("• <b>Restricted Until:</b> {until}"));
        }
        MemberStatus::Member | MemberStatus::Left | MemberStatus::Banned => {}
    }
    lines.join("\n")
}

async fn find_chat(ctx: &CommandContext, query: Option<&str>) -> Result<ChatInfo, CommandError> {
    let Some(query) = query else {
        return Ok(ctx.message.chat.clone());
    };
    ctx.api()
        .resolve_chat(query)
        .await?
        .ok_or_else(|| CommandError::usage(NOT_FOUND))
}

async fn find_user(ctx: &CommandContext, query: Option<&str>) -> Result<Target, CommandError> {
    if let Some(query) = query {
        return ctx
            .resolve_target(query)
            .await
            .map_err(|_| CommandError::usage(NOT_FOUND));
    }
    let sender = ctx
        .replied
        .as_ref()
        .and_then(|m| m.sender.clone())
        .or_else(|| ctx.message.sender.clone());
    match sender {
        Some(user) => Ok(Target {
            id: user.id,
            user: Some(user),
        }),
        None => Err(CommandError::usage(NOT_FOUND)),
    }
}

pub async fn permissions(ctx: &CommandContext) -> Result<(), CommandError> {
    let (chat_query, user_query) = split_args(&ctx.input, ctx.replied.is_some());
    let chat = find_chat(ctx, chat_query).await?;
    let target = find_user(ctx, user_query).await?;

    let member = match ctx.api().get_chat_member(chat.id, target.id).await {
        Ok(member) => member,
        Err(TelegramError::UserNotParticipant) => None,
        Err(e) => {
            ctx.reply(format!(
                "An error occurred: <code>{}</code>",
                escape(&e.to_string())
            ))
            .await?;
            return Ok(());
        }
    };
    let Some(member) = member else {
        ctx.reply(format!(
            "User {} is not a member of the chat {}.",
            target.mention(),
            escape(chat.display_title())
        ))
        .await?;
        return Ok(());
    };

    ctx.reply_with(OutgoingMessage::new(render_permissions(&target, &chat, &member)).no_preview())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};
    use crate::telegram::types::{AdminRights, ChatKind};
    use crate::telegram::{ChatPermissions, UserInfo};

    fn group() -> ChatInfo {
        ChatInfo {
            id: -5,
            kind: ChatKind::Supergroup,
            title: Some("Test Group".to_owned()),
            username: None,
        }
    }

    fn target(id: i64) -> Target {
        Target {
            id,
            user: Some(UserInfo::new(id, "Eve")),
        }
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("", false), (None, None));
        assert_eq!(split_args("@eve", false), (None, Some("@eve")));
        assert_eq!(split_args("@chat", true), (Some("@chat"), None));
        assert_eq!(split_args("@chat @eve", false), (Some("@chat"), Some("@eve")));
    }

    #[test]
    fn test_admin_rights_are_listed() {
        let mut member = ChatMember::new(UserInfo::new(7, "Eve"), MemberStatus::Administrator);
        member.custom_title = Some("mod".to_owned());
        member.admin_rights = Some(AdminRights {
            delete_messages: true,
            pin_messages: true,
            ..AdminRights::default()
        });
        let text = render_permissions(&target(7), &group(), &member);
        assert!(text.contains("• <b>Status:</b> Administrator"));
        assert!(text.contains("• <b>Custom Title:</b> mod"));
        assert!(text.ends_with(
            "<blockquote expandable>  – Delete Messages\n  – Pin Messages</blockquote>"
        ));
    }

    #[test]
    fn test_restrictions_and_expiry() {
        let mut member = ChatMember::new(UserInfo::new(7, "Eve"), MemberStatus::Restricted);
        member.permissions = Some(ChatPermissions {
            send_media: false,
            ..ChatPermissions::all_allowed()
        });
        let text = render_permissions(&target(7), &group(), &member);
        assert!(text.contains("<blockquote expandable>  – Send Media</blockquote>"));
        assert!(text.ends_with("• <b>Restricted Until:</b> Forever"));

        member.until_date = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).single();
        let text = render_permissions(&target(7), &group(), &member);
        assert!(text.ends_with("• <b>Restricted Until:</b> 02 Jan 2030, 03:04 UTC"));
    }

    #[tokio::test]
    async fn test_own_permissions_in_current_chat() {
        let api = Arc::new(MockApi::new());
        api.add_member(-5, ChatMember::new(UserInfo::new(1, "Owner"), MemberStatus::Owner));
        let (app, _dir) = test_app(api.clone());

        let ctx = context(&app, BotCommand::Permissions, incoming(-5, 1, ".perms"), "", None);
        permissions(&ctx).await.unwrap();
        let text = api.last_text();
        assert!(text.starts_with("<b>Permissions for <a href='tg://user?id=1'>Owner</a></b>"));
        assert!(text.contains("All Permissions (Creator)"));
    }

    #[tokio::test]
    async fn test_unknown_chat() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api);

        let ctx = context(&app, BotCommand::Permissions, incoming(-5, 1, ".perms @nowhere 7"), "@nowhere 7", None);
        let err = permissions(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), NOT_FOUND);
    }
}
