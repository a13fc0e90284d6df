//! `fc`: who originally sent a forwarded message.

use std::time::Duration;

use crate::commands::{CommandContext, CommandError};
use crate::telegram::OutgoingMessage;
use crate::telegram::html::escape;
use crate::telegram::types::{ChatKind, ForwardOrigin};

const NOTICE_DELAY: Duration = Duration::from_secs(8);

/// Info lines describing where a forward came from.
pub fn describe_origin(origin: &ForwardOrigin) -> String {
    let mut lines = vec!["<b>Forward Origin Info:</b>".to_owned()];
    match origin {
        ForwardOrigin::User(user) if user.is_deleted => {
            lines.push("• <b>Type:</b> Deleted Account 💀".to_owned());
            lines.push(format!("• <b>ID:</b> <code>{}</code>", user.id));
            lines.push("• <b>Name:</b> Deleted Account".to_owned());
        }
        ForwardOrigin::User(user) => {
            lines.push("• <b>Type:</b> User 👤".to_owned());
            lines.push(format!("• <b>ID:</b> <code>{}</code>", user.id));
            lines.push(format!("• <b>Name:</b> {}", escape(&user.full_name())));
            if let Some(username) = &user.username {
                lines.push(format!("• <b>Username:</b> @{username}"));
            }
            lines.push(format!("• <b>Profile Link:</b> {}", user.mention_as("Click Here")));
        }
        ForwardOrigin::Chat(chat) => {
            let kind = if chat.kind == ChatKind::Channel {
                "Channel 📢"
            } else {
                "Group 👥"
            };
            lines.push(format!("• <b>Type:</b> {kind}"));
            lines.push(format!("• <b>ID:</b> <code>{}</code>", chat.id));
            lines.push(format!("• <b>Name:</b> {}", escape(chat.display_title())));
            match &chat.username {
                Some(username) => {
                    lines.push(format!("• <b>Username:</b> @{username}"));
                    lines.push(format!(
                        "• <b>Chat Link:</b> <a href='https://t.me/{username}'>Click Here</a>"
                    ));
                }
                None => lines.push("• <b>Chat Link:</b> Not available (private)".to_owned()),
            }
        }
        ForwardOrigin::Hidden(name) => {
            lines.push("• <b>Type:</b> Hidden Account 🙈".to_owned());
            lines.push(format!("• <b>Name:</b> {}", escape(name)));
        }
    }
    lines.join("\n")
}

pub async fn fetch_creator(ctx: &CommandContext) -> Result<(), CommandError> {
    let Some(replied) = &ctx.replied else {
        return Err(CommandError::usage_for("Please reply to a message.", NOTICE_DELAY));
    };
    let Some(origin) = &replied.forward else {
        return Err(CommandError::usage_for(
            "The replied-to message is not a forward.",
            NOTICE_DELAY,
        ));
    };

    ctx.api()
        .send_message(
            ctx.chat_id(),
            OutgoingMessage::new(describe_origin(origin)).reply_to(replied.id),
        )
        .await?;
    ctx.delete_command().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::BotCommand;
    use crate::commands::testing::{context, test_app};
    use crate::telegram::mock::{MockApi, incoming};
    use crate::telegram::{ChatInfo, UserInfo};

    #[test]
    fn test_describe_user_origin() {
        let mut user = UserInfo::new(5, "Ann");
        user.username = Some("ann".to_owned());
        let text = describe_origin(&ForwardOrigin::User(user));
        assert!(text.contains("• <b>Type:</b> User 👤"));
        assert!(text.contains("• <b>Username:</b> @ann"));
        assert!(text.contains("<a href='tg://user?id=5'>Click Here</a>"));
    }

    #[test]
    fn test_describe_private_channel() {
        let chat = ChatInfo {
            id: -1_000_000_000_007,
            kind: ChatKind::Channel,
            title: Some("News".to_owned()),
            username: None,
        };
        let text = describe_origin(&ForwardOrigin::Chat(chat));
        assert!(text.contains("Channel 📢"));
        assert!(text.ends_with("• <b>Chat Link:</b> Not available (private)"));
    }

    #[test]
    fn test_describe_deleted_account() {
        let mut user = UserInfo::new(9, "x");
        user.is_deleted = true;
        let text = describe_origin(&ForwardOrigin::User(user));
        assert!(text.contains("Deleted Account 💀"));
        assert!(!text.contains("Profile Link"));
    }

    #[tokio::test]
    async fn test_reply_goes_to_forwarded_message() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let mut forwarded = incoming(-5, 3, "fwd");
        forwarded.forward = Some(ForwardOrigin::Hidden("Secret".to_owned()));

        let ctx = context(&app, BotCommand::FetchCreator, incoming(-5, 4, ".fc"), "", Some(forwarded));
        fetch_creator(&ctx).await.unwrap();

        let recorded = api.recorded.lock().unwrap();
        assert_eq!(recorded.sent[0].2.reply_to, Some(3));
        assert!(recorded.sent[0].2.html.ends_with("• <b>Name:</b> Secret"));
        assert_eq!(recorded.deleted, vec![(-5, 4)]);
    }

    #[tokio::test]
    async fn test_plain_message_is_rejected() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api);

        let ctx = context(&app, BotCommand::FetchCreator, incoming(-5, 4, ".fc"), "", Some(incoming(-5, 3, "hi")));
        let err = fetch_creator(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "The replied-to message is not a forward.");
    }
}
