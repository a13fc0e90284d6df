//! Command handler implementation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::context::{AppState, CommandContext};
use super::error::CommandError;
use super::types::BotCommand;
use crate::config::timeouts;
use crate::plugins;
use crate::telegram::html::{escape, truncate_for_log};
use crate::telegram::IncomingMessage;

/// Turns incoming messages into command invocations.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    app: Arc<AppState>,
}

impl CommandHandler {
    #[must_use]
    pub const fn new(app: Arc<AppState>) -> Self {
        Self { app }
    }

    /// Tries to parse and run a command from a message.
    ///
    /// Returns `None` if the message is not a command or the sender may not
    /// run it, otherwise the command that ran and its outcome.
    pub async fn try_handle(
        &self,
        message: IncomingMessage,
    ) -> Option<(BotCommand, Result<(), CommandError>)> {
        let parsed = BotCommand::parse(&message.text, &self.app.settings.command_prefix)?;

        let authorized = message.outgoing
            || message
                .sender_id()
                .is_some_and(|id| self.app.is_privileged(id));
        if !authorized {
            return None;
        }

        let ctx = self.build_context(parsed.command, parsed.input, message).await;
        if parsed.command.owner_only() && !ctx.issued_by_owner() {
            debug!("Ignoring owner-only command {} from sudo user", parsed.command);
            return None;
        }

        info!(
            "Running {} in {} (input: {:?})",
            ctx.command,
            ctx.chat_id(),
            truncate_for_log(&ctx.input, 50)
        );
        let result = plugins::dispatch(&ctx).await;
        if let Err(e) = &result {
            self.report(&ctx, e).await;
        }
        Some((ctx.command, result))
    }

    async fn build_context(
        &self,
        command: BotCommand,
        input: String,
        message: IncomingMessage,
    ) -> CommandContext {
        let replied = match message.reply_to {
            Some(id) => match self.app.api.get_message(message.chat.id, id).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Could not fetch replied message {}: {}", id, e);
                    None
                }
            },
            None => None,
        };

        CommandContext {
            app: Arc::clone(&self.app),
            command,
            message,
            input,
            replied,
        }
    }

    /// Logs a failed command and tells the chat about it.
    async fn report(&self, ctx: &CommandContext, err: &CommandError) {
        let (text, delay) = match err {
            CommandError::Usage { message, delay } => {
                debug!("{} rejected input: {}", ctx.command, message);
                (message.clone(), *delay)
            }
            other => {
                error!("{} failed in {}: {}", ctx.command, ctx.chat_id(), other);
                (
                    format!("<b>Error:</b> <code>{}</code>", escape(&other.to_string())),
                    timeouts::LONG,
                )
            }
        };

        if let Err(e) = ctx.reply_temp(text, delay).await {
            warn!("Could not report error for {}: {}", ctx.command, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::test_app;
    use crate::telegram::mock::{incoming, MockApi};
    use crate::telegram::UserInfo;

    #[tokio::test]
    async fn test_non_command_is_ignored() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let handler = CommandHandler::new(app);

        assert!(handler.try_handle(incoming(5, 1, "hello")).await.is_none());
        assert!(handler.try_handle(incoming(5, 2, ". help")).await.is_none());
        assert!(api.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let handler = CommandHandler::new(app);

        let (command, result) = handler.try_handle(incoming(5, 1, ".help")).await.unwrap();
        assert_eq!(command, BotCommand::Help);
        assert!(result.is_ok());
        assert!(api.last_text().contains("<code>.cfban"));
    }

    #[tokio::test]
    async fn test_strangers_are_ignored() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let handler = CommandHandler::new(app);

        let mut message = incoming(-5, 1, ".help");
        message.outgoing = false;
        message.sender = Some(UserInfo::new(99, "Stranger"));
        assert!(handler.try_handle(message).await.is_none());
    }

    #[tokio::test]
    async fn test_sudo_user_cannot_run_owner_only_command() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let handler = CommandHandler::new(app);

        let mut message = incoming(-5, 1, ".extupdate");
        message.outgoing = false;
        message.sender = Some(UserInfo::new(42, "Sudo"));
        assert!(handler.try_handle(message).await.is_none());
    }

    #[tokio::test]
    async fn test_usage_error_is_reported() {
        let api = Arc::new(MockApi::new());
        let (app, _dir) = test_app(api.clone());
        let handler = CommandHandler::new(app);

        let (_, result) = handler.try_handle(incoming(5, 1, ".hash")).await.unwrap();
        assert!(matches!(result, Err(CommandError::Usage { .. })));
        assert_eq!(api.sent_texts().len(), 1);
    }
}
