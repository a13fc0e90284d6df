//! Everything a command handler needs for one invocation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use super::error::CommandError;
use super::types::BotCommand;
use crate::config::{BotSettings, timeouts};
use crate::http::GitHub;
use crate::plugins::android::DeviceCache;
use crate::scheduler::DeleteHandle;
use crate::storage::DocumentStore;
use crate::telegram::html::escape;
use crate::telegram::{
    ChatApi, ChatId, IncomingMessage, Listeners, MessageId, OutgoingMessage, RateLimiter, UserId,
    UserInfo,
};

/// Long-lived services shared by all command invocations.
pub struct AppState {
    pub api: Arc<dyn ChatApi>,
    pub listeners: Arc<Listeners>,
    pub deleter: DeleteHandle,
    pub store: DocumentStore,
    pub settings: BotSettings,
    pub http: reqwest::Client,
    pub github: GitHub,
    /// The signed-in account.
    pub owner_id: UserId,
    /// Spaces out fan-out messages (fed bans, fed stats).
    pub fanout: RateLimiter,
    pub devices: DeviceCache,
    /// Signalled when a command asks the process to stop for a restart.
    pub restart: Arc<Notify>,
}

impl AppState {
    /// Returns true for the owner and configured sudo users.
    #[must_use]
    pub fn is_privileged(&self, user: UserId) -> bool {
        user == self.owner_id || self.settings.is_privileged(user)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("owner_id", &self.owner_id)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Who a command targets, as extracted from the reply or the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: UserId,
    /// Resolved profile, absent when only a numeric id was given.
    pub user: Option<UserInfo>,
}

impl Target {
    /// HTML mention, falling back to the bare id.
    #[must_use]
    pub fn mention(&self) -> String {
        self.user.as_ref().map_or_else(
            || format!("<a href='tg://user?id={0}'>{0}</a>", self.id),
            UserInfo::mention,
        )
    }
}

/// One command invocation.
#[derive(Debug)]
pub struct CommandContext {
    pub app: Arc<AppState>,
    pub command: BotCommand,
    /// The message carrying the command.
    pub message: IncomingMessage,
    /// Text after the command name.
    pub input: String,
    /// The message the command replied to, if any.
    pub replied: Option<IncomingMessage>,
}

impl CommandContext {
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.message.chat.id
    }

    #[must_use]
    pub fn api(&self) -> &dyn ChatApi {
        self.app.api.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &BotSettings {
        &self.app.settings
    }

    /// Returns true when the owner account issued the command.
    #[must_use]
    pub fn issued_by_owner(&self) -> bool {
        self.message.outgoing || self.message.sender_id() == Some(self.app.owner_id)
    }

    /// Text of the replied message, if it has any.
    #[must_use]
    pub fn replied_text(&self) -> Option<&str> {
        self.replied
            .as_ref()
            .map(|m| m.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// Replies to the command message.
    pub async fn reply(&self, html: impl Into<String>) -> Result<MessageId, CommandError> {
        self.reply_with(OutgoingMessage::new(html)).await
    }

    pub async fn reply_with(&self, message: OutgoingMessage) -> Result<MessageId, CommandError> {
        let message = message.reply_to(self.message.id);
        Ok(self.api().send_message(self.chat_id(), message).await?)
    }

    /// Replies and deletes the reply after `delay`.
    pub async fn reply_temp(
        &self,
        html: impl Into<String>,
        delay: Duration,
    ) -> Result<MessageId, CommandError> {
        let id = self.reply(html).await?;
        self.delete_later(id, delay);
        Ok(id)
    }

    pub async fn edit(&self, id: MessageId, html: impl Into<String>) -> Result<(), CommandError> {
        self.edit_with(id, OutgoingMessage::new(html)).await
    }

    pub async fn edit_with(
        &self,
        id: MessageId,
        message: OutgoingMessage,
    ) -> Result<(), CommandError> {
        Ok(self.api().edit_message(self.chat_id(), id, message).await?)
    }

    /// Edits a message and deletes it after `delay`.
    pub async fn edit_temp(
        &self,
        id: MessageId,
        html: impl Into<String>,
        delay: Duration,
    ) -> Result<(), CommandError> {
        self.edit(id, html).await?;
        self.delete_later(id, delay);
        Ok(())
    }

    /// Turns a progress message into the text of `err`.
    ///
    /// Usage errors keep their own delay, anything else is removed after
    /// the LONG tier.
    pub async fn edit_error(&self, id: MessageId, err: CommandError) -> Result<(), CommandError> {
        let (text, delay) = match err {
            CommandError::Usage { message, delay } => (message, delay),
            other => {
                warn!("{} failed: {}", self.command, other);
                (
                    format!(
                        "<b>An error occurred:</b> <code>{}</code>",
                        escape(&other.to_string())
                    ),
                    timeouts::LONG,
                )
            }
        };
        self.edit_temp(id, text, delay).await
    }

    /// Schedules a message in this chat for deletion.
    pub fn delete_later(&self, id: MessageId, delay: Duration) {
        self.app.deleter.schedule(self.chat_id(), id, delay);
    }

    /// Deletes the command message, ignoring failures.
    pub async fn delete_command(&self) {
        if let Err(e) = self
            .api()
            .delete_messages(self.chat_id(), &[self.message.id])
            .await
        {
            debug!("Could not delete command message: {}", e);
        }
    }

    /// Resolves a user from `@username`, a username, a numeric id or `me`.
    ///
    /// A numeric id that cannot be resolved is still returned.
    pub async fn resolve_target(&self, query: &str) -> Result<Target, CommandError> {
        let query = query.trim();
        let numeric = query.parse::<UserId>().ok();
        match self.api().resolve_user(query).await {
            Ok(Some(user)) => Ok(Target {
                id: user.id,
                user: Some(user),
            }),
            Ok(None) | Err(_) if numeric.is_some() => Ok(Target {
                id: numeric.unwrap_or_default(),
                user: None,
            }),
            Ok(None) => Err(CommandError::usage(format!(
                "Could not find user <code>{}</code>.",
                escape(query)
            ))),
            Err(e) => Err(CommandError::usage(format!(
                "<b>Error:</b> <code>{}</code>",
                escape(&e.to_string())
            ))),
        }
    }

    /// Target from the replied message's sender, else from the first word
    /// of the input; the remaining input is the reason.
    pub async fn extract_user_and_reason(&self) -> Result<(Target, String), CommandError> {
        if let Some(sender) = self.replied.as_ref().and_then(|m| m.sender.clone()) {
            return Ok((
                Target {
                    id: sender.id,
                    user: Some(sender),
                },
                self.input.clone(),
            ));
        }

        let (query, reason) = self
            .input
            .split_once(char::is_whitespace)
            .map_or((self.input.as_str(), ""), |(q, r)| (q, r.trim()));
        if query.is_empty() {
            return Err(CommandError::usage("Unable to extract user info."));
        }
        Ok((self.resolve_target(query).await?, reason.to_owned()))
    }

    /// Target from the input, else the replied sender, else `fallback`.
    pub async fn target_or(&self, fallback: Option<UserId>) -> Result<Target, CommandError> {
        if let Some(query) = self.input.split_whitespace().next() {
            return self.resolve_target(query).await;
        }
        if let Some(sender) = self.replied.as_ref().and_then(|m| m.sender.clone()) {
            return Ok(Target {
                id: sender.id,
                user: Some(sender),
            });
        }
        match fallback {
            Some(id) => self.resolve_target(&id.to_string()).await,
            None => Err(CommandError::usage("Reply to a user or give a username/id.")),
        }
    }
}
