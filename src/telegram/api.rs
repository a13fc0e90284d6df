//! The set of Telegram operations commands rely on.
//!
//! [`TelegramBot`](super::TelegramBot) implements this over MTProto; tests
//! substitute a recording mock.

use std::path::Path;

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::TelegramError;
use super::types::{
    ChatId, ChatInfo, ChatMember, ChatPermissions, FileKind, IncomingMessage, MessageId,
    OutgoingMessage, UserId, UserInfo,
};

/// Stream of downloaded file chunks.
pub type MediaStream = BoxStream<'static, Result<Vec<u8>, TelegramError>>;

/// Telegram operations available to command handlers.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Returns the signed-in account.
    async fn me(&self) -> Result<UserInfo, TelegramError>;

    /// Sends a message and returns its id.
    async fn send_message(
        &self,
        chat: ChatId,
        message: OutgoingMessage,
    ) -> Result<MessageId, TelegramError>;

    /// Replaces the text (and buttons) of a message.
    async fn edit_message(
        &self,
        chat: ChatId,
        id: MessageId,
        message: OutgoingMessage,
    ) -> Result<(), TelegramError>;

    async fn delete_messages(&self, chat: ChatId, ids: &[MessageId]) -> Result<(), TelegramError>;

    /// Forwards messages and returns the ids of the forwarded copies.
    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, TelegramError>;

    /// Re-sends a message's content without the forward header.
    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        id: MessageId,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, TelegramError>;

    /// Fetches a single message.
    async fn get_message(
        &self,
        chat: ChatId,
        id: MessageId,
    ) -> Result<Option<IncomingMessage>, TelegramError>;

    /// Returns the newest `limit` messages of a chat, newest first.
    async fn history(
        &self,
        chat: ChatId,
        limit: usize,
    ) -> Result<Vec<IncomingMessage>, TelegramError>;

    /// Resolves a user by numeric id, `@username`, username or `me`.
    async fn resolve_user(&self, query: &str) -> Result<Option<UserInfo>, TelegramError>;

    /// Resolves a chat by numeric dialog id or username.
    async fn resolve_chat(&self, query: &str) -> Result<Option<ChatInfo>, TelegramError>;

    /// Returns a user's membership, `None` if they are not a participant.
    async fn get_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<Option<ChatMember>, TelegramError>;

    /// Returns the default permissions of a group.
    async fn chat_permissions(&self, chat: ChatId) -> Result<ChatPermissions, TelegramError>;

    async fn set_chat_permissions(
        &self,
        chat: ChatId,
        permissions: ChatPermissions,
    ) -> Result<(), TelegramError>;

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), TelegramError>;

    async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<(), TelegramError>;

    /// Sets an administrator's custom title; an empty title removes it.
    async fn set_admin_title(
        &self,
        chat: ChatId,
        user: UserId,
        title: &str,
    ) -> Result<(), TelegramError>;

    /// Presses the inline button at `index` (counted across all rows).
    async fn click_button(
        &self,
        chat: ChatId,
        id: MessageId,
        index: usize,
    ) -> Result<(), TelegramError>;

    /// Streams the media attached to a message.
    async fn download_media(&self, chat: ChatId, id: MessageId)
    -> Result<MediaStream, TelegramError>;

    /// Uploads a local file and sends it.
    async fn send_file(
        &self,
        chat: ChatId,
        path: &Path,
        kind: FileKind,
        caption: Option<String>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, TelegramError>;
}
