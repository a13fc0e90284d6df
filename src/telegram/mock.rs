//! Recording [`ChatApi`] used by tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;

use super::api::{ChatApi, MediaStream};
use super::types::{
    ChatId, ChatInfo, ChatKind, ChatMember, ChatPermissions, FileKind, IncomingMessage,
    MessageId, OutgoingMessage, UserId, UserInfo,
};
use super::TelegramError;

/// Builds a plain text message in a group chat.
pub fn incoming(chat: ChatId, id: MessageId, text: &str) -> IncomingMessage {
    IncomingMessage {
        id,
        chat: ChatInfo {
            id: chat,
            kind: if chat < 0 {
                ChatKind::Supergroup
            } else {
                ChatKind::Private
            },
            title: (chat < 0).then(|| "Test Group".to_owned()),
            username: None,
        },
        sender: Some(UserInfo::new(1, "Owner")),
        outgoing: true,
        text: text.to_owned(),
        reply_to: None,
        date: Utc::now(),
        media: None,
        forward: None,
        buttons: Vec::new(),
        links: Vec::new(),
    }
}

/// Calls recorded by [`MockApi`].
#[derive(Debug, Default)]
pub struct Recorded {
    pub sent: Vec<(ChatId, MessageId, OutgoingMessage)>,
    pub edits: Vec<(ChatId, MessageId, OutgoingMessage)>,
    pub deleted: Vec<(ChatId, MessageId)>,
    pub forwarded: Vec<(ChatId, ChatId, Vec<MessageId>)>,
    pub copied: Vec<(ChatId, ChatId, MessageId)>,
    pub bans: Vec<(ChatId, UserId)>,
    pub unbans: Vec<(ChatId, UserId)>,
    pub permissions: Vec<(ChatId, ChatPermissions)>,
    pub titles: Vec<(ChatId, UserId, String)>,
    pub clicks: Vec<(ChatId, MessageId, usize)>,
    pub files: Vec<(ChatId, PathBuf, FileKind, Option<String>)>,
    pub last_text: String,
}

/// Scripted state served by [`MockApi`].
#[derive(Debug, Default)]
pub struct Script {
    pub me: UserInfo,
    pub users: HashMap<String, UserInfo>,
    pub chats: HashMap<String, ChatInfo>,
    pub members: HashMap<(ChatId, UserId), ChatMember>,
    pub messages: HashMap<(ChatId, MessageId), IncomingMessage>,
    pub history: HashMap<ChatId, Vec<IncomingMessage>>,
    pub chat_permissions: HashMap<ChatId, ChatPermissions>,
    pub media: HashMap<(ChatId, MessageId), Vec<u8>>,
    /// Chats where sending fails.
    pub failing_chats: Vec<ChatId>,
}

/// In-memory Telegram double.
#[derive(Debug, Default)]
pub struct MockApi {
    pub script: Mutex<Script>,
    pub recorded: Mutex<Recorded>,
    next_id: Mutex<MessageId>,
}

impl MockApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.script.lock().unwrap().me = UserInfo::new(1, "Owner");
        *api.next_id.lock().unwrap() = 1000;
        api
    }

    pub fn add_user(&self, user: UserInfo) {
        let mut script = self.script.lock().unwrap();
        script.users.insert(user.id.to_string(), user.clone());
        if let Some(username) = &user.username {
            script.users.insert(username.to_lowercase(), user.clone());
        }
    }

    pub fn add_member(&self, chat: ChatId, member: ChatMember) {
        self.script
            .lock()
            .unwrap()
            .members
            .insert((chat, member.user.id), member);
    }

    pub fn add_message(&self, message: IncomingMessage) {
        self.script
            .lock()
            .unwrap()
            .messages
            .insert((message.chat.id, message.id), message);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|(_, _, m)| m.html.clone())
            .collect()
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .edits
            .iter()
            .map(|(_, _, m)| m.html.clone())
            .collect()
    }

    /// Text of the last send or edit, whichever happened last.
    pub fn last_text(&self) -> String {
        self.recorded.lock().unwrap().last_text.clone()
    }

    fn allocate_id(&self) -> MessageId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn me(&self) -> Result<UserInfo, TelegramError> {
        Ok(self.script.lock().unwrap().me.clone())
    }

    async fn send_message(
        &self,
        chat: ChatId,
        message: OutgoingMessage,
    ) -> Result<MessageId, TelegramError> {
        if self.script.lock().unwrap().failing_chats.contains(&chat) {
            return Err(TelegramError::Invocation("CHAT_WRITE_FORBIDDEN".to_owned()));
        }
        let id = self.allocate_id();
        let mut recorded = self.recorded.lock().unwrap();
        recorded.last_text.clone_from(&message.html);
        recorded.sent.push((chat, id, message));
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        id: MessageId,
        message: OutgoingMessage,
    ) -> Result<(), TelegramError> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.last_text.clone_from(&message.html);
        recorded.edits.push((chat, id, message));
        Ok(())
    }

    async fn delete_messages(&self, chat: ChatId, ids: &[MessageId]) -> Result<(), TelegramError> {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.deleted.extend(ids.iter().map(|id| (chat, *id)));
        Ok(())
    }

    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, TelegramError> {
        let new_ids = ids.iter().map(|_| self.allocate_id()).collect();
        self.recorded
            .lock()
            .unwrap()
            .forwarded
            .push((to, from, ids.to_vec()));
        Ok(new_ids)
    }

    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        id: MessageId,
        _reply_to: Option<MessageId>,
    ) -> Result<MessageId, TelegramError> {
        let known = self.script.lock().unwrap().messages.contains_key(&(from, id));
        if !known {
            return Err(TelegramError::MessageNotFound(id));
        }
        self.recorded.lock().unwrap().copied.push((to, from, id));
        Ok(self.allocate_id())
    }

    async fn get_message(
        &self,
        chat: ChatId,
        id: MessageId,
    ) -> Result<Option<IncomingMessage>, TelegramError> {
        Ok(self.script.lock().unwrap().messages.get(&(chat, id)).cloned())
    }

    async fn history(
        &self,
        chat: ChatId,
        limit: usize,
    ) -> Result<Vec<IncomingMessage>, TelegramError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .history
            .get(&chat)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn resolve_user(&self, query: &str) -> Result<Option<UserInfo>, TelegramError> {
        let script = self.script.lock().unwrap();
        if query == "me" {
            return Ok(Some(script.me.clone()));
        }
        let key = query.trim_start_matches('@').to_lowercase();
        Ok(script.users.get(&key).cloned())
    }

    async fn resolve_chat(&self, query: &str) -> Result<Option<ChatInfo>, TelegramError> {
        let key = query.trim_start_matches('@').to_lowercase();
        Ok(self.script.lock().unwrap().chats.get(&key).cloned())
    }

    async fn get_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<Option<ChatMember>, TelegramError> {
        Ok(self.script.lock().unwrap().members.get(&(chat, user)).cloned())
    }

    async fn chat_permissions(&self, chat: ChatId) -> Result<ChatPermissions, TelegramError> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .chat_permissions
            .get(&chat)
            .copied()
            .unwrap_or_default())
    }

    async fn set_chat_permissions(
        &self,
        chat: ChatId,
        permissions: ChatPermissions,
    ) -> Result<(), TelegramError> {
        self.recorded
            .lock()
            .unwrap()
            .permissions
            .push((chat, permissions));
        Ok(())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), TelegramError> {
        self.recorded.lock().unwrap().bans.push((chat, user));
        Ok(())
    }

    async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<(), TelegramError> {
        self.recorded.lock().unwrap().unbans.push((chat, user));
        Ok(())
    }

    async fn set_admin_title(
        &self,
        chat: ChatId,
        user: UserId,
        title: &str,
    ) -> Result<(), TelegramError> {
        self.recorded
            .lock()
            .unwrap()
            .titles
            .push((chat, user, title.to_owned()));
        Ok(())
    }

    async fn click_button(
        &self,
        chat: ChatId,
        id: MessageId,
        index: usize,
    ) -> Result<(), TelegramError> {
        self.recorded.lock().unwrap().clicks.push((chat, id, index));
        Ok(())
    }

    async fn download_media(
        &self,
        chat: ChatId,
        id: MessageId,
    ) -> Result<MediaStream, TelegramError> {
        let bytes = self
            .script
            .lock()
            .unwrap()
            .media
            .get(&(chat, id))
            .cloned()
            .ok_or(TelegramError::NoMedia)?;
        let chunks: Vec<Result<Vec<u8>, TelegramError>> =
            bytes.chunks(4).map(|c| Ok(c.to_vec())).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn send_file(
        &self,
        chat: ChatId,
        path: &Path,
        kind: FileKind,
        caption: Option<String>,
        _reply_to: Option<MessageId>,
    ) -> Result<MessageId, TelegramError> {
        self.recorded
            .lock()
            .unwrap()
            .files
            .push((chat, path.to_path_buf(), kind, caption));
        Ok(self.allocate_id())
    }
}
