//! Plain Telegram data types shared by the command layer.
//!
//! Chat identifiers use the Bot API "dialog id" convention: positive for
//! users, negative for basic groups and `-100…` for channels/supergroups.

use chrono::{DateTime, Utc};

use super::html::escape;

/// Bot API style dialog identifier.
pub type ChatId = i64;

/// Telegram user identifier.
pub type UserId = i64;

/// Message identifier within a chat.
pub type MessageId = i32;

/// Offset applied to channel ids in the dialog id space.
pub const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// A Telegram user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserInfo {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: bool,
    pub is_deleted: bool,
}

impl UserInfo {
    /// Creates a user with only an id and first name.
    #[must_use]
    pub fn new(id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            ..Self::default()
        }
    }

    /// First and last name joined by a space.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }

    /// HTML mention using the user's name.
    #[must_use]
    pub fn mention(&self) -> String {
        let name = if self.is_deleted {
            "Deleted Account".to_owned()
        } else {
            self.full_name()
        };
        self.mention_as(&name)
    }

    /// HTML mention with a custom link text.
    #[must_use]
    pub fn mention_as(&self, text: &str) -> String {
        format!("<a href='tg://user?id={}'>{}</a>", self.id, escape(text))
    }
}

/// Kind of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatKind {
    #[default]
    Private,
    Group,
    Supergroup,
    Channel,
}

/// A Telegram chat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl ChatInfo {
    /// Returns true for basic groups and supergroups.
    #[must_use]
    pub const fn is_group(&self) -> bool {
        matches!(self.kind, ChatKind::Group | ChatKind::Supergroup)
    }

    /// Title shown in summaries, "PM" for private chats.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("PM")
    }
}

/// Kind of media attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
    Other,
}

/// Media attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: u64,
}

impl MediaInfo {
    fn mime_starts_with(&self, prefix: &str) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.starts_with(prefix))
    }

    /// Returns true for anything a media cutter can process.
    #[must_use]
    pub fn is_audio_or_video(&self) -> bool {
        match self.kind {
            MediaKind::Video | MediaKind::Audio | MediaKind::Voice => true,
            MediaKind::Document => {
                self.mime_starts_with("video/") || self.mime_starts_with("audio/")
            }
            _ => false,
        }
    }

    /// Returns true for video and video documents.
    #[must_use]
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
            || (self.kind == MediaKind::Document && self.mime_starts_with("video/"))
    }

    /// Returns true for files sent as documents.
    #[must_use]
    pub fn is_document(&self) -> bool {
        self.kind == MediaKind::Document
    }
}

/// Original sender of a forwarded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOrigin {
    User(UserInfo),
    Chat(ChatInfo),
    /// Sender hid their account; only the display name is known.
    Hidden(String),
}

/// A message received from Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub chat: ChatInfo,
    pub sender: Option<UserInfo>,
    pub outgoing: bool,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub date: DateTime<Utc>,
    pub media: Option<MediaInfo>,
    pub forward: Option<ForwardOrigin>,
    /// Labels of inline keyboard buttons, row by row.
    pub buttons: Vec<String>,
    /// Targets of hidden text links.
    pub links: Vec<String>,
}

impl IncomingMessage {
    /// Id of the sending user, if any.
    #[must_use]
    pub fn sender_id(&self) -> Option<UserId> {
        self.sender.as_ref().map(|s| s.id)
    }

    /// Index of the first button whose label contains `label`.
    #[must_use]
    pub fn button_index(&self, label: &str) -> Option<usize> {
        self.buttons.iter().position(|b| b.contains(label))
    }

    /// Public link to this message.
    #[must_use]
    pub fn link(&self) -> String {
        message_link(&self.chat, self.id)
    }
}

/// Builds the `t.me` link of a message.
#[must_use]
pub fn message_link(chat: &ChatInfo, message: MessageId) -> String {
    if let Some(username) = &chat.username {
        return format!("https://t.me/{username}/{message}");
    }
    let bare = if chat.id <= -CHANNEL_ID_OFFSET {
        -chat.id - CHANNEL_ID_OFFSET
    } else {
        chat.id.abs()
    };
    format!("https://t.me/c/{bare}/{message}")
}

/// An inline URL button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlButton {
    pub text: String,
    pub url: String,
}

/// A message to send or an edit to apply, formatted as HTML.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    pub html: String,
    pub reply_to: Option<MessageId>,
    pub link_preview: bool,
    pub buttons: Vec<UrlButton>,
}

impl OutgoingMessage {
    /// Creates a message with link previews enabled.
    #[must_use]
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            link_preview: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn reply_to(mut self, message: MessageId) -> Self {
        self.reply_to = Some(message);
        self
    }

    #[must_use]
    pub const fn reply_to_opt(mut self, message: Option<MessageId>) -> Self {
        self.reply_to = message;
        self
    }

    #[must_use]
    pub const fn no_preview(mut self) -> Self {
        self.link_preview = false;
        self
    }

    #[must_use]
    pub fn url_button(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.buttons.push(UrlButton {
            text: text.into(),
            url: url.into(),
        });
        self
    }
}

impl From<&str> for OutgoingMessage {
    fn from(html: &str) -> Self {
        Self::new(html)
    }
}

impl From<String> for OutgoingMessage {
    fn from(html: String) -> Self {
        Self::new(html)
    }
}

/// Membership status of a user in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Owner => "Creator (Owner)",
            Self::Administrator => "Administrator",
            Self::Member => "Member",
            Self::Restricted => "Restricted",
            Self::Left => "Left",
            Self::Banned => "Banned",
        }
    }
}

/// Rights of a chat administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AdminRights {
    pub manage_chat: bool,
    pub delete_messages: bool,
    pub manage_video_chats: bool,
    pub restrict_members: bool,
    pub change_info: bool,
    pub invite_users: bool,
    pub pin_messages: bool,
    pub promote_members: bool,
    pub post_stories: bool,
    pub edit_stories: bool,
    pub delete_stories: bool,
    pub anonymous: bool,
}

impl AdminRights {
    /// Human readable names of the granted rights.
    #[must_use]
    pub fn granted(&self) -> Vec<&'static str> {
        [
            ("Manage Chat", self.manage_chat),
            ("Delete Messages", self.delete_messages),
            ("Manage Video Chats", self.manage_video_chats),
            ("Restrict Members", self.restrict_members),
            ("Change Info", self.change_info),
            ("Invite Users", self.invite_users),
            ("Pin Messages", self.pin_messages),
            ("Promote Members", self.promote_members),
            ("Post Stories", self.post_stories),
            ("Edit Stories", self.edit_stories),
            ("Delete Stories", self.delete_stories),
            ("Remain Anonymous", self.anonymous),
        ]
        .into_iter()
        .filter_map(|(name, granted)| granted.then_some(name))
        .collect()
    }
}

/// What regular members are allowed to do. `true` means allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ChatPermissions {
    pub send_messages: bool,
    pub send_media: bool,
    pub send_other: bool,
    pub send_polls: bool,
    pub embed_links: bool,
    pub invite_users: bool,
    pub pin_messages: bool,
    pub change_info: bool,
}

impl Default for ChatPermissions {
    fn default() -> Self {
        Self::all_allowed()
    }
}

impl ChatPermissions {
    #[must_use]
    pub const fn all_allowed() -> Self {
        Self {
            send_messages: true,
            send_media: true,
            send_other: true,
            send_polls: true,
            embed_links: true,
            invite_users: true,
            pin_messages: true,
            change_info: true,
        }
    }

    /// Human readable names of the denied permissions.
    #[must_use]
    pub fn denied(&self) -> Vec<&'static str> {
        [
            ("Send Messages", self.send_messages),
            ("Send Media", self.send_media),
            ("Send Stickers/GIFs", self.send_other),
            ("Send Polls", self.send_polls),
            ("Embed Links", self.embed_links),
            ("Add Members", self.invite_users),
            ("Pin Messages", self.pin_messages),
            ("Change Chat Info", self.change_info),
        ]
        .into_iter()
        .filter_map(|(name, allowed)| (!allowed).then_some(name))
        .collect()
    }
}

/// A user's membership in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMember {
    pub user: UserInfo,
    pub status: MemberStatus,
    pub custom_title: Option<String>,
    pub joined_date: Option<DateTime<Utc>>,
    pub admin_rights: Option<AdminRights>,
    pub permissions: Option<ChatPermissions>,
    pub until_date: Option<DateTime<Utc>>,
}

impl ChatMember {
    /// Creates a member with the given status and no extra details.
    #[must_use]
    pub const fn new(user: UserInfo, status: MemberStatus) -> Self {
        Self {
            user,
            status,
            custom_title: None,
            joined_date: None,
            admin_rights: None,
            permissions: None,
            until_date: None,
        }
    }

    /// Returns true for owners and administrators.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(
            self.status,
            MemberStatus::Owner | MemberStatus::Administrator
        )
    }

    /// Returns true if the member may restrict users.
    #[must_use]
    pub fn can_restrict(&self) -> bool {
        self.status == MemberStatus::Owner
            || self.admin_rights.is_some_and(|r| r.restrict_members)
    }

    /// Returns true if the member may promote users.
    #[must_use]
    pub fn can_promote(&self) -> bool {
        self.status == MemberStatus::Owner
            || self.admin_rights.is_some_and(|r| r.promote_members)
    }
}

/// How an uploaded file is presented in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Voice,
    Audio,
    Video,
    Document,
}
