//! MTProto implementation of [`ChatApi`] on top of grammers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use grammers_client::client::{LoginToken, PasswordToken, UpdatesConfiguration};
use grammers_client::types::{Attribute, InputMessage, Media, Message, Peer, Update};
use grammers_client::{Client, InvocationError, SenderPool, SignInError, sender};
use grammers_session::defs::{PeerAuth, PeerId, PeerRef};
use grammers_session::storages::SqliteSession;
use grammers_session::updates::UpdatesLike;
use grammers_tl_types as tl;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api::{ChatApi, MediaStream};
use super::html::escape;
use super::types::{
    AdminRights, CHANNEL_ID_OFFSET, ChatId, ChatInfo, ChatKind, ChatMember, ChatPermissions,
    FileKind, ForwardOrigin, IncomingMessage, MediaInfo, MediaKind, MemberStatus, MessageId,
    OutgoingMessage, UserId, UserInfo,
};
use super::{RateLimiter, TelegramError};
use crate::config::TelegramConfig;

/// Capacity of the channel feeding converted messages to the update loop.
const MESSAGE_BUFFER: usize = 256;

/// Access hashes learned from updates and lookups, keyed by dialog id.
#[derive(Debug, Default)]
struct PeerCache {
    peers: HashMap<ChatId, PeerRef>,
    hashes: HashMap<ChatId, i64>,
    users: HashMap<UserId, UserInfo>,
}

impl PeerCache {
    fn remember(&mut self, peer: &Peer) {
        let id = peer.id().bot_api_dialog_id();
        self.peers.insert(id, PeerRef::from(peer.clone()));
        match peer {
            Peer::User(user) => {
                if let Some(hash) = user.raw.access_hash {
                    self.hashes.insert(id, hash);
                }
                self.users.insert(id, user_info(&user.raw));
            }
            Peer::Channel(channel) => {
                if let Some(hash) = channel.raw.access_hash {
                    self.hashes.insert(id, hash);
                }
            }
            Peer::Group(_) => {}
        }
    }

    fn remember_raw_user(&mut self, user: &tl::types::User) {
        if let Some(hash) = user.access_hash {
            self.hashes.insert(user.id, hash);
        }
        self.users.insert(user.id, user_info(user));
    }

    fn peer_ref(&self, chat: ChatId) -> PeerRef {
        self.peers.get(&chat).cloned().unwrap_or_else(|| PeerRef {
            id: peer_id(chat),
            auth: PeerAuth::default(),
        })
    }

    fn hash(&self, chat: ChatId) -> i64 {
        self.hashes.get(&chat).copied().unwrap_or_default()
    }
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Raw updates, taken once by [`Self::start_updates`].
    updates: Mutex<Option<mpsc::UnboundedReceiver<UpdatesLike>>>,

    cache: Arc<Mutex<PeerCache>>,

    /// Holds calls back after Telegram reports a flood wait.
    rate_limiter: RateLimiter,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the connection fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            updates: Mutex::new(Some(updates)),
            cache: Arc::new(Mutex::new(PeerCache::default())),
            rate_limiter: RateLimiter::new(Duration::ZERO),
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::PasswordRequired`] when 2FA is enabled.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        info!("Signing in with login code...");

        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                info!("Successfully signed in!");
                Ok(())
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        info!("Checking 2FA password...");

        match self.client.check_password(password_token, password).await {
            Ok(_user) => {
                info!("Successfully authenticated with 2FA!");
                Ok(())
            }
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Starts converting new messages into [`IncomingMessage`]s.
    ///
    /// Can only be called once per connection.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::UpdatesClosed`] if updates were already taken.
    pub fn start_updates(&self) -> Result<mpsc::Receiver<IncomingMessage>, TelegramError> {
        let updates_rx = self
            .updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(TelegramError::UpdatesClosed)?;

        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let client = self.client.clone();
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            let mut updates = client.stream_updates(
                updates_rx,
                UpdatesConfiguration {
                    catch_up: false,
                    ..Default::default()
                },
            );
            loop {
                match updates.next().await {
                    Ok(Update::NewMessage(message)) => {
                        let converted = {
                            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                            convert_message(&message, &mut cache)
                        };
                        if tx.send(converted).await.is_err() {
                            debug!("Message receiver dropped, stopping update task");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(InvocationError::Dropped) => break,
                    Err(e) => {
                        warn!("Telegram update loop error: {}", e);
                        tokio::time::sleep(Duration::from_millis(800)).await;
                    }
                }
            }
        });

        Ok(rx)
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, PeerCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peer_ref(&self, chat: ChatId) -> PeerRef {
        self.cache().peer_ref(chat)
    }

    fn input_peer(&self, chat: ChatId) -> tl::enums::InputPeer {
        let hash = self.cache().hash(chat);
        if chat > 0 {
            tl::types::InputPeerUser {
                user_id: chat,
                access_hash: hash,
            }
            .into()
        } else if chat <= -CHANNEL_ID_OFFSET {
            tl::types::InputPeerChannel {
                channel_id: -chat - CHANNEL_ID_OFFSET,
                access_hash: hash,
            }
            .into()
        } else {
            tl::types::InputPeerChat { chat_id: -chat }.into()
        }
    }

    fn input_user(&self, user: UserId) -> tl::enums::InputUser {
        tl::types::InputUser {
            user_id: user,
            access_hash: self.cache().hash(user),
        }
        .into()
    }

    fn input_channel(&self, chat: ChatId) -> Option<tl::enums::InputChannel> {
        (chat <= -CHANNEL_ID_OFFSET).then(|| {
            tl::types::InputChannel {
                channel_id: -chat - CHANNEL_ID_OFFSET,
                access_hash: self.cache().hash(chat),
            }
            .into()
        })
    }

    /// Waits out a pending flood wait, runs nothing else.
    async fn pace(&self) {
        self.rate_limiter.wait_and_acquire().await;
    }

    /// Converts an invocation error, recording flood waits.
    async fn fail(&self, err: InvocationError) -> TelegramError {
        let err: TelegramError = err.into();
        if let TelegramError::FloodWait(seconds) = &err {
            self.rate_limiter.handle_flood_wait(*seconds).await;
        }
        err
    }

    async fn invoke<R>(&self, request: &R) -> Result<R::Return, TelegramError>
    where
        R: tl::RemoteCall,
    {
        self.pace().await;
        match self.client.invoke(request).await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn fetch_raw(&self, chat: ChatId, id: MessageId) -> Result<Message, TelegramError> {
        self.pace().await;
        let found = match self
            .client
            .get_messages_by_id(self.peer_ref(chat), &[id])
            .await
        {
            Ok(found) => found,
            Err(e) => return Err(self.fail(e).await),
        };
        found
            .into_iter()
            .flatten()
            .next()
            .ok_or(TelegramError::MessageNotFound(id))
    }

    fn build_input(message: &OutgoingMessage) -> InputMessage {
        let mut html = message.html.clone();
        if !message.buttons.is_empty() {
            let links: Vec<String> = message
                .buttons
                .iter()
                .map(|b| format!("<a href=\"{}\">{}</a>", escape(&b.url), escape(&b.text)))
                .collect();
            html.push_str("\n\n");
            html.push_str(&links.join(" | "));
        }
        InputMessage::new()
            .html(&html)
            .link_preview(message.link_preview)
            .reply_to(message.reply_to)
    }

    async fn channel_participant(
        &self,
        channel: tl::enums::InputChannel,
        user: UserId,
    ) -> Result<Option<ChatMember>, TelegramError> {
        let request = tl::functions::channels::GetParticipant {
            channel,
            participant: self.input_peer(user),
        };
        let tl::enums::channels::ChannelParticipant::Participant(found) =
            match self.invoke(&request).await {
                Ok(found) => found,
                Err(TelegramError::UserNotParticipant) => return Ok(None),
                Err(e) => return Err(e),
            };

        let info = {
            let mut cache = self.cache();
            for raw in &found.users {
                if let tl::enums::User::User(u) = raw {
                    cache.remember_raw_user(u);
                }
            }
            cache
                .users
                .get(&user)
                .cloned()
                .unwrap_or_else(|| UserInfo::new(user, ""))
        };

        Ok(Some(channel_member(info, found.participant)))
    }

    async fn group_participant(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<Option<ChatMember>, TelegramError> {
        let request = tl::functions::messages::GetFullChat { chat_id: -chat };
        let tl::enums::messages::ChatFull::Full(full) = self.invoke(&request).await?;

        let info = {
            let mut cache = self.cache();
            for raw in &full.users {
                if let tl::enums::User::User(u) = raw {
                    cache.remember_raw_user(u);
                }
            }
            cache.users.get(&user).cloned()
        };

        let tl::enums::ChatFull::Full(chat_full) = full.full_chat else {
            return Ok(None);
        };
        let tl::enums::ChatParticipants::Participants(list) = chat_full.participants else {
            return Ok(None);
        };

        let member = list.participants.into_iter().find_map(|p| {
            let (user_id, status, date) = match p {
                tl::enums::ChatParticipant::Participant(p) => {
                    (p.user_id, MemberStatus::Member, Some(p.date))
                }
                tl::enums::ChatParticipant::Creator(p) => (p.user_id, MemberStatus::Owner, None),
                tl::enums::ChatParticipant::Admin(p) => {
                    (p.user_id, MemberStatus::Administrator, Some(p.date))
                }
            };
            (user_id == user).then(|| {
                let info = info.clone().unwrap_or_else(|| UserInfo::new(user, ""));
                let mut member = ChatMember::new(info, status);
                member.joined_date = date.and_then(timestamp);
                member
            })
        });
        Ok(member)
    }

    async fn raw_chat(&self, chat: ChatId) -> Result<Option<tl::enums::Chat>, TelegramError> {
        let chats = if let Some(channel) = self.input_channel(chat) {
            self.invoke(&tl::functions::channels::GetChannels { id: vec![channel] })
                .await?
        } else {
            self.invoke(&tl::functions::messages::GetChats { id: vec![-chat] })
                .await?
        };
        let list = match chats {
            tl::enums::messages::Chats::Chats(c) => c.chats,
            tl::enums::messages::Chats::Slice(c) => c.chats,
        };
        Ok(list.into_iter().next())
    }

    async fn edit_banned(
        &self,
        chat: ChatId,
        user: UserId,
        banned: bool,
    ) -> Result<(), TelegramError> {
        let Some(channel) = self.input_channel(chat) else {
            if banned {
                self.invoke(&tl::functions::messages::DeleteChatUser {
                    revoke_history: false,
                    chat_id: -chat,
                    user_id: self.input_user(user),
                })
                .await?;
            }
            return Ok(());
        };
        let mut rights = banned_rights(&ChatPermissions::all_allowed());
        rights.view_messages = banned;
        self.invoke(&tl::functions::channels::EditBanned {
            channel,
            participant: self.input_peer(user),
            banned_rights: rights.into(),
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatApi for TelegramBot {
    async fn me(&self) -> Result<UserInfo, TelegramError> {
        self.pace().await;
        match self.client.get_me().await {
            Ok(me) => {
                let mut cache = self.cache();
                cache.remember_raw_user(&me.raw);
                Ok(user_info(&me.raw))
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn send_message(
        &self,
        chat: ChatId,
        message: OutgoingMessage,
    ) -> Result<MessageId, TelegramError> {
        self.pace().await;
        match self
            .client
            .send_message(self.peer_ref(chat), Self::build_input(&message))
            .await
        {
            Ok(sent) => Ok(sent.id()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        id: MessageId,
        message: OutgoingMessage,
    ) -> Result<(), TelegramError> {
        self.pace().await;
        match self
            .client
            .edit_message(self.peer_ref(chat), id, Self::build_input(&message))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                let err = self.fail(e).await;
                if err.to_string().contains("MESSAGE_NOT_MODIFIED") {
                    return Ok(());
                }
                Err(err)
            }
        }
    }

    async fn delete_messages(&self, chat: ChatId, ids: &[MessageId]) -> Result<(), TelegramError> {
        self.pace().await;
        match self.client.delete_messages(self.peer_ref(chat), ids).await {
            Ok(count) => {
                debug!("Deleted {} message(s) in chat {}", count, chat);
                Ok(())
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, TelegramError> {
        self.pace().await;
        match self
            .client
            .forward_messages(self.peer_ref(to), ids, self.peer_ref(from))
            .await
        {
            Ok(forwarded) => Ok(forwarded.into_iter().flatten().map(|m| m.id()).collect()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        id: MessageId,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, TelegramError> {
        let original = self.fetch_raw(from, id).await?;
        let mut input = InputMessage::new()
            .text(original.text())
            .fmt_entities(original.fmt_entities().cloned().unwrap_or_default())
            .reply_to(reply_to);
        if let Some(media) = original.media() {
            input = input.copy_media(&media);
        }

        self.pace().await;
        match self.client.send_message(self.peer_ref(to), input).await {
            Ok(sent) => Ok(sent.id()),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn get_message(
        &self,
        chat: ChatId,
        id: MessageId,
    ) -> Result<Option<IncomingMessage>, TelegramError> {
        match self.fetch_raw(chat, id).await {
            Ok(message) => Ok(Some(convert_message(&message, &mut self.cache()))),
            Err(TelegramError::MessageNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn history(
        &self,
        chat: ChatId,
        limit: usize,
    ) -> Result<Vec<IncomingMessage>, TelegramError> {
        self.pace().await;
        let mut iter = self.client.iter_messages(self.peer_ref(chat)).limit(limit);
        let mut out = Vec::with_capacity(limit);
        loop {
            match iter.next().await {
                Ok(Some(message)) => out.push(convert_message(&message, &mut self.cache())),
                Ok(None) => break,
                Err(e) => return Err(self.fail(e).await),
            }
        }
        Ok(out)
    }

    async fn resolve_user(&self, query: &str) -> Result<Option<UserInfo>, TelegramError> {
        let query = query.trim();
        if query.eq_ignore_ascii_case("me") {
            return self.me().await.map(Some);
        }

        if let Ok(id) = query.parse::<UserId>() {
            if let Some(known) = self.cache().users.get(&id).cloned() {
                return Ok(Some(known));
            }
            let request = tl::functions::users::GetUsers {
                id: vec![self.input_user(id)],
            };
            let users = match self.invoke(&request).await {
                Ok(users) => users,
                Err(TelegramError::PeerNotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let mut cache = self.cache();
            return Ok(users.into_iter().find_map(|u| match u {
                tl::enums::User::User(u) => {
                    cache.remember_raw_user(&u);
                    Some(user_info(&u))
                }
                tl::enums::User::Empty(_) => None,
            }));
        }

        let username = query.trim_start_matches('@');
        self.pace().await;
        match self.client.resolve_username(username).await {
            Ok(Some(peer)) => {
                self.cache().remember(&peer);
                Ok(match peer {
                    Peer::User(user) => Some(user_info(&user.raw)),
                    _ => None,
                })
            }
            Ok(None) => Ok(None),
            Err(e) => match self.fail(e).await {
                TelegramError::PeerNotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn resolve_chat(&self, query: &str) -> Result<Option<ChatInfo>, TelegramError> {
        let query = query.trim();
        if let Ok(id) = query.parse::<ChatId>() {
            if id > 0 {
                return Ok(self.resolve_user(query).await?.map(|u| ChatInfo {
                    id: u.id,
                    kind: ChatKind::Private,
                    title: None,
                    username: u.username,
                }));
            }
            return Ok(self.raw_chat(id).await?.and_then(|raw| raw_chat_info(&raw)));
        }

        let username = query.trim_start_matches('@');
        self.pace().await;
        match self.client.resolve_username(username).await {
            Ok(Some(peer)) => {
                self.cache().remember(&peer);
                Ok(Some(chat_info(&peer)))
            }
            Ok(None) => Ok(None),
            Err(e) => match self.fail(e).await {
                TelegramError::PeerNotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn get_chat_member(
        &self,
        chat: ChatId,
        user: UserId,
    ) -> Result<Option<ChatMember>, TelegramError> {
        match self.input_channel(chat) {
            Some(channel) => self.channel_participant(channel, user).await,
            None => self.group_participant(chat, user).await,
        }
    }

    async fn chat_permissions(&self, chat: ChatId) -> Result<ChatPermissions, TelegramError> {
        let rights = match self.raw_chat(chat).await? {
            Some(tl::enums::Chat::Channel(c)) => c.default_banned_rights,
            Some(tl::enums::Chat::Chat(c)) => c.default_banned_rights,
            _ => None,
        };
        Ok(rights.map_or_else(ChatPermissions::all_allowed, |tl::enums::ChatBannedRights::Rights(r)| {
            permissions_from(&r)
        }))
    }

    async fn set_chat_permissions(
        &self,
        chat: ChatId,
        permissions: ChatPermissions,
    ) -> Result<(), TelegramError> {
        let request = tl::functions::messages::EditChatDefaultBannedRights {
            peer: self.input_peer(chat),
            banned_rights: banned_rights(&permissions).into(),
        };
        match self.invoke(&request).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("CHAT_NOT_MODIFIED") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<(), TelegramError> {
        self.edit_banned(chat, user, true).await
    }

    async fn unban_member(&self, chat: ChatId, user: UserId) -> Result<(), TelegramError> {
        self.edit_banned(chat, user, false).await
    }

    async fn set_admin_title(
        &self,
        chat: ChatId,
        user: UserId,
        title: &str,
    ) -> Result<(), TelegramError> {
        let channel = self.input_channel(chat).ok_or_else(|| {
            TelegramError::Invocation("Custom titles are only available in supergroups".to_owned())
        })?;
        let member = self
            .channel_participant(channel.clone(), user)
            .await?
            .ok_or(TelegramError::UserNotParticipant)?;
        let rights = member.admin_rights.unwrap_or_default();

        self.invoke(&tl::functions::channels::EditAdmin {
            channel,
            user_id: self.input_user(user),
            admin_rights: admin_rights_raw(&rights).into(),
            rank: title.to_owned(),
        })
        .await?;
        Ok(())
    }

    async fn click_button(
        &self,
        chat: ChatId,
        id: MessageId,
        index: usize,
    ) -> Result<(), TelegramError> {
        let message = self.fetch_raw(chat, id).await?;
        let data = inline_buttons(&message)
            .into_iter()
            .nth(index)
            .and_then(|button| match button {
                tl::enums::KeyboardButton::Callback(b) => Some(b.data),
                _ => None,
            })
            .ok_or_else(|| TelegramError::Invocation(format!("No callback button at {index}")))?;

        let request = tl::functions::messages::GetBotCallbackAnswer {
            game: false,
            peer: self.input_peer(chat),
            msg_id: id,
            data: Some(data),
            password: None,
        };
        match self.invoke(&request).await {
            Ok(_) => Ok(()),
            // The bot may edit the message without answering the callback.
            Err(e) if e.to_string().contains("BOT_RESPONSE_TIMEOUT") => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn download_media(
        &self,
        chat: ChatId,
        id: MessageId,
    ) -> Result<MediaStream, TelegramError> {
        let message = self.fetch_raw(chat, id).await?;
        let media = message.media().ok_or(TelegramError::NoMedia)?;
        let download = self.client.iter_download(&media);

        let chunks = stream::unfold(Some(download), |state| async move {
            let mut download = state?;
            match download.next().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(download))),
                Ok(None) => None,
                Err(e) => Some((Err(TelegramError::from(e)), None)),
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn send_file(
        &self,
        chat: ChatId,
        path: &Path,
        kind: FileKind,
        caption: Option<String>,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, TelegramError> {
        let uploaded = self
            .client
            .upload_file(path)
            .await
            .map_err(|e| TelegramError::Invocation(format!("Upload failed: {e}")))?;

        let mut input = InputMessage::new()
            .html(caption.as_deref().unwrap_or_default())
            .reply_to(reply_to)
            .document(uploaded);
        input = match kind {
            FileKind::Voice => input.mime_type("audio/ogg").attribute(Attribute::Voice {
                duration: Duration::ZERO,
                waveform: None,
            }),
            FileKind::Audio => input.mime_type("audio/mpeg").attribute(Attribute::Audio {
                duration: Duration::ZERO,
                title: path.file_stem().map(|s| s.to_string_lossy().into_owned()),
                performer: None,
            }),
            FileKind::Video => input.mime_type("video/mp4").attribute(Attribute::Video {
                round_message: false,
                supports_streaming: true,
                duration: Duration::ZERO,
                w: 0,
                h: 0,
            }),
            FileKind::Document => input,
        };

        self.pace().await;
        match self.client.send_message(self.peer_ref(chat), input).await {
            Ok(sent) => Ok(sent.id()),
            Err(e) => Err(self.fail(e).await),
        }
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("rate_limiter", &self.rate_limiter)
            .finish_non_exhaustive()
    }
}

fn peer_id(chat: ChatId) -> PeerId {
    if chat > 0 {
        PeerId::user(chat)
    } else if chat <= -CHANNEL_ID_OFFSET {
        PeerId::channel(-chat - CHANNEL_ID_OFFSET)
    } else {
        PeerId::chat(-chat)
    }
}

fn timestamp(secs: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(secs), 0)
}

fn user_info(raw: &tl::types::User) -> UserInfo {
    UserInfo {
        id: raw.id,
        first_name: raw.first_name.clone().unwrap_or_default(),
        last_name: raw.last_name.clone(),
        username: raw.username.clone(),
        is_bot: raw.bot,
        is_deleted: raw.deleted,
    }
}

fn chat_info(peer: &Peer) -> ChatInfo {
    let id = peer.id().bot_api_dialog_id();
    match peer {
        Peer::User(user) => ChatInfo {
            id,
            kind: ChatKind::Private,
            title: None,
            username: user.raw.username.clone(),
        },
        Peer::Group(group) => raw_chat_info(&group.raw).unwrap_or(ChatInfo {
            id,
            kind: ChatKind::Group,
            ..ChatInfo::default()
        }),
        Peer::Channel(channel) => ChatInfo {
            id,
            kind: if channel.raw.megagroup {
                ChatKind::Supergroup
            } else {
                ChatKind::Channel
            },
            title: Some(channel.raw.title.clone()),
            username: channel.raw.username.clone(),
        },
    }
}

fn raw_chat_info(raw: &tl::enums::Chat) -> Option<ChatInfo> {
    match raw {
        tl::enums::Chat::Chat(c) => Some(ChatInfo {
            id: -c.id,
            kind: ChatKind::Group,
            title: Some(c.title.clone()),
            username: None,
        }),
        tl::enums::Chat::Channel(c) => Some(ChatInfo {
            id: -CHANNEL_ID_OFFSET - c.id,
            kind: if c.megagroup {
                ChatKind::Supergroup
            } else {
                ChatKind::Channel
            },
            title: Some(c.title.clone()),
            username: c.username.clone(),
        }),
        tl::enums::Chat::Forbidden(c) => Some(ChatInfo {
            id: -c.id,
            kind: ChatKind::Group,
            title: Some(c.title.clone()),
            username: None,
        }),
        tl::enums::Chat::ChannelForbidden(c) => Some(ChatInfo {
            id: -CHANNEL_ID_OFFSET - c.id,
            kind: ChatKind::Supergroup,
            title: Some(c.title.clone()),
            username: None,
        }),
        tl::enums::Chat::Empty(_) => None,
    }
}

fn media_info(media: &Media) -> MediaInfo {
    match media {
        Media::Photo(_) => MediaInfo {
            kind: MediaKind::Photo,
            file_name: None,
            mime_type: Some("image/jpeg".to_owned()),
            size: 0,
        },
        Media::Sticker(_) => MediaInfo {
            kind: MediaKind::Sticker,
            file_name: None,
            mime_type: None,
            size: 0,
        },
        Media::Document(doc) => {
            let mime = doc.mime_type().map(str::to_owned);
            let kind = match mime.as_deref() {
                Some("audio/ogg") => MediaKind::Voice,
                Some(m) if m.starts_with("audio/") => MediaKind::Audio,
                Some(m) if m.starts_with("video/") => MediaKind::Video,
                _ => MediaKind::Document,
            };
            let name = doc.name();
            MediaInfo {
                kind,
                file_name: (!name.is_empty()).then(|| name.to_owned()),
                mime_type: mime,
                size: u64::try_from(doc.size()).unwrap_or_default(),
            }
        }
        _ => MediaInfo {
            kind: MediaKind::Other,
            file_name: None,
            mime_type: None,
            size: 0,
        },
    }
}

fn forward_origin(header: &tl::enums::MessageFwdHeader, cache: &PeerCache) -> ForwardOrigin {
    let tl::enums::MessageFwdHeader::Header(header) = header;
    match &header.from_id {
        Some(tl::enums::Peer::User(u)) => {
            let user = cache.users.get(&u.user_id).cloned().unwrap_or_else(|| {
                UserInfo::new(u.user_id, header.from_name.clone().unwrap_or_default())
            });
            ForwardOrigin::User(user)
        }
        Some(tl::enums::Peer::Channel(c)) => ForwardOrigin::Chat(ChatInfo {
            id: -CHANNEL_ID_OFFSET - c.channel_id,
            kind: ChatKind::Channel,
            title: header.from_name.clone(),
            username: None,
        }),
        Some(tl::enums::Peer::Chat(c)) => ForwardOrigin::Chat(ChatInfo {
            id: -c.chat_id,
            kind: ChatKind::Group,
            title: header.from_name.clone(),
            username: None,
        }),
        None => ForwardOrigin::Hidden(header.from_name.clone().unwrap_or_default()),
    }
}

fn inline_buttons(message: &Message) -> Vec<tl::enums::KeyboardButton> {
    match message.reply_markup() {
        Some(tl::enums::ReplyMarkup::ReplyInlineMarkup(markup)) => markup
            .rows
            .into_iter()
            .flat_map(|tl::enums::KeyboardButtonRow::Row(row)| row.buttons)
            .collect(),
        _ => Vec::new(),
    }
}

fn button_label(button: &tl::enums::KeyboardButton) -> String {
    match button {
        tl::enums::KeyboardButton::Button(b) => b.text.clone(),
        tl::enums::KeyboardButton::Callback(b) => b.text.clone(),
        tl::enums::KeyboardButton::Url(b) => b.text.clone(),
        tl::enums::KeyboardButton::SwitchInline(b) => b.text.clone(),
        _ => String::new(),
    }
}

fn text_links(message: &Message) -> Vec<String> {
    message
        .fmt_entities()
        .into_iter()
        .flatten()
        .filter_map(|entity| match entity {
            tl::enums::MessageEntity::TextUrl(link) => Some(link.url.clone()),
            _ => None,
        })
        .collect()
}

fn convert_message(message: &Message, cache: &mut PeerCache) -> IncomingMessage {
    let chat = match message.peer() {
        Ok(peer) => {
            cache.remember(peer);
            chat_info(peer)
        }
        Err(peer_ref) => {
            let id = peer_ref.id.bot_api_dialog_id();
            ChatInfo {
                id,
                kind: if id > 0 {
                    ChatKind::Private
                } else if id <= -CHANNEL_ID_OFFSET {
                    ChatKind::Supergroup
                } else {
                    ChatKind::Group
                },
                ..ChatInfo::default()
            }
        }
    };

    let sender = match message.sender() {
        Some(peer @ Peer::User(user)) => {
            cache.remember(peer);
            Some(user_info(&user.raw))
        }
        _ => None,
    };

    let forward = message
        .forward_header()
        .map(|header| forward_origin(&header, cache));

    IncomingMessage {
        id: message.id(),
        chat,
        sender,
        outgoing: message.outgoing(),
        text: message.text().to_owned(),
        reply_to: message.reply_to_message_id(),
        date: message.date(),
        media: message.media().as_ref().map(media_info),
        forward,
        buttons: inline_buttons(message).iter().map(button_label).collect(),
        links: text_links(message),
    }
}

fn channel_member(user: UserInfo, participant: tl::enums::ChannelParticipant) -> ChatMember {
    use tl::enums::ChannelParticipant as P;

    match participant {
        P::Participant(p) => {
            let mut member = ChatMember::new(user, MemberStatus::Member);
            member.joined_date = timestamp(p.date);
            member
        }
        P::ParticipantSelf(p) => {
            let mut member = ChatMember::new(user, MemberStatus::Member);
            member.joined_date = timestamp(p.date);
            member
        }
        P::Creator(p) => {
            let mut member = ChatMember::new(user, MemberStatus::Owner);
            member.custom_title = p.rank;
            let tl::enums::ChatAdminRights::Rights(rights) = p.admin_rights;
            member.admin_rights = Some(admin_rights_from(&rights));
            member
        }
        P::Admin(p) => {
            let mut member = ChatMember::new(user, MemberStatus::Administrator);
            member.custom_title = p.rank;
            member.joined_date = timestamp(p.date);
            let tl::enums::ChatAdminRights::Rights(rights) = p.admin_rights;
            member.admin_rights = Some(admin_rights_from(&rights));
            member
        }
        P::Banned(p) => {
            let tl::enums::ChatBannedRights::Rights(rights) = p.banned_rights;
            let status = if rights.view_messages {
                MemberStatus::Banned
            } else if p.left {
                MemberStatus::Left
            } else {
                MemberStatus::Restricted
            };
            let mut member = ChatMember::new(user, status);
            member.joined_date = timestamp(p.date);
            member.permissions = Some(permissions_from(&rights));
            member.until_date = (rights.until_date > 0)
                .then(|| timestamp(rights.until_date))
                .flatten();
            member
        }
        P::Left(_) => ChatMember::new(user, MemberStatus::Left),
    }
}

fn admin_rights_from(raw: &tl::types::ChatAdminRights) -> AdminRights {
    AdminRights {
        manage_chat: raw.other,
        delete_messages: raw.delete_messages,
        manage_video_chats: raw.manage_call,
        restrict_members: raw.ban_users,
        change_info: raw.change_info,
        invite_users: raw.invite_users,
        pin_messages: raw.pin_messages,
        promote_members: raw.add_admins,
        post_stories: raw.post_stories,
        edit_stories: raw.edit_stories,
        delete_stories: raw.delete_stories,
        anonymous: raw.anonymous,
    }
}

fn admin_rights_raw(rights: &AdminRights) -> tl::types::ChatAdminRights {
    tl::types::ChatAdminRights {
        change_info: rights.change_info,
        post_messages: false,
        edit_messages: false,
        delete_messages: rights.delete_messages,
        ban_users: rights.restrict_members,
        invite_users: rights.invite_users,
        pin_messages: rights.pin_messages,
        add_admins: rights.promote_members,
        anonymous: rights.anonymous,
        manage_call: rights.manage_video_chats,
        other: rights.manage_chat,
        manage_topics: false,
        post_stories: rights.post_stories,
        edit_stories: rights.edit_stories,
        delete_stories: rights.delete_stories,
    }
}

fn permissions_from(raw: &tl::types::ChatBannedRights) -> ChatPermissions {
    ChatPermissions {
        send_messages: !raw.send_messages && !raw.send_plain,
        send_media: !raw.send_media,
        send_other: !raw.send_stickers && !raw.send_gifs,
        send_polls: !raw.send_polls,
        embed_links: !raw.embed_links,
        invite_users: !raw.invite_users,
        pin_messages: !raw.pin_messages,
        change_info: !raw.change_info,
    }
}

/// Converts permissions into the "banned" flags Telegram expects.
fn banned_rights(perms: &ChatPermissions) -> tl::types::ChatBannedRights {
    tl::types::ChatBannedRights {
        view_messages: false,
        send_messages: !perms.send_messages,
        send_media: !perms.send_media,
        send_stickers: !perms.send_other,
        send_gifs: !perms.send_other,
        send_games: !perms.send_other,
        send_inline: !perms.send_other,
        embed_links: !perms.embed_links,
        send_polls: !perms.send_polls,
        change_info: !perms.change_info,
        invite_users: !perms.invite_users,
        pin_messages: !perms.pin_messages,
        manage_topics: !perms.pin_messages,
        send_photos: !perms.send_media,
        send_videos: !perms.send_media,
        send_roundvideos: !perms.send_media,
        send_audios: !perms.send_media,
        send_voices: !perms.send_media,
        send_docs: !perms.send_media,
        send_plain: !perms.send_messages,
        until_date: 0,
    }
}

/// Masks a phone number for logging (shows last 4 digits).
pub fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}
