//! Auto-delete runner.
//!
//! Commands hand over `(chat, message, delay)` triples; the runner keeps
//! them in a deadline heap and, on every tick, deletes whatever is due,
//! batching ids that share a chat into a single call.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, interval};
use tracing::{debug, info, warn};

use crate::telegram::{ChatApi, ChatId, MessageId};

/// Messages that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerMessage {
    /// Delete a message once its deadline passes.
    Delete {
        chat: ChatId,
        message: MessageId,
        at: Instant,
    },
    /// Stop the scheduler.
    Shutdown,
}

/// Cloneable sender side used by commands.
#[derive(Debug, Clone)]
pub struct DeleteHandle {
    tx: mpsc::UnboundedSender<SchedulerMessage>,
}

impl DeleteHandle {
    /// Creates a handle together with the receiver for [`AutoDeleter::run`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SchedulerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deletes `message` in `chat` after `delay`.
    pub fn schedule(&self, chat: ChatId, message: MessageId, delay: Duration) {
        let request = SchedulerMessage::Delete {
            chat,
            message,
            at: Instant::now() + delay,
        };
        if self.tx.send(request).is_err() {
            warn!("Auto-delete scheduler is gone, message {} stays", message);
        }
    }

    /// Asks the runner to stop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(SchedulerMessage::Shutdown);
    }
}

/// Background deleter of temporary replies.
pub struct AutoDeleter {
    api: Arc<dyn ChatApi>,

    /// Pending deletions ordered by deadline.
    queue: BinaryHeap<Reverse<(Instant, ChatId, MessageId)>>,

    /// How often due deletions are flushed.
    check_interval: Duration,
}

impl AutoDeleter {
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            queue: BinaryHeap::new(),
            check_interval: Duration::from_millis(500),
        }
    }

    /// Sets the check interval for due deletions.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Runs until [`SchedulerMessage::Shutdown`] or all handles are dropped.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SchedulerMessage>) {
        info!("Auto-delete scheduler started");

        let mut check_timer = interval(self.check_interval);

        loop {
            tokio::select! {
                _ = check_timer.tick() => {
                    self.tick().await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(SchedulerMessage::Delete { chat, message, at }) => {
                            debug!("Message {} in {} scheduled for deletion", message, chat);
                            self.queue.push(Reverse((at, chat, message)));
                        }
                        Some(SchedulerMessage::Shutdown) | None => {
                            if !self.queue.is_empty() {
                                info!("Dropping {} pending deletion(s)", self.queue.len());
                            }
                            info!("Scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Deletes every message whose deadline has passed.
    async fn tick(&mut self) {
        let now = Instant::now();
        let mut due: BTreeMap<ChatId, Vec<MessageId>> = BTreeMap::new();

        while let Some(Reverse((at, chat, message))) = self.queue.peek().copied() {
            if at > now {
                break;
            }
            self.queue.pop();
            due.entry(chat).or_default().push(message);
        }

        for (chat, ids) in due {
            if let Err(e) = self.api.delete_messages(chat, &ids).await {
                warn!("Failed to auto-delete {:?} in {}: {}", ids, chat, e);
            }
        }
    }
}

impl std::fmt::Debug for AutoDeleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoDeleter")
            .field("pending", &self.queue.len())
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}
