//! Waiting for the next matching message in a chat.
//!
//! Commands that converse with the operator or with other bots register a
//! pending listener; the update loop offers every incoming message here
//! before command dispatch and the first matching listener receives it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

use super::types::{ChatId, IncomingMessage};

/// Predicate a listener applies to candidate messages.
pub type MessageFilter = Box<dyn Fn(&IncomingMessage) -> bool + Send + Sync>;

/// Errors returned while waiting for a message.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("Timed out after {0:?} waiting for a response")]
    Timeout(Duration),

    #[error("Listener was dropped before a response arrived")]
    Closed,
}

struct Pending {
    id: u64,
    chat: ChatId,
    filter: MessageFilter,
    tx: oneshot::Sender<IncomingMessage>,
}

/// Registry of pending listeners.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    pending: Mutex<Vec<Pending>>,
}

impl Listeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the next message in `chat` accepted by `filter`.
    pub async fn wait_for<F>(
        &self,
        chat: ChatId,
        filter: F,
        timeout: Duration,
    ) -> Result<IncomingMessage, ListenError>
    where
        F: Fn(&IncomingMessage) -> bool + Send + Sync + 'static,
    {
        self.listen(chat, filter).await.recv(timeout).await
    }

    /// Registers a listener now and returns it for a later [`Subscription::recv`].
    ///
    /// Use this when the awaited message is triggered by a send, so a fast
    /// response cannot slip past before the listener exists.
    pub async fn listen<F>(&self, chat: ChatId, filter: F) -> Subscription<'_>
    where
        F: Fn(&IncomingMessage) -> bool + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        self.pending.lock().await.push(Pending {
            id,
            chat,
            filter: Box::new(filter),
            tx,
        });
        debug!("Listener {} registered on chat {}", id, chat);

        Subscription {
            registry: self,
            id,
            rx,
        }
    }

    /// Delivers `message` to the oldest matching listener.
    ///
    /// Returns true if a listener consumed the message.
    pub async fn offer(&self, message: &IncomingMessage) -> bool {
        let mut pending = self.pending.lock().await;
        pending.retain(|p| !p.tx.is_closed());

        let Some(pos) = pending
            .iter()
            .position(|p| p.chat == message.chat.id && (p.filter)(message))
        else {
            return false;
        };

        let listener = pending.remove(pos);
        debug!("Listener {} matched message {}", listener.id, message.id);
        listener.tx.send(message.clone()).is_ok()
    }

    /// Number of listeners still waiting.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// A registered listener that has not fired yet.
pub struct Subscription<'a> {
    registry: &'a Listeners,
    id: u64,
    rx: oneshot::Receiver<IncomingMessage>,
}

impl Subscription<'_> {
    /// Waits up to `timeout` for the matching message.
    pub async fn recv(self, timeout: Duration) -> Result<IncomingMessage, ListenError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ListenError::Closed),
            Err(_) => {
                debug!("Listener {} timed out after {:?}", self.id, timeout);
                self.registry
                    .pending
                    .lock()
                    .await
                    .retain(|p| p.id != self.id);
                Err(ListenError::Timeout(timeout))
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::telegram::mock::incoming;

    #[tokio::test]
    async fn test_offer_delivers_to_matching_listener() {
        let listeners = Arc::new(Listeners::new());

        let waiter = {
            let listeners = Arc::clone(&listeners);
            tokio::spawn(async move {
                listeners
                    .wait_for(-5, |m| m.text == "2", Duration::from_secs(5))
                    .await
            })
        };

        while listeners.pending_count().await == 0 {
            tokio::task::yield_now().await;
        }

        assert!(!listeners.offer(&incoming(-5, 1, "1")).await);
        assert!(!listeners.offer(&incoming(-6, 2, "2")).await);
        assert!(listeners.offer(&incoming(-5, 3, "2")).await);

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.id, 3);
        assert_eq!(listeners.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_wait_for_times_out_and_unregisters() {
        let listeners = Listeners::new();
        let result = listeners
            .wait_for(1, |_| true, Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(ListenError::Timeout(_))));
        assert_eq!(listeners.pending_count().await, 0);
        assert!(!listeners.offer(&incoming(1, 1, "late")).await);
    }

    #[tokio::test]
    async fn test_subscription_catches_message_offered_before_recv() {
        let listeners = Listeners::new();
        let subscription = listeners.listen(7, |m| m.text.starts_with("ok")).await;

        assert!(listeners.offer(&incoming(7, 9, "ok done")).await);

        let got = subscription.recv(Duration::from_millis(50)).await.unwrap();
        assert_eq!(got.id, 9);
    }
}
