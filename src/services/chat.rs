//! Live chat room: a registry of connected sockets plus persist-then-fan-out.
//!
//! Joining and publishing take the same lock. A joining connection therefore
//! sees every message either in its history or live, never both and never
//! neither, and all connections observe messages in persisted order.
//!
//! Each connection has a bounded queue. A connection whose queue is full when
//! a message is fanned out is dropped from the room, which closes its socket.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::db::Store;
use crate::models::chat::{ChatBroadcast, ServerEvent};
use crate::models::user::{CurrentUser, SessionUser};

pub type ConnectionId = u64;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The password was changed or reset after the socket was opened.
    #[error("Session is no longer valid")]
    SessionEnded,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Handle returned by [`ChatHub::join`]. The first event on `events` is
/// always the history replay. `events` yields `None` once the hub has
/// dropped the connection.
pub struct ChatConnection {
    pub id: ConnectionId,
    pub user: CurrentUser,
    pub session: SessionUser,
    pub events: mpsc::Receiver<ServerEvent>,
}

struct Subscriber {
    session: SessionUser,
    tx: mpsc::Sender<ServerEvent>,
}

pub struct ChatHub {
    store: Store,
    history_limit: u64,
    max_message_length: usize,
    buffer_size: usize,
    connections: Mutex<HashMap<ConnectionId, Subscriber>>,
    next_id: AtomicU64,
    publish_lock: tokio::sync::Mutex<()>,
}

impl ChatHub {
    #[must_use]
    pub fn new(store: Store, config: &ChatConfig) -> Self {
        Self {
            store,
            history_limit: config.history_limit,
            max_message_length: config.max_message_length,
            buffer_size: config.buffer_size.max(2),
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            publish_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Registers an authenticated connection and queues its history replay.
    pub async fn join(&self, user: CurrentUser, session: SessionUser) -> Result<ChatConnection> {
        let _guard = self.publish_lock.lock().await;

        let history = self.store.recent_chat_messages(self.history_limit).await?;

        let (tx, rx) = mpsc::channel(self.buffer_size);
        // Fresh channel with capacity left, so this cannot fail.
        let _ = tx.try_send(ServerEvent::History(history));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = {
            let mut connections = self.lock_connections();
            connections.insert(id, Subscriber { session, tx });
            connections.len()
        };
        record_active(active);

        info!(event = "chat_joined", connection_id = id, user_id = user.id, "Chat connection joined");

        Ok(ChatConnection {
            id,
            user,
            session,
            events: rx,
        })
    }

    pub fn leave(&self, id: ConnectionId) {
        let active = {
            let mut connections = self.lock_connections();
            connections.remove(&id);
            connections.len()
        };
        record_active(active);

        debug!(event = "chat_left", connection_id = id, "Chat connection closed");
    }

    /// Drops every connection opened by `user_id`. Their sockets close once
    /// the queued events are flushed.
    pub fn revoke_user(&self, user_id: i32) -> usize {
        self.evict(|session| session.id == user_id)
    }

    /// Persists `text` as the author behind `session` and sends it to every
    /// connection.
    ///
    /// Whitespace-only and overlong messages are dropped and `Ok(None)` is
    /// returned. A session older than the author's current one is refused
    /// and every stale connection of that author is dropped.
    pub async fn publish(
        &self,
        session: SessionUser,
        text: &str,
    ) -> Result<Option<ChatBroadcast>, ChatError> {
        let text = text.trim();

        if text.is_empty() {
            return Ok(None);
        }
        if text.chars().count() > self.max_message_length {
            warn!(
                event = "chat_message_dropped",
                user_id = session.id,
                length = text.chars().count(),
                "Chat message exceeds maximum length"
            );
            return Ok(None);
        }

        let _guard = self.publish_lock.lock().await;

        let author = match self.store.get_user(session.id).await? {
            Some(author) if author.session_version == session.session_version => author,
            current => {
                let current_version = current.map(|user| user.session_version);
                let dropped = self.evict(|other| {
                    other.id == session.id && Some(other.session_version) != current_version
                });
                warn!(
                    event = "chat_session_ended",
                    user_id = session.id,
                    dropped,
                    "Refusing chat message from an ended session"
                );
                return Err(ChatError::SessionEnded);
            }
        };

        let timestamp = chrono::Utc::now().timestamp();
        self.store
            .add_chat_message(author.id, text, timestamp)
            .await?;

        let message = ChatBroadcast {
            user_id: author.id,
            text: text.to_string(),
            display_name: author.display_name,
            profile_color: author.profile_color,
            timestamp,
        };

        self.broadcast(&ServerEvent::Message(message.clone()));
        metrics::counter!("chat_messages_total").increment(1);

        Ok(Some(message))
    }

    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.lock_connections().len()
    }

    #[must_use]
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.lock_connections().contains_key(&id)
    }

    fn broadcast(&self, event: &ServerEvent) {
        let active = {
            let mut connections = self.lock_connections();
            connections.retain(|id, subscriber| match subscriber.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        event = "chat_connection_evicted",
                        connection_id = *id,
                        user_id = subscriber.session.id,
                        "Chat connection fell behind, disconnecting"
                    );
                    metrics::counter!("chat_evictions_total").increment(1);
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
            connections.len()
        };
        record_active(active);
    }

    fn evict(&self, matches: impl Fn(&SessionUser) -> bool) -> usize {
        let (dropped, active) = {
            let mut connections = self.lock_connections();
            let before = connections.len();
            connections.retain(|_, subscriber| !matches(&subscriber.session));
            (before - connections.len(), connections.len())
        };
        record_active(active);
        dropped
    }

    fn lock_connections(&self) -> std::sync::MutexGuard<'_, HashMap<ConnectionId, Subscriber>> {
        self.connections
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(count: usize) {
    metrics::gauge!("chat_active_connections").set(count as f64);
}
