//! Broadcast coordinator
//!
//! Owns the registry and the message log behind one read/write lock and
//! turns every state change into a broadcast request for the fan-out loop.
//!
//! Writers (join, send, leave, listen) take the write side, history and
//! user listing take the read side. A broadcast queue slot is reserved
//! *before* the write lock and filled while the lock is held, so the queue
//! sees events in log order and a saturated queue never blocks the lock
//! the fan-out loop needs.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::broadcaster::{BroadcastRequest, Broadcaster};
use crate::config::ServerConfig;
use crate::error::{AppError, SendError};
use crate::event::{self_confirmation, ChatEvent};
use crate::log::MessageLog;
use crate::registry::Registry;
use crate::session::{Inbox, Session};
use crate::types::UserId;

/// Everything guarded by the coordinator's lock
#[derive(Debug, Default)]
pub struct ChatState {
    pub(crate) registry: Registry,
    pub(crate) log: MessageLog,
}

pub(crate) type SharedState = Arc<RwLock<ChatState>>;

/// Handle to the chat core
///
/// Cheap to clone; every connection handler gets its own copy. The
/// fan-out loop stops once the last handle is dropped.
#[derive(Debug, Clone)]
pub struct Coordinator {
    state: SharedState,
    broadcast_tx: mpsc::Sender<BroadcastRequest>,
    mailbox_capacity: usize,
}

impl Coordinator {
    /// Create the coordinator and its fan-out loop
    ///
    /// The caller must spawn [`Broadcaster::run`] exactly once.
    pub fn new(config: &ServerConfig) -> (Self, Broadcaster) {
        let state: SharedState = Arc::new(RwLock::new(ChatState::default()));
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_capacity);
        let broadcaster = Broadcaster::new(state.clone(), broadcast_rx, config.fanout_delay);

        let coordinator = Self {
            state,
            broadcast_tx,
            mailbox_capacity: config.mailbox_capacity,
        };
        (coordinator, broadcaster)
    }

    /// Register `user_id`, record the join and announce it to everyone else
    ///
    /// Returns the welcome text for the new user.
    pub async fn join(&self, user_id: &UserId) -> Result<String, AppError> {
        let permit = self.reserve_broadcast().await?;
        let mut state = self.state.write().await;

        state
            .registry
            .register(user_id.clone(), self.mailbox_capacity)?;

        let event = ChatEvent::join(user_id);
        state.log.append(event.clone());
        permit.send(BroadcastRequest::new(event, user_id.clone()));

        info!("User {} joined", user_id);
        debug!(
            "Total users: {}, Log length: {}",
            state.registry.len(),
            state.log.len()
        );

        Ok(format!("Welcome {}! You have joined the chat.", user_id))
    }

    /// Record a message from a joined user and fan it out
    ///
    /// Everyone else receives `[user] content`; the sender gets
    /// `[You] content` directly in their own mailbox instead.
    pub async fn send_message(&self, user_id: &UserId, content: String) -> Result<(), AppError> {
        let permit = self.reserve_broadcast().await?;
        let mut state = self.state.write().await;

        if !state.registry.contains(user_id) {
            return Err(AppError::NotJoined(user_id.clone()));
        }

        let confirmation = self_confirmation(&content);
        let event = ChatEvent::message(user_id, content);
        state.log.append(event.clone());
        permit.send(BroadcastRequest::new(event, user_id.clone()));

        if let Some(session) = state.registry.lookup(user_id) {
            if let Err(SendError::MailboxFull) = session.mailbox.offer(confirmation) {
                warn!("Mailbox full for user {}, confirmation dropped", user_id);
            }
        }

        debug!("Message from {} recorded", user_id);
        Ok(())
    }

    /// Every event recorded so far, in order
    pub async fn history(&self, user_id: &UserId) -> Vec<ChatEvent> {
        let state = self.state.read().await;
        let events = state.log.snapshot();
        debug!("Sent history to {} ({} events)", user_id, events.len());
        events
    }

    /// Remove `user_id` and announce the departure
    ///
    /// Leaving without a live session is a successful no-op. Returns
    /// whether a session was actually removed.
    pub async fn leave(&self, user_id: &UserId) -> Result<bool, AppError> {
        let permit = self.reserve_broadcast().await?;
        let mut state = self.state.write().await;

        let Some(joined_for) = state.registry.lookup(user_id).map(Session::joined_for) else {
            debug!("Leave for {} ignored: not joined", user_id);
            return Ok(false);
        };

        state.registry.deregister(user_id)?;

        let event = ChatEvent::leave(user_id);
        state.log.append(event.clone());
        permit.send(BroadcastRequest::new(event, user_id.clone()));

        info!("User {} left after {:?}", user_id, joined_for);
        debug!(
            "Total users: {}, Log length: {}",
            state.registry.len(),
            state.log.len()
        );

        Ok(true)
    }

    /// Start receiving notifications for `user_id`
    ///
    /// Hands out the session's inbox on the first call. Unknown users and
    /// repeated calls get `None`.
    pub async fn listen(&self, user_id: &UserId) -> Option<Inbox> {
        let mut state = self.state.write().await;
        let session = state.registry.lookup_mut(user_id)?;

        match session.take_inbox() {
            Some(inbox) => {
                info!("{} started listening", user_id);
                Some(inbox)
            }
            None => {
                debug!("{} is already listening", user_id);
                None
            }
        }
    }

    /// Currently joined users, sorted
    pub async fn online_users(&self) -> Vec<UserId> {
        self.state.read().await.registry.user_ids()
    }

    async fn reserve_broadcast(&self) -> Result<mpsc::Permit<'_, BroadcastRequest>, AppError> {
        self.broadcast_tx
            .reserve()
            .await
            .map_err(|_| AppError::ChannelSend)
    }
}
