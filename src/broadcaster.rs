//! Fan-out loop
//!
//! Consumes broadcast requests one at a time, in the order the coordinator
//! queued them, and offers the rendered notification to every mailbox
//! except the originator's. Delivery is best-effort: a full mailbox loses
//! the notification and the loop moves on.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::SharedState;
use crate::error::SendError;
use crate::event::ChatEvent;
use crate::types::UserId;

/// An event waiting to be fanned out, and who must not receive it
#[derive(Debug, Clone)]
pub struct BroadcastRequest {
    pub event: ChatEvent,
    pub exclude: UserId,
}

impl BroadcastRequest {
    pub fn new(event: ChatEvent, exclude: UserId) -> Self {
        Self { event, exclude }
    }
}

/// The single consumer of the broadcast queue
pub struct Broadcaster {
    state: SharedState,
    queue: mpsc::Receiver<BroadcastRequest>,
    /// Pause between successive requests
    delay: Duration,
}

impl Broadcaster {
    pub(crate) fn new(
        state: SharedState,
        queue: mpsc::Receiver<BroadcastRequest>,
        delay: Duration,
    ) -> Self {
        Self {
            state,
            queue,
            delay,
        }
    }

    /// Run the fan-out loop
    ///
    /// Continues until every coordinator handle has been dropped.
    pub async fn run(mut self) {
        info!("Broadcaster started");

        while let Some(request) = self.queue.recv().await {
            self.deliver(&request).await;

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!("Broadcaster shutting down");
    }

    /// Offer one request to every recipient; returns how many accepted it
    async fn deliver(&self, request: &BroadcastRequest) -> usize {
        let text = request.event.notification();
        let state = self.state.read().await;
        let mut delivered = 0;

        state
            .registry
            .for_each_except(&request.exclude, |session| {
                match session.mailbox.offer(text.clone()) {
                    Ok(()) => delivered += 1,
                    Err(SendError::MailboxFull) => {
                        warn!("Channel full for user {}, notification dropped", session.user_id);
                    }
                    Err(SendError::ChannelClosed) => {
                        debug!("Listener for {} is gone, notification dropped", session.user_id);
                    }
                }
            });

        debug!(
            "Broadcast from {} delivered to {} of {} other users",
            request.event.user_id,
            delivered,
            state.registry.len().saturating_sub(1)
        );
        delivered
    }

    /// Fan out everything already queued, without pausing
    #[cfg(test)]
    pub(crate) async fn drain_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(request) = self.queue.try_recv() {
            self.deliver(&request).await;
            processed += 1;
        }
        processed
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("pending", &self.queue.len())
            .field("delay", &self.delay)
            .finish()
    }
}
