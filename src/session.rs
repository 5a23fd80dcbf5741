//! Session and mailbox definitions
//!
//! A session is the live registration of one user. It owns the sending
//! half of a bounded mailbox; the receiving half (the inbox) is handed to
//! whoever listens on behalf of that user.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::error::SendError;
use crate::types::UserId;

/// Sending half of a user's bounded notification queue
#[derive(Debug)]
pub struct Mailbox {
    sender: mpsc::Sender<String>,
}

impl Mailbox {
    /// Offer a notification without waiting
    ///
    /// A full mailbox drops the notification; the caller decides how to report it.
    pub(crate) fn offer(&self, text: String) -> Result<(), SendError> {
        self.sender.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SendError::MailboxFull,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

/// Receiving half of a user's mailbox
///
/// Yields `None` once the session has been deregistered and every
/// pending notification has been read.
#[derive(Debug)]
pub struct Inbox {
    receiver: mpsc::Receiver<String>,
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Take the next pending notification, if any
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    /// Take every notification currently queued
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Create a connected mailbox/inbox pair holding at most `capacity` notifications
pub(crate) fn mailbox(capacity: usize) -> (Mailbox, Inbox) {
    let (sender, receiver) = mpsc::channel(capacity);
    (Mailbox { sender }, Inbox { receiver })
}

/// Registry entry for a joined user
#[derive(Debug)]
pub struct Session {
    pub user_id: UserId,
    pub(crate) mailbox: Mailbox,
    /// Present until a listener takes it
    inbox: Option<Inbox>,
    pub joined_at: Instant,
}

impl Session {
    /// Create a new session with a fresh mailbox of the given capacity
    pub fn new(user_id: UserId, capacity: usize) -> Self {
        let (mailbox, inbox) = mailbox(capacity);
        Self {
            user_id,
            mailbox,
            inbox: Some(inbox),
            joined_at: Instant::now(),
        }
    }

    /// Hand out the inbox; only the first caller gets it
    pub fn take_inbox(&mut self) -> Option<Inbox> {
        self.inbox.take()
    }

    /// How long this session has been live
    pub fn joined_for(&self) -> Duration {
        self.joined_at.elapsed()
    }

    pub fn is_listening(&self) -> bool {
        self.inbox.is_none()
    }

    /// End the session, closing the mailbox
    ///
    /// The listener still drains what was queued, then sees end-of-stream.
    pub fn close(self) {
        drop(self.mailbox);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_creation() {
        let session = Session::new(UserId::parse("alice").unwrap(), 8);

        assert_eq!(session.user_id.as_str(), "alice");
        assert_eq!(session.mailbox.capacity(), 8);
        assert!(!session.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn test_joined_for_tracks_time() {
        let session = Session::new(UserId::parse("alice").unwrap(), 8);

        tokio::time::advance(Duration::from_secs(90)).await;

        assert!(session.joined_for() >= Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_inbox_taken_once() {
        let mut session = Session::new(UserId::parse("alice").unwrap(), 8);

        assert!(session.take_inbox().is_some());
        assert!(session.is_listening());
        assert!(session.take_inbox().is_none());
    }

    #[tokio::test]
    async fn test_offer_full_mailbox_drops() {
        let (mailbox, mut inbox) = mailbox(2);

        assert_eq!(mailbox.offer("one".to_string()), Ok(()));
        assert_eq!(mailbox.offer("two".to_string()), Ok(()));
        assert_eq!(mailbox.offer("three".to_string()), Err(SendError::MailboxFull));

        assert_eq!(inbox.drain(), vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_offer_after_inbox_dropped() {
        let (mailbox, inbox) = mailbox(2);
        drop(inbox);

        assert_eq!(mailbox.offer("lost".to_string()), Err(SendError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_close_ends_stream_after_pending() {
        let mut session = Session::new(UserId::parse("alice").unwrap(), 4);
        let mut inbox = session.take_inbox().unwrap();
        session.mailbox.offer("last words".to_string()).unwrap();

        session.close();

        assert_eq!(inbox.recv().await.as_deref(), Some("last words"));
        assert_eq!(inbox.recv().await, None);
    }
}
