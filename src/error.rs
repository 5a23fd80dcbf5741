//! Error types for the chat broker
//!
//! Defines application-level errors and mailbox delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::UserId;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (reported back to the requester).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection before replying
    #[error("Connection closed")]
    ConnectionClosed,

    /// Broadcast queue closed (fatal - fan-out loop is gone)
    #[error("Channel send error")]
    ChannelSend,

    /// A live session already exists for this identifier
    #[error("User {0} already exists")]
    AlreadyJoined(UserId),

    /// No live session for this identifier
    #[error("User {0} has not joined")]
    NotJoined(UserId),

    /// Connection has no user bound to it yet
    #[error("Join the chat first")]
    NoSession,

    /// Identifier was empty after trimming
    #[error("User id must not be empty")]
    InvalidUserId,
}

/// Message send errors
///
/// Occurs when offering a notification to a mailbox without waiting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The mailbox is at capacity; the notification was dropped
    #[error("Mailbox full")]
    MailboxFull,
}
