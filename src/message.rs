//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::event::ChatEvent;
use crate::types::UserId;

/// Client → Server message
///
/// All messages from client to server. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to a user id and enter the chat
    Join { user_id: String },
    /// Send a chat message as the bound user
    SendMessage { content: String },
    /// Request the full chat history
    ///
    /// Connections that have not joined must name themselves.
    GetHistory {
        #[serde(default)]
        user_id: Option<String>,
    },
    /// Leave the chat (the connection stays open)
    Leave,
    /// Start streaming notifications to this connection
    Listen,
    /// List currently joined users
    Users,
}

/// Server → Client message
///
/// All messages from server to client. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted
    Welcome { text: String },
    /// Message recorded
    Sent { ok: bool },
    /// Every event recorded so far
    History { events: Vec<ChatEvent> },
    /// Leave acknowledged
    Left { ok: bool },
    /// Listen acknowledged
    Listening { ok: bool },
    /// Currently joined users
    Users { users: Vec<UserId> },
    /// Formatted notification from the user's mailbox
    Notification { text: String },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// User id already has a live session
    AlreadyJoined,
    /// Operation requires a joined user
    NotJoined,
    /// Empty user id
    InvalidUserId,
    /// Invalid message format
    InvalidMessage,
    /// Server-side failure
    Internal,
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let code = match &err {
            AppError::AlreadyJoined(_) => ErrorCode::AlreadyJoined,
            AppError::NotJoined(_) | AppError::NoSession => ErrorCode::NotJoined,
            AppError::InvalidUserId => ErrorCode::InvalidUserId,
            AppError::Json(_) => ErrorCode::InvalidMessage,
            // Fatal errors are not typically converted (connection closes)
            AppError::WebSocket(_)
            | AppError::Io(_)
            | AppError::ConnectionClosed
            | AppError::ChannelSend => {
                ErrorCode::Internal
            }
        };
        let message = match code {
            ErrorCode::Internal => "Internal error".to_string(),
            _ => err.to_string(),
        };
        ServerMessage::Error { code, message }
    }
}
