//! Chat events recorded in the message log

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Join,
    Leave,
    Message,
}

/// A single immutable entry of the chat history
///
/// Serialized with exactly three fields: `user_id`, `content`, `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub user_id: UserId,
    pub content: String,
    pub kind: EventKind,
}

impl ChatEvent {
    pub fn join(user_id: &UserId) -> Self {
        Self {
            content: format!("User {} joined", user_id),
            user_id: user_id.clone(),
            kind: EventKind::Join,
        }
    }

    pub fn leave(user_id: &UserId) -> Self {
        Self {
            content: format!("User {} left", user_id),
            user_id: user_id.clone(),
            kind: EventKind::Leave,
        }
    }

    pub fn message(user_id: &UserId, content: String) -> Self {
        Self {
            user_id: user_id.clone(),
            content,
            kind: EventKind::Message,
        }
    }

    /// Render the event the way recipients display it
    ///
    /// - join: `--> <content>`
    /// - leave: `<-- <content>`
    /// - message: `[<user>] <content>`
    pub fn notification(&self) -> String {
        match self.kind {
            EventKind::Join => format!("--> {}", self.content),
            EventKind::Leave => format!("<-- {}", self.content),
            EventKind::Message => format!("[{}] {}", self.user_id, self.content),
        }
    }
}

/// Echo shown to the sender of a message instead of the broadcast copy
pub fn self_confirmation(content: &str) -> String {
    format!("[You] {}", content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserId {
        UserId::parse(name).unwrap()
    }

    #[test]
    fn test_notification_formats() {
        let u = user("u");
        assert_eq!(ChatEvent::join(&u).notification(), "--> User u joined");
        assert_eq!(ChatEvent::leave(&u).notification(), "<-- User u left");
        assert_eq!(
            ChatEvent::message(&u, "hi".to_string()).notification(),
            "[u] hi"
        );
        assert_eq!(self_confirmation("hi"), "[You] hi");
    }

    #[test]
    fn test_event_serialize() {
        let event = ChatEvent::message(&user("alice"), "hello".to_string());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"user_id": "alice", "content": "hello", "kind": "message"})
        );
    }

    #[test]
    fn test_event_kind_deserialize() {
        let json = r#"{"user_id": "bob", "content": "User bob left", "kind": "leave"}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, EventKind::Leave);
        assert_eq!(event, ChatEvent::leave(&user("bob")));
    }
}
