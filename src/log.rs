//! Append-only message log

use crate::event::ChatEvent;

/// Ordered record of every chat event since startup
///
/// Entries are never modified or removed. Consistent snapshots under
/// concurrent appends come from the coordinator's lock, not from here.
#[derive(Debug, Default)]
pub struct MessageLog {
    events: Vec<ChatEvent>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: ChatEvent) {
        self.events.push(event);
    }

    /// Every event appended so far, in append order
    pub fn snapshot(&self) -> Vec<ChatEvent> {
        self.events.clone()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
