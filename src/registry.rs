//! Client registry
//!
//! Maps user identifiers to their live sessions and enforces that an
//! identifier has at most one session at a time.

use std::collections::HashMap;

use crate::error::AppError;
use crate::session::Session;
use crate::types::UserId;

/// All joined users: UserId -> Session
///
/// Not synchronized on its own; the coordinator guards it together
/// with the message log behind one read/write lock.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<UserId, Session>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh mailbox of `capacity`
    ///
    /// Fails if `user_id` already has a live session.
    pub fn register(&mut self, user_id: UserId, capacity: usize) -> Result<&Session, AppError> {
        if self.sessions.contains_key(&user_id) {
            return Err(AppError::AlreadyJoined(user_id));
        }
        let session = Session::new(user_id.clone(), capacity);
        Ok(self.sessions.entry(user_id).or_insert(session))
    }

    /// Remove the session and close its mailbox
    pub fn deregister(&mut self, user_id: &UserId) -> Result<(), AppError> {
        let session = self
            .sessions
            .remove(user_id)
            .ok_or_else(|| AppError::NotJoined(user_id.clone()))?;
        session.close();
        Ok(())
    }

    pub fn lookup(&self, user_id: &UserId) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    pub fn lookup_mut(&mut self, user_id: &UserId) -> Option<&mut Session> {
        self.sessions.get_mut(user_id)
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.sessions.contains_key(user_id)
    }

    /// Visit every session except the one owned by `exclude`
    pub fn for_each_except<F>(&self, exclude: &UserId, mut f: F)
    where
        F: FnMut(&Session),
    {
        self.sessions
            .iter()
            .filter(|(user_id, _)| *user_id != exclude)
            .for_each(|(_, session)| f(session));
    }

    /// Identifiers of every joined user, sorted
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
