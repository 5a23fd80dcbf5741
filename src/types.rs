//! Basic type definitions for the chat broker
//!
//! Provides newtype wrappers for type safety:
//! - `UserId`: non-empty chat identifier chosen by the user
//! - `ConnectionId`: UUID-based transport connection identifier

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// User identifier (newtype pattern)
///
/// Always non-empty and free of surrounding whitespace. Every core
/// operation takes a `&UserId`, so an empty identifier is rejected
/// once at the boundary by [`UserId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parse a raw identifier, trimming whitespace
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, AppError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidUserId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport connection identifier
///
/// Wraps a UUID v4. Used in logs to tell connections apart before
/// (and after) a user identifier is bound to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
