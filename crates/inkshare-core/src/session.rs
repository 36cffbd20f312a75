//! Shared drawing sessions.
//!
//! A session is owned by one participant, optionally shared with others, and
//! holds an ordered sequence of opaque drawable elements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// A single drawable element. The server never looks inside.
pub type Element = serde_json::Value;

/// Immutable element sequence shared between the cache and every recipient.
pub type Snapshot = Arc<Vec<Element>>;

/// Unique identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identity of a participant, as resolved from an externally issued credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What a participant may do with a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Viewer,
    Denied,
}

/// Errors from changing who a session is shared with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Owner cannot be added to shared list")]
    OwnerCannotBeShared,
    #[error("Already shared with {0}")]
    AlreadyShared(ParticipantId),
    #[error("Owner {0} is listed as a shared viewer")]
    OwnerListedAsViewer(ParticipantId),
    #[error("Viewer {0} is listed more than once")]
    DuplicateViewer(ParticipantId),
}

/// A shared drawing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SessionRecord")]
pub struct Session {
    /// Unique session identifier.
    pub id: SessionId,
    /// Participant that created the session.
    pub owner: ParticipantId,
    /// Participants the owner has shared the session with. Never contains the owner.
    pub shared: Vec<ParticipantId>,
    /// Drawable elements in caller-supplied order.
    pub elements: Vec<Element>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Session as stored, before the viewer list is checked.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    id: SessionId,
    owner: ParticipantId,
    #[serde(default)]
    shared: Vec<ParticipantId>,
    #[serde(default)]
    elements: Vec<Element>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRecord> for Session {
    type Error = SessionError;

    fn try_from(record: SessionRecord) -> Result<Self, Self::Error> {
        let mut session = Session {
            id: record.id,
            owner: record.owner,
            shared: Vec::with_capacity(record.shared.len()),
            elements: record.elements,
            created_at: record.created_at,
        };
        for viewer in record.shared {
            match session.share(viewer) {
                Ok(()) => {}
                Err(SessionError::OwnerCannotBeShared) => {
                    return Err(SessionError::OwnerListedAsViewer(session.owner));
                }
                Err(SessionError::AlreadyShared(viewer)) => {
                    return Err(SessionError::DuplicateViewer(viewer));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(session)
    }
}

impl Session {
    /// Create an empty, unshared session.
    pub fn new(owner: ParticipantId) -> Self {
        Self {
            id: SessionId::generate(),
            owner,
            shared: Vec::new(),
            elements: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Same as [`Session::new`] but with a caller-chosen id.
    pub fn with_id(id: SessionId, owner: ParticipantId) -> Self {
        Self {
            id,
            ..Self::new(owner)
        }
    }

    pub fn access_for(&self, participant: &ParticipantId) -> Access {
        if &self.owner == participant {
            Access::Owner
        } else if self.shared.contains(participant) {
            Access::Viewer
        } else {
            Access::Denied
        }
    }

    /// Whether `participant` may join this session's room.
    pub fn can_join(&self, participant: &ParticipantId) -> bool {
        self.access_for(participant) != Access::Denied
    }

    /// Grant `participant` viewer access.
    pub fn share(&mut self, participant: ParticipantId) -> Result<(), SessionError> {
        match self.access_for(&participant) {
            Access::Owner => Err(SessionError::OwnerCannotBeShared),
            Access::Viewer => Err(SessionError::AlreadyShared(participant)),
            Access::Denied => {
                self.shared.push(participant);
                Ok(())
            }
        }
    }

    /// Revoke viewer access. Unknown participants are ignored.
    pub fn unshare(&mut self, participant: &ParticipantId) {
        self.shared.retain(|p| p != participant);
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
