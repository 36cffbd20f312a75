//! Live room membership.
//!
//! A room is the set of connections currently joined to one session. Each
//! connection owns a bounded outbox drained by its own socket task, so
//! pushing to one member never waits on another. A member whose outbox fills
//! up is dropped from its rooms and told to close.

use crate::protocol::ServerMessage;
use dashmap::DashMap;
use inkshare_core::SessionId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tracing::warn;
use uuid::Uuid;

/// Unique id for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Messages a connection may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 256;

/// Outcome of queueing a message for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The outbox is full; the connection has been told to close.
    Overflowed,
    /// The connection's socket task is gone.
    Closed,
}

/// Handle used to address a connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<ServerMessage>,
    overflow: Arc<Notify>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its socket task drains.
    pub fn new() -> (Self, mpsc::Receiver<ServerMessage>) {
        Self::with_capacity(OUTBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (outbox, rx) = mpsc::channel(capacity);
        (
            Self {
                id: ConnectionId::new(),
                outbox,
                overflow: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for this connection without waiting.
    pub fn send(&self, msg: ServerMessage) -> Delivery {
        match self.outbox.try_send(msg) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                self.overflow.notify_one();
                Delivery::Overflowed
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Resolves once a message could not be queued because the outbox was full.
    pub async fn overflowed(&self) {
        self.overflow.notified().await
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    /// Members of each room.
    rooms: DashMap<SessionId, HashMap<ConnectionId, ConnectionHandle>>,
    /// Rooms each connection belongs to.
    memberships: DashMap<ConnectionId, HashSet<SessionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining twice is a no-op.
    pub fn join(&self, session: &SessionId, conn: &ConnectionHandle) {
        self.rooms
            .entry(session.clone())
            .or_default()
            .insert(conn.id, conn.clone());
        self.memberships
            .entry(conn.id)
            .or_default()
            .insert(session.clone());
    }

    /// Remove a connection from every room it belongs to.
    ///
    /// Returns the rooms it left.
    pub fn leave(&self, conn: ConnectionId) -> Vec<SessionId> {
        let Some((_, sessions)) = self.memberships.remove(&conn) else {
            return Vec::new();
        };

        for session in &sessions {
            if let Some(mut room) = self.rooms.get_mut(session) {
                room.remove(&conn);
                // Clean up empty rooms
                if room.is_empty() {
                    drop(room);
                    self.rooms.remove_if(session, |_, members| members.is_empty());
                }
            }
        }
        sessions.into_iter().collect()
    }

    /// Deliver `msg` to every member of the room except `except`.
    ///
    /// Returns the number of members the message was queued for.
    pub fn broadcast(
        &self,
        session: &SessionId,
        msg: &ServerMessage,
        except: Option<ConnectionId>,
    ) -> usize {
        let recipients: Vec<ConnectionHandle> = match self.rooms.get(session) {
            Some(room) => room
                .values()
                .filter(|conn| Some(conn.id) != except)
                .cloned()
                .collect(),
            None => return 0,
        };

        let mut queued = 0;
        for conn in &recipients {
            match conn.send(msg.clone()) {
                Delivery::Queued => queued += 1,
                Delivery::Overflowed => {
                    warn!("Connection {} is not keeping up, dropping it from its rooms", conn.id);
                    self.leave(conn.id);
                }
                // Members that vanished since the snapshot simply fail to queue
                Delivery::Closed => {}
            }
        }
        queued
    }

    /// Drop a room entirely, e.g. when its session is deleted.
    pub fn remove_room(&self, session: &SessionId) -> usize {
        let Some((_, members)) = self.rooms.remove(session) else {
            return 0;
        };
        for conn in members.keys() {
            if let Some(mut joined) = self.memberships.get_mut(conn) {
                joined.remove(session);
            }
        }
        self.memberships.retain(|_, joined| !joined.is_empty());
        members.len()
    }

    pub fn is_member(&self, session: &SessionId, conn: ConnectionId) -> bool {
        self.rooms
            .get(session)
            .map(|room| room.contains_key(&conn))
            .unwrap_or(false)
    }

    /// Number of connections in a room.
    pub fn members(&self, session: &SessionId) -> usize {
        self.rooms.get(session).map(|room| room.len()).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
