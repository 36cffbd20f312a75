//! The synchronization core.
//!
//! Admits connections into session rooms, keeps the latest snapshot of every
//! active session in memory, relays updates to the rest of the room, and
//! persists them behind the live path.

use crate::auth::{bearer_token, AuthError, TokenVerifier};
use crate::cache::SessionCache;
use crate::protocol::{self, ServerMessage};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use dashmap::DashMap;
use inkshare_core::{Element, SessionId, SessionStore, Snapshot, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why a join was refused.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("no bearer token")]
    MissingCredential,
    #[error(transparent)]
    InvalidCredential(#[from] AuthError),
    /// Also covers sessions that do not exist.
    #[error("not authorized")]
    NotAuthorized,
    #[error("join failed: {0}")]
    Unexpected(StorageError),
}

impl JoinError {
    /// The event reported back to the joining client.
    pub fn to_message(&self) -> ServerMessage {
        match self {
            JoinError::MissingCredential => ServerMessage::unauthorized(protocol::NO_TOKEN),
            JoinError::InvalidCredential(_) => ServerMessage::unauthorized(protocol::INVALID_TOKEN),
            JoinError::NotAuthorized => ServerMessage::unauthorized(protocol::NOT_AUTHORIZED),
            JoinError::Unexpected(_) => ServerMessage::error(protocol::JOIN_FAILED),
        }
    }
}

/// Highest revision of a session known to be durably stored.
type PersistGate = Arc<Mutex<u64>>;

pub struct SyncEngine {
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn TokenVerifier>,
    cache: SessionCache,
    registry: ConnectionRegistry,
    persisted: DashMap<SessionId, PersistGate>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn SessionStore>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            store,
            verifier,
            cache: SessionCache::new(),
            registry: ConnectionRegistry::new(),
            persisted: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Admit `conn` into the room for `session_id` and send it the current
    /// elements.
    ///
    /// `authorization` is the raw `Authorization` header from the handshake.
    /// Nothing shared is modified unless the join succeeds.
    pub async fn join(
        &self,
        conn: &ConnectionHandle,
        session_id: &SessionId,
        authorization: Option<&str>,
    ) -> Result<(), JoinError> {
        let token = bearer_token(authorization).ok_or(JoinError::MissingCredential)?;
        let participant = self.verifier.verify(token)?;

        let session = match self.store.find_by_id(session_id).await {
            Ok(session) => session,
            Err(StorageError::NotFound(_)) => {
                info!("Join for unknown session {} by {}", session_id, participant);
                return Err(JoinError::NotAuthorized);
            }
            Err(e) => return Err(JoinError::Unexpected(e)),
        };

        if !session.can_join(&participant) {
            info!("Unauthorized access attempt by {} on session {}", participant, session_id);
            return Err(JoinError::NotAuthorized);
        }

        self.registry.join(session_id, conn);

        let elements = self
            .cache
            .get(session_id)
            .unwrap_or_else(|| Arc::new(session.elements));
        conn.send(ServerMessage::LoadCanvas { elements });

        info!("Connection {} ({}) joined session {}", conn.id(), participant, session_id);
        Ok(())
    }

    /// Accept a full replacement of a session's elements from `sender`.
    ///
    /// The cache and the rest of the room see the update before this returns;
    /// the returned task persists it in the background.
    pub fn update(
        self: &Arc<Self>,
        sender: &ConnectionHandle,
        session_id: &SessionId,
        elements: Vec<Element>,
    ) -> JoinHandle<()> {
        let elements: Snapshot = Arc::new(elements);
        let revision = self.cache.put(session_id, elements.clone());

        let delivered = self.registry.broadcast(
            session_id,
            &ServerMessage::ReceiveDrawingUpdate {
                elements: elements.clone(),
            },
            Some(sender.id()),
        );
        debug!(
            "Session {} revision {} relayed to {} peer(s)",
            session_id, revision, delivered
        );

        let engine = Arc::clone(self);
        let session_id = session_id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.persist(&session_id, revision, &elements).await {
                error!("Failed to persist session {}: {}", session_id, e);
            }
        })
    }

    /// Remove a closed connection from every room.
    pub fn disconnect(&self, conn: &ConnectionHandle) {
        let left = self.registry.leave(conn.id());
        if !left.is_empty() {
            debug!("Connection {} left {} room(s)", conn.id(), left.len());
        }
    }

    /// Drop all in-memory state for a deleted session.
    pub fn forget_session(&self, session_id: &SessionId) {
        self.cache.evict(session_id);
        self.persisted.remove(session_id);
        let members = self.registry.remove_room(session_id);
        info!("Forgot session {} ({} member(s) detached)", session_id, members);
    }

    /// Write cached snapshots whose latest revision never reached storage.
    ///
    /// Returns how many sessions were written.
    pub async fn flush_pending(&self) -> usize {
        let mut written = 0;
        for (session_id, revision) in self.cache.revisions() {
            if self.persisted_revision(&session_id).await >= revision {
                continue;
            }
            let Some(cached) = self.cache.get_with_revision(&session_id) else {
                continue;
            };
            match self
                .persist(&session_id, cached.revision, &cached.elements)
                .await
            {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => warn!("Flush of session {} failed: {}", session_id, e),
            }
        }
        written
    }

    async fn persisted_revision(&self, session_id: &SessionId) -> u64 {
        match self.persisted.get(session_id).map(|gate| gate.clone()) {
            Some(gate) => *gate.lock().await,
            None => 0,
        }
    }

    /// Store `elements` as revision `revision` of the session.
    ///
    /// Writes for one session are serialized and never move storage back to
    /// an older revision. Returns whether a write happened.
    async fn persist(
        &self,
        session_id: &SessionId,
        revision: u64,
        elements: &[Element],
    ) -> Result<bool, StorageError> {
        let gate = self
            .persisted
            .entry(session_id.clone())
            .or_default()
            .clone();
        let mut stored = gate.lock().await;
        if *stored >= revision {
            debug!(
                "Skipping stale write of session {} revision {} (stored {})",
                session_id, revision, *stored
            );
            return Ok(false);
        }

        match self.store.replace_elements(session_id, elements).await {
            Ok(()) => {
                *stored = revision;
                Ok(true)
            }
            Err(StorageError::NotFound(_)) => {
                debug!("Session {} no longer exists, update not persisted", session_id);
                *stored = revision;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
