//! Shared fixtures for unit tests.

use crate::auth::tests::SECRET;
use crate::auth::JwtVerifier;
use crate::engine::SyncEngine;
use inkshare_core::storage::BoxFuture;
use inkshare_core::{
    Element, MemoryStorage, ParticipantId, Session, SessionId, SessionStore, StorageError,
    StorageResult,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Memory store whose writes and reads can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStorage,
    pub fail_writes: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl SessionStore for FlakyStore {
    fn insert(&self, session: &Session) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.insert(session)
    }

    fn find_by_id(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<Session>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StorageError::Io("unreachable".into())) });
        }
        self.inner.find_by_id(id)
    }

    fn replace_elements(
        &self,
        id: &SessionId,
        elements: &[Element],
    ) -> BoxFuture<'_, StorageResult<()>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StorageError::Io("disk full".into())) });
        }
        self.inner.replace_elements(id, elements)
    }

    fn delete(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<()>> {
        self.inner.delete(id)
    }

    fn list_for_participant(
        &self,
        participant: &ParticipantId,
    ) -> BoxFuture<'_, StorageResult<Vec<Session>>> {
        self.inner.list_for_participant(participant)
    }
}

/// Engine over session `S1`, owned by alice and shared with bob, holding one
/// stored element.
pub async fn setup() -> (Arc<SyncEngine>, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::default());
    let mut session = Session::with_id("S1".into(), "alice".into());
    session.share("bob".into()).unwrap();
    session.elements = vec![json!({"id": "stored"})];
    store.insert(&session).await.unwrap();

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        Arc::new(JwtVerifier::new(SECRET)),
    ));
    (engine, store)
}
