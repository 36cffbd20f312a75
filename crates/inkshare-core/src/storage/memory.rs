//! In-memory storage implementation.

use super::{newest_first, BoxFuture, SessionStore, StorageError, StorageResult};
use crate::session::{Element, ParticipantId, Session, SessionId};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl SessionStore for MemoryStorage {
    fn insert(&self, session: &Session) -> BoxFuture<'_, StorageResult<()>> {
        let session = session.clone();
        Box::pin(async move {
            let mut sessions = self.sessions.write().map_err(lock_error)?;
            sessions.insert(session.id.clone(), session);
            Ok(())
        })
    }

    fn find_by_id(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<Session>> {
        let id = id.clone();
        Box::pin(async move {
            let sessions = self.sessions.read().map_err(lock_error)?;
            let found = sessions.get(&id).cloned();
            found.ok_or(StorageError::NotFound(id))
        })
    }

    fn replace_elements(
        &self,
        id: &SessionId,
        elements: &[Element],
    ) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.clone();
        let elements = elements.to_vec();
        Box::pin(async move {
            let mut sessions = self.sessions.write().map_err(lock_error)?;
            match sessions.get_mut(&id) {
                Some(session) => {
                    session.elements = elements;
                    Ok(())
                }
                None => Err(StorageError::NotFound(id)),
            }
        })
    }

    fn delete(&self, id: &SessionId) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.clone();
        Box::pin(async move {
            let mut sessions = self.sessions.write().map_err(lock_error)?;
            sessions.remove(&id);
            Ok(())
        })
    }

    fn list_for_participant(
        &self,
        participant: &ParticipantId,
    ) -> BoxFuture<'_, StorageResult<Vec<Session>>> {
        let participant = participant.clone();
        Box::pin(async move {
            let sessions = self.sessions.read().map_err(lock_error)?;
            let mut visible: Vec<Session> = sessions
                .values()
                .filter(|s| s.can_join(&participant))
                .cloned()
                .collect();
            drop(sessions);
            newest_first(&mut visible);
            Ok(visible)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::block_on;
    use chrono::Duration;
    use serde_json::json;

    fn session(id: &str, owner: &str) -> Session {
        Session::with_id(id.into(), owner.into())
    }

    #[test]
    fn test_insert_and_find() {
        let storage = MemoryStorage::new();
        let s = session("s1", "alice");

        block_on(storage.insert(&s)).unwrap();
        let loaded = block_on(storage.find_by_id(&"s1".into())).unwrap();

        assert_eq!(loaded, s);
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.find_by_id(&"nonexistent".into()));

        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_replace_elements() {
        let storage = MemoryStorage::new();
        block_on(storage.insert(&session("s1", "alice"))).unwrap();

        let elements = vec![json!({"id": "rect1"}), json!({"id": "rect2"})];
        block_on(storage.replace_elements(&"s1".into(), &elements)).unwrap();

        let loaded = block_on(storage.find_by_id(&"s1".into())).unwrap();
        assert_eq!(loaded.elements, elements);
    }

    #[test]
    fn test_replace_elements_missing_session() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.replace_elements(&"gone".into(), &[json!(1)]));

        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete() {
        let storage = MemoryStorage::new();
        block_on(storage.insert(&session("s1", "alice"))).unwrap();

        block_on(storage.delete(&"s1".into())).unwrap();
        block_on(storage.delete(&"s1".into())).unwrap();
        assert!(block_on(storage.find_by_id(&"s1".into())).is_err());
    }

    #[test]
    fn test_list_for_participant() {
        let storage = MemoryStorage::new();

        let mut older = session("older", "alice");
        older.created_at = older.created_at - Duration::minutes(5);
        let mut shared = session("shared", "bob");
        shared.share("alice".into()).unwrap();
        let other = session("other", "carol");

        for s in [&older, &shared, &other] {
            block_on(storage.insert(s)).unwrap();
        }

        let list = block_on(storage.list_for_participant(&"alice".into())).unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["shared", "older"]);
    }

    #[test]
    fn test_find_for_participant_hides_private_sessions() {
        let storage = MemoryStorage::new();
        block_on(storage.insert(&session("s1", "alice"))).unwrap();

        assert!(block_on(storage.find_for_participant(&"s1".into(), &"alice".into())).is_ok());
        let hidden = block_on(storage.find_for_participant(&"s1".into(), &"carol".into()));
        assert!(hidden.unwrap_err().is_not_found());
    }
}
