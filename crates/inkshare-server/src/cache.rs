//! Latest broadcast snapshot per session.
//!
//! Serves joins without a storage round-trip. Entries live until the process
//! exits or the session is deleted.

use dashmap::DashMap;
use inkshare_core::{SessionId, Snapshot};

/// A cached snapshot and the revision it was stored under.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub revision: u64,
    pub elements: Snapshot,
}

#[derive(Default)]
pub struct SessionCache {
    entries: DashMap<SessionId, CachedSnapshot>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SessionId) -> Option<Snapshot> {
        self.entries.get(id).map(|entry| entry.elements.clone())
    }

    pub fn get_with_revision(&self, id: &SessionId) -> Option<CachedSnapshot> {
        self.entries.get(id).map(|entry| entry.clone())
    }

    /// Overwrite the snapshot for `id`, returning its new revision.
    ///
    /// Revisions are strictly increasing per session for as long as the entry
    /// is not evicted.
    pub fn put(&self, id: &SessionId, elements: Snapshot) -> u64 {
        let mut entry = self.entries.entry(id.clone()).or_insert(CachedSnapshot {
            revision: 0,
            elements: Snapshot::default(),
        });
        entry.revision += 1;
        entry.elements = elements;
        entry.revision
    }

    pub fn evict(&self, id: &SessionId) -> Option<Snapshot> {
        self.entries.remove(id).map(|(_, entry)| entry.elements)
    }

    /// Session ids currently cached, with their revisions.
    pub fn revisions(&self) -> Vec<(SessionId, u64)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.revision))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_put_overwrites() {
        let cache = SessionCache::new();
        let id = SessionId::from("s1");

        assert!(cache.get(&id).is_none());
        assert_eq!(cache.put(&id, Arc::new(vec![json!(1)])), 1);
        assert_eq!(cache.put(&id, Arc::new(vec![json!(2)])), 2);

        assert_eq!(*cache.get(&id).unwrap(), vec![json!(2)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sessions_are_independent() {
        let cache = SessionCache::new();
        cache.put(&"a".into(), Arc::new(vec![json!("a")]));
        cache.put(&"b".into(), Arc::new(vec![json!("b")]));

        assert_eq!(*cache.get(&"a".into()).unwrap(), vec![json!("a")]);
        assert_eq!(cache.get_with_revision(&"b".into()).unwrap().revision, 1);
    }

    #[test]
    fn test_evict() {
        let cache = SessionCache::new();
        let id = SessionId::from("s1");
        cache.put(&id, Arc::new(vec![]));

        assert!(cache.evict(&id).is_some());
        assert!(cache.get(&id).is_none());
        assert!(cache.evict(&id).is_none());
        assert!(cache.is_empty());
    }
}
