//! Periodic reconciliation of cached snapshots with storage.
//!
//! Write-behind persistence is attempted once per update. When enabled, this
//! task re-persists sessions whose latest revision never made it to storage.

use crate::engine::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn the flush loop. A zero interval disables it.
pub fn spawn_flush_task(engine: Arc<SyncEngine>, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }

    info!("Flushing unpersisted sessions every {:?}", interval);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let written = engine.flush_pending().await;
            if written > 0 {
                info!("Flushed {} session(s) to storage", written);
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use crate::testing::setup;
    use inkshare_core::SessionStore;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_zero_interval_disables() {
        let (engine, _) = setup().await;
        assert!(spawn_flush_task(engine, Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_recovers_failed_write() {
        let (engine, store) = setup().await;
        let (conn, _rx) = ConnectionHandle::new();

        store.fail_writes.store(true, Ordering::SeqCst);
        engine.update(&conn, &"S1".into(), vec![json!("latest")]).await.unwrap();
        store.fail_writes.store(false, Ordering::SeqCst);

        let task = spawn_flush_task(engine.clone(), Duration::from_secs(5)).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        task.abort();

        let stored = store.find_by_id(&"S1".into()).await.unwrap();
        assert_eq!(stored.elements, vec![json!("latest")]);
    }
}
