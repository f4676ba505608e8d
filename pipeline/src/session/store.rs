//! Session table
//!
//! Owns every live `SessionState`, keyed by session id. Writes are
//! serialized through one lock, which gives the single-writer-per-key
//! guarantee batches rely on; readers get cloned snapshots so nothing
//! downstream can outlive an eviction.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::telemetry::TelemetryBatch;

use super::aggregator::apply_batch;
use super::state::SessionState;

/// What one ingested batch did to its session.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Snapshot of the session after the batch was applied.
    pub state: SessionState,
    /// Events applied.
    pub applied: usize,
    /// Malformed events skipped.
    pub skipped: usize,
    /// Whether this batch created the session.
    pub created: bool,
}

/// Concurrency-safe table of live sessions with idle eviction.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionState>>,
    config: SessionConfig,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Apply a batch to its session, creating the session on first contact.
    pub async fn ingest(&self, batch: &TelemetryBatch) -> IngestOutcome {
        let mut sessions = self.sessions.write().await;
        let created = !sessions.contains_key(&batch.session_id);
        let state = sessions.entry(batch.session_id.clone()).or_insert_with(|| {
            SessionState::new(
                &batch.session_id,
                &batch.tenant_id,
                self.config.sample_capacity,
                self.config.exit_vector_capacity,
            )
        });
        let (applied, skipped) = apply_batch(state, batch);
        if created {
            debug!(session_id = %batch.session_id, tenant_id = %batch.tenant_id, "session created");
        }
        IngestOutcome {
            state: state.clone(),
            applied,
            skipped,
            created,
        }
    }

    /// Snapshot of one session, if live.
    pub async fn get(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle longer than the configured timeout, as seen
    /// at `now`. Returns the number evicted.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let timeout = self.config.idle_timeout_secs as i64;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, state| state.idle_secs(now) <= timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    /// Periodic eviction sweep; runs until the token cancels.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(store.config.sweep_interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        store.evict_idle(Utc::now()).await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RawEvent;

    fn store() -> SessionStore {
        SessionStore::new(SessionConfig::default())
    }

    fn batch_at(session_id: &str, received_at: DateTime<Utc>) -> TelemetryBatch {
        let mut batch = TelemetryBatch::new(session_id, "t-1").with_event(&RawEvent::PageView {
            url: "/pricing".into(),
        });
        batch.received_at = received_at;
        batch
    }

    #[tokio::test]
    async fn test_first_contact_creates_session() {
        let store = store();
        let outcome = store.ingest(&batch_at("s-1", Utc::now())).await;
        assert!(outcome.created);
        assert_eq!(outcome.applied, 1);
        assert!(store.contains("s-1").await);

        let outcome = store.ingest(&batch_at("s-1", Utc::now())).await;
        assert!(!outcome.created);
        assert_eq!(outcome.state.interactions.price_views, 2);
    }

    #[tokio::test]
    async fn test_idle_session_evicted_after_sweep() {
        let store = store();
        let old = Utc::now() - chrono::Duration::minutes(31);
        store.ingest(&batch_at("s-idle", old)).await;
        store.ingest(&batch_at("s-live", Utc::now())).await;
        assert_eq!(store.active_sessions().await, 2);

        let evicted = store.evict_idle(Utc::now()).await;
        assert_eq!(evicted, 1);
        assert!(!store.contains("s-idle").await);
        assert!(store.contains("s-live").await);
    }

    #[tokio::test]
    async fn test_session_at_exact_timeout_survives() {
        let store = store();
        let boundary = Utc::now() - chrono::Duration::minutes(30);
        store.ingest(&batch_at("s-edge", boundary)).await;
        store.evict_idle(Utc::now()).await;
        assert!(store.contains("s-edge").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_evicts_on_interval() {
        let store = Arc::new(store());
        let old = Utc::now() - chrono::Duration::minutes(31);
        store.ingest(&batch_at("s-idle", old)).await;

        let cancel = CancellationToken::new();
        let handle = store.spawn_sweeper(cancel.clone());
        // Let the sweeper start, then cross one sweep interval.
        tokio::task::yield_now().await;
        tokio::time::advance(std::time::Duration::from_secs(61)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(!store.contains("s-idle").await);
        cancel.cancel();
        let _ = handle.await;
    }
}
