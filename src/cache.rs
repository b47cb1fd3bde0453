// ⏳ Snapshot Cache - read-through TTL cache of the full record set
//
// Holds one immutable snapshot and its load time. A read past the TTL
// reloads synchronously from the store; otherwise the loaded copy is served.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::RecordStore;
use crate::record_set::RecordSet;

/// One loaded copy of the full record set.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// Identity of this load; changes on every reload
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub records: RecordSet,
}

impl Snapshot {
    pub fn new(records: RecordSet, loaded_at: DateTime<Utc>) -> Self {
        Snapshot {
            id: Uuid::new_v4(),
            loaded_at,
            records,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.loaded_at
    }
}

/// Largest TTL chrono can represent; longer settings are clamped to it.
const MAX_TTL_SECONDS: i64 = i64::MAX / 1_000;

pub struct SnapshotCache<S: RecordStore> {
    store: S,
    ttl: Duration,
    current: Option<Arc<Snapshot>>,
}

impl<S: RecordStore> SnapshotCache<S> {
    pub fn new(store: S, ttl: Duration) -> Self {
        SnapshotCache {
            store,
            ttl,
            current: None,
        }
    }

    pub fn with_ttl_seconds(store: S, ttl_seconds: u64) -> Self {
        let seconds = i64::try_from(ttl_seconds)
            .unwrap_or(MAX_TTL_SECONDS)
            .min(MAX_TTL_SECONDS);
        Self::new(store, Duration::seconds(seconds))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&mut self) -> Arc<Snapshot> {
        self.get_at(Utc::now())
    }

    /// Serve the cached snapshot, reloading when `now - loaded_at > ttl`.
    pub fn get_at(&mut self, now: DateTime<Utc>) -> Arc<Snapshot> {
        match &self.current {
            Some(snapshot) if snapshot.age(now) <= self.ttl => Arc::clone(snapshot),
            _ => self.reload_at(now),
        }
    }

    /// Drop the cached copy and load a fresh one.
    pub fn refresh(&mut self) -> Arc<Snapshot> {
        self.reload_at(Utc::now())
    }

    fn reload_at(&mut self, now: DateTime<Utc>) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot::new(self.store.load_all(), now));
        info!(
            snapshot_id = %snapshot.id,
            records = snapshot.records.len(),
            "sales snapshot loaded"
        );
        self.current = Some(Arc::clone(&snapshot));
        snapshot
    }
}
