use crate::ledger::SeatLedger;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shard map over per-showtime ledgers.
///
/// The `tokio::sync::Mutex` around each ledger is the per-showtime critical
/// section: every batch operation for one showtime serializes on it, so no
/// two conflicting operations on the same seat ever interleave, and
/// contention is bounded to one showtime's seats rather than the whole
/// system. The outer map lock is `std::sync::RwLock` and is never held
/// across an await point.
pub struct LockStore {
    showtimes: RwLock<HashMap<Uuid, Arc<Mutex<SeatLedger>>>>,
}

impl LockStore {
    pub fn new() -> Self {
        Self {
            showtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Ledger for a showtime, created on first use.
    pub fn ledger(&self, showtime_id: Uuid) -> Arc<Mutex<SeatLedger>> {
        if let Some(ledger) = self.existing(showtime_id) {
            return ledger;
        }

        let mut map = self.showtimes.write().expect("lock store poisoned");
        map.entry(showtime_id)
            .or_insert_with(|| {
                tracing::debug!(%showtime_id, "seat ledger created");
                Arc::new(Mutex::new(SeatLedger::new()))
            })
            .clone()
    }

    /// Ledger for a showtime if one already exists (sweeper path: never
    /// materializes empty shards).
    pub fn existing(&self, showtime_id: Uuid) -> Option<Arc<Mutex<SeatLedger>>> {
        self.showtimes
            .read()
            .expect("lock store poisoned")
            .get(&showtime_id)
            .cloned()
    }

    pub fn showtime_ids(&self) -> Vec<Uuid> {
        self.showtimes
            .read()
            .expect("lock store poisoned")
            .keys()
            .copied()
            .collect()
    }
}

impl Default for LockStore {
    fn default() -> Self {
        Self::new()
    }
}
