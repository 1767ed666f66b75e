use chrono::{DateTime, Duration, Utc};
use marquee_shared::SeatState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One seat held by one holder for one showtime.
///
/// At most one active (non-expired) lock exists per seat; a lapsed lock is
/// treated as absent by every read path, so correctness never waits on the
/// sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatLock {
    pub seat_id: String,
    pub holder_id: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub extensions: u32,
}

impl SeatLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Ledger cell for one seat. Absence from the ledger means available.
#[derive(Debug, Clone)]
pub enum SeatEntry {
    Held(SeatLock),
    Booked {
        holder_id: String,
        booked_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct AcquireGrant {
    pub seat_ids: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Seat-level detail of a failed batch acquisition, split by cause so the
/// caller can report contested seats precisely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireConflict {
    pub locked: Vec<String>,
    pub booked: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtendError {
    #[error("Seats not held by caller: {0:?}")]
    NotHeld(Vec<String>),

    #[error("Hold already expired for seats: {0:?}")]
    Expired(Vec<String>),

    #[error("Extension limit reached")]
    LimitReached,
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("Seats not held by caller: {0:?}")]
    NotHeld(Vec<String>),

    #[error("Hold already expired for seats: {0:?}")]
    Expired(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseOutcome {
    pub released: Vec<String>,
    pub skipped: Vec<String>,
}

impl ReleaseOutcome {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// Authoritative seat table for one showtime.
///
/// Pure and synchronous: callers serialize access through the per-showtime
/// mutex in `LockStore`, which makes every batch operation all-or-nothing
/// without any intermediate state becoming observable.
pub struct SeatLedger {
    seats: HashMap<String, SeatEntry>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self {
            seats: HashMap::new(),
        }
    }

    /// Atomically acquire the whole batch, or report exactly which seats
    /// are contested. Seats already held unexpired by the same holder are
    /// refreshed rather than treated as self-conflict.
    pub fn try_acquire(
        &mut self,
        seat_ids: &[String],
        holder_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<AcquireGrant, AcquireConflict> {
        let mut locked = Vec::new();
        let mut booked = Vec::new();

        for seat_id in seat_ids {
            match self.seats.get(seat_id) {
                Some(SeatEntry::Booked { .. }) => booked.push(seat_id.clone()),
                Some(SeatEntry::Held(lock))
                    if !lock.is_expired(now) && lock.holder_id != holder_id =>
                {
                    locked.push(seat_id.clone())
                }
                // Free, lapsed, or the caller's own hold being refreshed
                _ => {}
            }
        }

        if !locked.is_empty() || !booked.is_empty() {
            return Err(AcquireConflict { locked, booked });
        }

        let expires_at = now + ttl;
        for seat_id in seat_ids {
            self.seats.insert(
                seat_id.clone(),
                SeatEntry::Held(SeatLock {
                    seat_id: seat_id.clone(),
                    holder_id: holder_id.to_string(),
                    locked_at: now,
                    expires_at,
                    extensions: 0,
                }),
            );
        }

        Ok(AcquireGrant {
            seat_ids: seat_ids.to_vec(),
            expires_at,
        })
    }

    /// Push expiry forward uniformly for the whole set. Only the original
    /// holder may extend, and never past the extension cap (0 = uncapped).
    pub fn extend(
        &mut self,
        seat_ids: &[String],
        holder_id: &str,
        ttl: Duration,
        max_extensions: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, ExtendError> {
        let mut not_held = Vec::new();
        let mut expired = Vec::new();
        let mut capped = false;

        for seat_id in seat_ids {
            match self.seats.get(seat_id) {
                Some(SeatEntry::Held(lock)) if lock.holder_id == holder_id => {
                    if lock.is_expired(now) {
                        expired.push(seat_id.clone());
                    } else if max_extensions > 0 && lock.extensions >= max_extensions {
                        capped = true;
                    }
                }
                _ => not_held.push(seat_id.clone()),
            }
        }

        if !expired.is_empty() {
            return Err(ExtendError::Expired(expired));
        }
        if !not_held.is_empty() {
            return Err(ExtendError::NotHeld(not_held));
        }
        if capped {
            return Err(ExtendError::LimitReached);
        }

        let expires_at = now + ttl;
        for seat_id in seat_ids {
            if let Some(SeatEntry::Held(lock)) = self.seats.get_mut(seat_id) {
                lock.expires_at = expires_at;
                lock.extensions += 1;
            }
        }

        Ok(expires_at)
    }

    /// Remove the caller's lock records. A seat not held by the caller is a
    /// per-seat no-op, reported back as a skip (partial failure). The
    /// caller's own lapsed locks are removed too; the sweeper would have
    /// reclaimed them anyway.
    pub fn release(&mut self, seat_ids: &[String], holder_id: &str) -> ReleaseOutcome {
        let mut outcome = ReleaseOutcome::default();

        for seat_id in seat_ids {
            match self.seats.get(seat_id) {
                Some(SeatEntry::Held(lock)) if lock.holder_id == holder_id => {
                    self.seats.remove(seat_id);
                    outcome.released.push(seat_id.clone());
                }
                _ => outcome.skipped.push(seat_id.clone()),
            }
        }

        outcome
    }

    /// Convert held locks to booked, removing the seats from the lockable
    /// pool permanently. Requires the full batch still held unexpired by
    /// the caller, which is what makes a second commit of the same batch
    /// fail.
    pub fn finalize(
        &mut self,
        seat_ids: &[String],
        holder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FinalizeError> {
        let mut not_held = Vec::new();
        let mut expired = Vec::new();

        for seat_id in seat_ids {
            match self.seats.get(seat_id) {
                Some(SeatEntry::Held(lock)) if lock.holder_id == holder_id => {
                    if lock.is_expired(now) {
                        expired.push(seat_id.clone());
                    }
                }
                _ => not_held.push(seat_id.clone()),
            }
        }

        if !expired.is_empty() {
            return Err(FinalizeError::Expired(expired));
        }
        if !not_held.is_empty() {
            return Err(FinalizeError::NotHeld(not_held));
        }

        for seat_id in seat_ids {
            self.seats.insert(
                seat_id.clone(),
                SeatEntry::Booked {
                    holder_id: holder_id.to_string(),
                    booked_at: now,
                },
            );
        }

        Ok(())
    }

    /// Remove lapsed locks, returning the reclaimed seat ids.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut swept = Vec::new();

        self.seats.retain(|seat_id, entry| match entry {
            SeatEntry::Held(lock) if lock.is_expired(now) => {
                swept.push(seat_id.clone());
                false
            }
            _ => true,
        });

        swept.sort();
        swept
    }

    /// Read-only projection of every non-available seat. Lapsed locks
    /// project as available and are omitted.
    pub fn snapshot(&self, now: DateTime<Utc>) -> HashMap<String, SeatState> {
        self.seats
            .iter()
            .filter_map(|(seat_id, entry)| match entry {
                SeatEntry::Held(lock) if !lock.is_expired(now) => Some((
                    seat_id.clone(),
                    SeatState::Locked {
                        holder_id: lock.holder_id.clone(),
                        expires_at: lock.expires_at.timestamp(),
                    },
                )),
                SeatEntry::Held(_) => None,
                SeatEntry::Booked { .. } => Some((seat_id.clone(), SeatState::Booked)),
            })
            .collect()
    }

    pub fn locked_seat_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut ids: Vec<String> = self
            .seats
            .iter()
            .filter_map(|(seat_id, entry)| match entry {
                SeatEntry::Held(lock) if !lock.is_expired(now) => Some(seat_id.clone()),
                _ => None,
            })
            .collect();
        ids.sort();
        ids
    }

    pub fn booked_seat_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .seats
            .iter()
            .filter_map(|(seat_id, entry)| match entry {
                SeatEntry::Booked { .. } => Some(seat_id.clone()),
                _ => None,
            })
            .collect();
        ids.sort();
        ids
    }

    pub fn entry(&self, seat_id: &str) -> Option<&SeatEntry> {
        self.seats.get(seat_id)
    }
}

impl Default for SeatLedger {
    fn default() -> Self {
        Self::new()
    }
}
