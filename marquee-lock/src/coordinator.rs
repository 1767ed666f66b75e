use crate::notifier::ChangeNotifier;
use chrono::{DateTime, Utc};
use marquee_catalog::{CatalogError, CatalogRepository, Showtime};
use marquee_shared::{Masked, SeatMapEvent, SeatState};
use marquee_store::app_config::HoldRules;
use marquee_store::{AcquireConflict, ExtendError, FinalizeError, ReleaseOutcome};
use marquee_store::LockStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Coordinator-level failures, one distinct kind per cause so callers can
/// react precisely (redraw contested seats, resync, re-lock).
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Showtime not found: {0}")]
    ShowtimeNotFound(Uuid),

    #[error("Seats not in room: {0:?}")]
    SeatNotInRoom(Vec<String>),

    #[error("Seats already locked by another holder: {0:?}")]
    SeatAlreadyLocked(Vec<String>),

    #[error("Seats already booked: {booked:?}")]
    SeatAlreadyBooked {
        booked: Vec<String>,
        locked: Vec<String>,
    },

    #[error("Hold expired for seats: {0:?}")]
    HoldExpired(Vec<String>),

    #[error("Caller does not hold seats: {0:?}")]
    NotHolder(Vec<String>),

    #[error("Extension limit reached for this booking attempt")]
    ExtensionLimitReached,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Transient failure: {0}")]
    Transient(String),
}

impl LockError {
    /// Every seat contested by this failure, for seat-level redraws.
    pub fn conflicting_seat_ids(&self) -> Option<Vec<String>> {
        match self {
            LockError::SeatAlreadyLocked(ids) => Some(ids.clone()),
            LockError::SeatAlreadyBooked { booked, locked } => {
                let mut all: Vec<String> = booked.iter().chain(locked.iter()).cloned().collect();
                all.sort();
                Some(all)
            }
            LockError::HoldExpired(ids) | LockError::NotHolder(ids) => Some(ids.clone()),
            _ => None,
        }
    }
}

/// Result of a successful lock or extend: the held set and its uniform
/// expiry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HoldGrant {
    pub seat_ids: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

/// Full seat-map projection for one showtime, seeded from the catalog's
/// room layout and overlaid with lock state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SeatMapSnapshot {
    pub showtime_id: Uuid,
    pub seats: HashMap<String, SeatState>,
    pub locked_seat_ids: Vec<String>,
    pub booked_seat_ids: Vec<String>,
}

/// A live membership in a showtime's event group. The snapshot event is
/// taken under the showtime's critical section together with the receiver,
/// so no event between the two can be lost.
pub struct Subscription {
    pub snapshot: SeatMapEvent,
    pub receiver: broadcast::Receiver<SeatMapEvent>,
}

/// Transactional boundary over the lock store.
///
/// The coordinator is the only writer of lock records. Every mutating
/// operation validates against the catalog, takes the showtime's ledger
/// mutex, applies the batch, and publishes the resulting event before
/// releasing the mutex, so for any seat the event stream mirrors the
/// operation order. Tie-break is first-committed-wins: a later conflicting
/// request is rejected immediately, never queued.
pub struct LockCoordinator {
    store: Arc<LockStore>,
    catalog: Arc<dyn CatalogRepository>,
    notifier: Arc<ChangeNotifier>,
    rules: HoldRules,
}

impl LockCoordinator {
    pub fn new(
        store: Arc<LockStore>,
        catalog: Arc<dyn CatalogRepository>,
        notifier: Arc<ChangeNotifier>,
        rules: HoldRules,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            rules,
        }
    }

    pub fn rules(&self) -> &HoldRules {
        &self.rules
    }

    /// Atomically lock a seat batch for a holder. A holder re-locking its
    /// own unexpired seats gets a refreshed hold rather than a
    /// self-conflict.
    pub async fn lock_seats(
        &self,
        showtime_id: Uuid,
        seat_ids: Vec<String>,
        holder_id: &str,
    ) -> Result<HoldGrant, LockError> {
        let seat_ids = normalize_seat_ids(seat_ids)?;
        let showtime = self.resolve_showtime(showtime_id).await?;

        let unknown = showtime.room.unknown_seats(&seat_ids);
        if !unknown.is_empty() {
            return Err(LockError::SeatNotInRoom(unknown));
        }

        let ledger = self.store.ledger(showtime_id);
        let mut guard = ledger.lock().await;
        let now = Utc::now();

        match guard.try_acquire(&seat_ids, holder_id, self.rules.ttl(), now) {
            Ok(grant) => {
                self.notifier.publish(SeatMapEvent::SeatsLocked {
                    showtime_id,
                    seat_ids: grant.seat_ids.clone(),
                    expires_at: grant.expires_at.timestamp(),
                });
                info!(
                    %showtime_id,
                    holder = %Masked(holder_id),
                    seats = ?grant.seat_ids,
                    "seats locked"
                );
                Ok(HoldGrant {
                    seat_ids: grant.seat_ids,
                    expires_at: grant.expires_at,
                })
            }
            Err(conflict) => {
                debug!(
                    %showtime_id,
                    locked = ?conflict.locked,
                    booked = ?conflict.booked,
                    "lock batch rejected"
                );
                Err(conflict_to_error(conflict))
            }
        }
    }

    /// Push the hold window forward for a batch the caller already holds.
    /// An expired hold cannot be extended; the caller must re-lock, which
    /// may now fail if another holder got there first.
    pub async fn extend_hold(
        &self,
        showtime_id: Uuid,
        seat_ids: Vec<String>,
        holder_id: &str,
    ) -> Result<HoldGrant, LockError> {
        let seat_ids = normalize_seat_ids(seat_ids)?;
        let showtime = self.resolve_showtime(showtime_id).await?;

        let unknown = showtime.room.unknown_seats(&seat_ids);
        if !unknown.is_empty() {
            return Err(LockError::SeatNotInRoom(unknown));
        }

        let ledger = self.store.ledger(showtime_id);
        let mut guard = ledger.lock().await;
        let now = Utc::now();

        match guard.extend(
            &seat_ids,
            holder_id,
            self.rules.ttl(),
            self.rules.max_extensions,
            now,
        ) {
            Ok(expires_at) => {
                // Re-announce with the refreshed expiry; redelivery of a
                // SeatsLocked for an already-locked seat is within the
                // at-least-once contract.
                self.notifier.publish(SeatMapEvent::SeatsLocked {
                    showtime_id,
                    seat_ids: seat_ids.clone(),
                    expires_at: expires_at.timestamp(),
                });
                debug!(%showtime_id, holder = %Masked(holder_id), "hold extended");
                Ok(HoldGrant {
                    seat_ids,
                    expires_at,
                })
            }
            Err(ExtendError::Expired(ids)) => Err(LockError::HoldExpired(ids)),
            Err(ExtendError::NotHeld(ids)) => Err(LockError::NotHolder(ids)),
            Err(ExtendError::LimitReached) => Err(LockError::ExtensionLimitReached),
        }
    }

    /// Release the caller's holds. Seats the caller does not hold are
    /// skipped and reported as partial failure; expiry remains the safety
    /// net, so an explicit release is an optimization, not a requirement.
    pub async fn unlock_seats(
        &self,
        showtime_id: Uuid,
        seat_ids: Vec<String>,
        holder_id: &str,
    ) -> Result<ReleaseOutcome, LockError> {
        let seat_ids = normalize_seat_ids(seat_ids)?;
        self.resolve_showtime(showtime_id).await?;

        let Some(ledger) = self.store.existing(showtime_id) else {
            // Nothing ever locked for this showtime
            return Ok(ReleaseOutcome {
                released: Vec::new(),
                skipped: seat_ids,
            });
        };

        let mut guard = ledger.lock().await;
        let outcome = guard.release(&seat_ids, holder_id);

        if !outcome.released.is_empty() {
            self.notifier.publish(SeatMapEvent::SeatsReleased {
                showtime_id,
                seat_ids: outcome.released.clone(),
            });
            info!(
                %showtime_id,
                holder = %Masked(holder_id),
                seats = ?outcome.released,
                "seats released"
            );
        }
        if outcome.is_partial() {
            debug!(%showtime_id, skipped = ?outcome.skipped, "release skipped seats not held by caller");
        }

        Ok(outcome)
    }

    /// Convert the caller's held batch to booked. Invoked by the checkout
    /// flow after payment authorization; the batch must still be fully
    /// held, which also makes a duplicate commit fail.
    pub async fn finalize_booking(
        &self,
        showtime_id: Uuid,
        seat_ids: Vec<String>,
        holder_id: &str,
    ) -> Result<Vec<String>, LockError> {
        let seat_ids = normalize_seat_ids(seat_ids)?;
        let showtime = self.resolve_showtime(showtime_id).await?;

        let unknown = showtime.room.unknown_seats(&seat_ids);
        if !unknown.is_empty() {
            return Err(LockError::SeatNotInRoom(unknown));
        }

        let Some(ledger) = self.store.existing(showtime_id) else {
            return Err(LockError::NotHolder(seat_ids));
        };

        let mut guard = ledger.lock().await;
        let now = Utc::now();

        match guard.finalize(&seat_ids, holder_id, now) {
            Ok(()) => {
                self.notifier.publish(SeatMapEvent::SeatsBooked {
                    showtime_id,
                    seat_ids: seat_ids.clone(),
                });
                info!(
                    %showtime_id,
                    holder = %Masked(holder_id),
                    seats = ?seat_ids,
                    "booking finalized"
                );
                Ok(seat_ids)
            }
            Err(FinalizeError::Expired(ids)) => Err(LockError::HoldExpired(ids)),
            Err(FinalizeError::NotHeld(ids)) => Err(LockError::NotHolder(ids)),
        }
    }

    /// Full projection for initial page load and reconciliation. Takes the
    /// ledger mutex only long enough to copy the non-available entries.
    pub async fn seat_map(&self, showtime_id: Uuid) -> Result<SeatMapSnapshot, LockError> {
        let showtime = self.resolve_showtime(showtime_id).await?;
        let now = Utc::now();

        let (overlay, locked_seat_ids, booked_seat_ids) = match self.store.existing(showtime_id) {
            Some(ledger) => {
                let guard = ledger.lock().await;
                (
                    guard.snapshot(now),
                    guard.locked_seat_ids(now),
                    guard.booked_seat_ids(),
                )
            }
            None => (HashMap::new(), Vec::new(), Vec::new()),
        };

        let seats = showtime
            .room
            .seat_ids()
            .into_iter()
            .map(|seat_id| {
                let state = overlay
                    .get(&seat_id)
                    .cloned()
                    .unwrap_or(SeatState::Available);
                (seat_id, state)
            })
            .collect();

        Ok(SeatMapSnapshot {
            showtime_id,
            seats,
            locked_seat_ids,
            booked_seat_ids,
        })
    }

    /// Join a showtime's event group, seeded with a snapshot. The receiver
    /// is created while the ledger mutex is held, so everything published
    /// after the snapshot reaches it.
    pub async fn subscribe(&self, showtime_id: Uuid) -> Result<Subscription, LockError> {
        self.resolve_showtime(showtime_id).await?;

        let ledger = self.store.ledger(showtime_id);
        let guard = ledger.lock().await;
        let now = Utc::now();

        let receiver = self.notifier.subscribe(showtime_id);
        let snapshot = SeatMapEvent::Snapshot {
            showtime_id,
            locked_seat_ids: guard.locked_seat_ids(now),
            booked_seat_ids: guard.booked_seat_ids(),
        };
        drop(guard);

        Ok(Subscription { snapshot, receiver })
    }

    /// Catalog lookup with the transient-retry policy: an availability
    /// failure is retried once before surfacing.
    async fn resolve_showtime(&self, showtime_id: Uuid) -> Result<Showtime, LockError> {
        match self.catalog.showtime(showtime_id).await {
            Ok(Some(showtime)) => Ok(showtime),
            Ok(None) | Err(CatalogError::NotFound(_)) => {
                Err(LockError::ShowtimeNotFound(showtime_id))
            }
            Err(CatalogError::Unavailable(reason)) => {
                warn!(%showtime_id, %reason, "catalog unavailable, retrying once");
                match self.catalog.showtime(showtime_id).await {
                    Ok(Some(showtime)) => Ok(showtime),
                    Ok(None) | Err(CatalogError::NotFound(_)) => {
                        Err(LockError::ShowtimeNotFound(showtime_id))
                    }
                    Err(CatalogError::Unavailable(reason)) => Err(LockError::Transient(reason)),
                }
            }
        }
    }
}

fn conflict_to_error(conflict: AcquireConflict) -> LockError {
    if conflict.booked.is_empty() {
        LockError::SeatAlreadyLocked(conflict.locked)
    } else {
        LockError::SeatAlreadyBooked {
            booked: conflict.booked,
            locked: conflict.locked,
        }
    }
}

/// Reject empty batches and blank ids, drop duplicates preserving order.
fn normalize_seat_ids(seat_ids: Vec<String>) -> Result<Vec<String>, LockError> {
    if seat_ids.is_empty() {
        return Err(LockError::Validation(
            "seat_ids must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(seat_ids.len());
    for seat_id in seat_ids {
        let seat_id = seat_id.trim().to_string();
        if seat_id.is_empty() {
            return Err(LockError::Validation(
                "seat ids must not be blank".to_string(),
            ));
        }
        if seen.insert(seat_id.clone()) {
            normalized.push(seat_id);
        }
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use marquee_catalog::{InMemoryCatalog, Room, Seat, SeatKind, Showtime};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rules() -> HoldRules {
        HoldRules {
            hold_ttl_seconds: 300,
            sweep_interval_seconds: 5,
            max_extensions: 5,
        }
    }

    fn showtime_with_row(seat_count: u32) -> Showtime {
        let seats = (1..=seat_count)
            .map(|n| Seat {
                id: format!("A{}", n),
                kind: SeatKind::Standard,
            })
            .collect();

        Showtime {
            id: Uuid::new_v4(),
            movie_title: "Night Train".to_string(),
            starts_at: Utc::now(),
            room: Room {
                id: Uuid::new_v4(),
                name: "Screen 1".to_string(),
                seats,
            },
        }
    }

    fn coordinator_with(showtime: &Showtime) -> Arc<LockCoordinator> {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.upsert(showtime.clone());

        Arc::new(LockCoordinator::new(
            Arc::new(LockStore::new()),
            catalog,
            Arc::new(ChangeNotifier::new(64)),
            rules(),
        ))
    }

    fn seats(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_lock_conflict_reports_contested_seats_only() {
        let showtime = showtime_with_row(10);
        let coordinator = coordinator_with(&showtime);

        let grant = coordinator
            .lock_seats(showtime.id, seats(&["A5", "A6"]), "h1")
            .await
            .unwrap();
        assert_eq!(grant.seat_ids, seats(&["A5", "A6"]));

        // H2's batch fails as a whole; only A6 is contested, A7 stays free
        let err = coordinator
            .lock_seats(showtime.id, seats(&["A6", "A7"]), "h2")
            .await
            .unwrap_err();
        assert_eq!(err.conflicting_seat_ids(), Some(seats(&["A6"])));

        let snapshot = coordinator.seat_map(showtime.id).await.unwrap();
        assert_eq!(snapshot.seats["A7"], SeatState::Available);

        // H1 finalizes, then H2 succeeds with the free seat
        coordinator
            .finalize_booking(showtime.id, seats(&["A5", "A6"]), "h1")
            .await
            .unwrap();
        coordinator
            .lock_seats(showtime.id, seats(&["A7"]), "h2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_double_lock_under_concurrency() {
        let showtime = showtime_with_row(6);
        let coordinator = coordinator_with(&showtime);

        // Every holder races for an overlapping pair around the row
        let mut handles = Vec::new();
        for n in 0..16u32 {
            let coordinator = coordinator.clone();
            let showtime_id = showtime.id;
            let batch = vec![format!("A{}", (n % 5) + 1), format!("A{}", (n % 5) + 2)];
            let holder = format!("holder-{}", n);
            handles.push(tokio::spawn(async move {
                coordinator.lock_seats(showtime_id, batch, &holder).await
            }));
        }

        let mut winners: HashMap<String, u32> = HashMap::new();
        for handle in handles {
            if let Ok(grant) = handle.await.unwrap() {
                for seat_id in grant.seat_ids {
                    *winners.entry(seat_id).or_default() += 1;
                }
            }
        }

        // At most one active holder per contested seat
        let snapshot = coordinator.seat_map(showtime.id).await.unwrap();
        for (seat_id, count) in &winners {
            assert_eq!(*count, 1, "seat {} won twice", seat_id);
            assert!(!snapshot.seats[seat_id].is_available());
        }
        assert!(!winners.is_empty());
    }

    #[tokio::test]
    async fn test_relock_by_same_holder_refreshes() {
        let showtime = showtime_with_row(4);
        let coordinator = coordinator_with(&showtime);

        let first = coordinator
            .lock_seats(showtime.id, seats(&["A1", "A2"]), "h1")
            .await
            .unwrap();

        let second = coordinator
            .lock_seats(showtime.id, seats(&["A1", "A2"]), "h1")
            .await
            .unwrap();
        assert!(second.expires_at >= first.expires_at);
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let showtime = showtime_with_row(4);
        let coordinator = coordinator_with(&showtime);

        let err = coordinator
            .lock_seats(showtime.id, seats(&["A1", "Z9"]), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::SeatNotInRoom(ids) if ids == seats(&["Z9"])));

        let err = coordinator
            .lock_seats(Uuid::new_v4(), seats(&["A1"]), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::ShowtimeNotFound(_)));

        let err = coordinator
            .lock_seats(showtime.id, Vec::new(), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Validation(_)));
    }

    #[tokio::test]
    async fn test_extend_requires_original_holder() {
        let showtime = showtime_with_row(4);
        let coordinator = coordinator_with(&showtime);

        coordinator
            .lock_seats(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap();

        let err = coordinator
            .extend_hold(showtime.id, seats(&["A1"]), "h2")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHolder(ids) if ids == seats(&["A1"])));

        let grant = coordinator
            .extend_hold(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap();
        assert_eq!(grant.seat_ids, seats(&["A1"]));
    }

    #[tokio::test]
    async fn test_release_partial_failure() {
        let showtime = showtime_with_row(4);
        let coordinator = coordinator_with(&showtime);

        coordinator
            .lock_seats(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap();
        coordinator
            .lock_seats(showtime.id, seats(&["A2"]), "h2")
            .await
            .unwrap();

        let outcome = coordinator
            .unlock_seats(showtime.id, seats(&["A1", "A2"]), "h1")
            .await
            .unwrap();
        assert_eq!(outcome.released, seats(&["A1"]));
        assert_eq!(outcome.skipped, seats(&["A2"]));
        assert!(outcome.is_partial());
    }

    #[tokio::test]
    async fn test_finalize_then_everything_is_terminal() {
        let showtime = showtime_with_row(4);
        let coordinator = coordinator_with(&showtime);

        coordinator
            .lock_seats(showtime.id, seats(&["A1", "A2"]), "h1")
            .await
            .unwrap();
        coordinator
            .finalize_booking(showtime.id, seats(&["A1", "A2"]), "h1")
            .await
            .unwrap();

        // Locks conflict as booked, for any holder including the original
        let err = coordinator
            .lock_seats(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::SeatAlreadyBooked { .. }));

        // Extend and duplicate commit both report NotHolder
        let err = coordinator
            .extend_hold(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHolder(_)));

        let err = coordinator
            .finalize_booking(showtime.id, seats(&["A1", "A2"]), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NotHolder(_)));

        let snapshot = coordinator.seat_map(showtime.id).await.unwrap();
        assert_eq!(snapshot.booked_seat_ids, seats(&["A1", "A2"]));
    }

    #[tokio::test]
    async fn test_subscribe_seeds_snapshot_then_streams() {
        let showtime = showtime_with_row(4);
        let coordinator = coordinator_with(&showtime);

        coordinator
            .lock_seats(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap();

        let mut subscription = coordinator.subscribe(showtime.id).await.unwrap();
        match &subscription.snapshot {
            SeatMapEvent::Snapshot {
                locked_seat_ids, ..
            } => assert_eq!(locked_seat_ids, &seats(&["A1"])),
            other => panic!("expected snapshot, got {:?}", other),
        }

        coordinator
            .lock_seats(showtime.id, seats(&["A2"]), "h2")
            .await
            .unwrap();
        coordinator
            .unlock_seats(showtime.id, seats(&["A2"]), "h2")
            .await
            .unwrap();

        // Lock before release for the same seat, as published
        assert_eq!(subscription.receiver.recv().await.unwrap().kind(), "seats_locked");
        assert_eq!(
            subscription.receiver.recv().await.unwrap().kind(),
            "seats_released"
        );
    }

    /// Catalog that fails with `Unavailable` a set number of times before
    /// delegating, to exercise the retry-once policy.
    struct FlakyCatalog {
        inner: InMemoryCatalog,
        failures: AtomicU32,
    }

    #[async_trait]
    impl CatalogRepository for FlakyCatalog {
        async fn showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(CatalogError::Unavailable("catalog timeout".to_string()));
            }
            self.inner.showtime(id).await
        }
    }

    #[tokio::test]
    async fn test_transient_catalog_failure_is_retried_once() {
        let showtime = showtime_with_row(2);

        let inner = InMemoryCatalog::new();
        inner.upsert(showtime.clone());
        let catalog = Arc::new(FlakyCatalog {
            inner,
            failures: AtomicU32::new(1),
        });

        let coordinator = LockCoordinator::new(
            Arc::new(LockStore::new()),
            catalog,
            Arc::new(ChangeNotifier::new(16)),
            rules(),
        );

        // One failure is absorbed by the retry
        coordinator
            .lock_seats(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_persistent_catalog_failure_surfaces_as_transient() {
        let showtime = showtime_with_row(2);

        let inner = InMemoryCatalog::new();
        inner.upsert(showtime.clone());
        let catalog = Arc::new(FlakyCatalog {
            inner,
            failures: AtomicU32::new(2),
        });

        let coordinator = LockCoordinator::new(
            Arc::new(LockStore::new()),
            catalog,
            Arc::new(ChangeNotifier::new(16)),
            rules(),
        );

        let err = coordinator
            .lock_seats(showtime.id, seats(&["A1"]), "h1")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Transient(_)));
    }
}
