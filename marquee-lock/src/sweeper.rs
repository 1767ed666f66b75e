use crate::notifier::ChangeNotifier;
use chrono::Utc;
use marquee_shared::SeatMapEvent;
use marquee_store::LockStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Background reclamation of lapsed holds.
///
/// Periodic-scan model: no per-lock timer state exists, so a restart
/// simply means the next scan catches up. Read paths already treat a
/// lapsed lock as absent; the scan interval only bounds how stale the
/// pushed seat map can be after an expiry.
pub struct ExpirySweeper {
    store: Arc<LockStore>,
    notifier: Arc<ChangeNotifier>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<LockStore>, notifier: Arc<ChangeNotifier>, interval: Duration) -> Self {
        Self {
            store,
            notifier,
            interval,
        }
    }

    /// One scan over every showtime shard. Returns the number of seats
    /// reclaimed.
    pub async fn sweep_once(&self) -> usize {
        let mut reclaimed = 0;

        for showtime_id in self.store.showtime_ids() {
            let Some(ledger) = self.store.existing(showtime_id) else {
                continue;
            };

            let mut guard = ledger.lock().await;
            let swept = guard.sweep_expired(Utc::now());
            if swept.is_empty() {
                continue;
            }

            reclaimed += swept.len();
            debug!(%showtime_id, seats = ?swept, "expired holds reclaimed");
            // Published under the guard: the release for a seat is never
            // seen before the lock it is releasing.
            self.notifier.publish(SeatMapEvent::SeatsReleased {
                showtime_id,
                seat_ids: swept,
            });
        }

        reclaimed
    }

    pub async fn run(self) {
        info!("Expiry sweeper started, scanning every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            ticker.tick().await;
            let reclaimed = self.sweep_once().await;
            if reclaimed > 0 {
                info!("Sweep reclaimed {} expired seat holds", reclaimed);
            }
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
