use marquee_shared::SeatMapEvent;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Per-showtime fan-out of seat-map change events.
///
/// Every client viewing the same showtime's seat map subscribes to that
/// showtime's channel and converges without polling. Delivery is
/// at-least-once: a receiver that falls behind the buffer observes a lag
/// and must resync from a fresh snapshot. Per-seat ordering holds because
/// publishers emit while still inside the showtime's critical section.
pub struct ChangeNotifier {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<SeatMapEvent>>>,
    capacity: usize,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Join a showtime's event group. The channel is created lazily on the
    /// first subscriber or publisher.
    pub fn subscribe(&self, showtime_id: Uuid) -> broadcast::Receiver<SeatMapEvent> {
        self.sender(showtime_id).subscribe()
    }

    /// Fan an event out to the subscribers of its showtime. Returns how
    /// many receivers it reached; zero subscribers is not an error.
    pub fn publish(&self, event: SeatMapEvent) -> usize {
        let maybe_sender = {
            let channels = self.channels.read().expect("notifier lock poisoned");
            channels.get(&event.showtime_id()).cloned()
        };

        match maybe_sender {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscriber_count(&self, showtime_id: Uuid) -> usize {
        self.channels
            .read()
            .expect("notifier lock poisoned")
            .get(&showtime_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    fn sender(&self, showtime_id: Uuid) -> broadcast::Sender<SeatMapEvent> {
        if let Some(sender) = self
            .channels
            .read()
            .expect("notifier lock poisoned")
            .get(&showtime_id)
        {
            return sender.clone();
        }

        let mut channels = self.channels.write().expect("notifier lock poisoned");
        channels
            .entry(showtime_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_groups_are_isolated_per_showtime() {
        let notifier = ChangeNotifier::new(16);
        let st1 = Uuid::new_v4();
        let st2 = Uuid::new_v4();

        let mut rx1 = notifier.subscribe(st1);
        let mut rx2 = notifier.subscribe(st2);

        let delivered = notifier.publish(SeatMapEvent::SeatsReleased {
            showtime_id: st1,
            seat_ids: vec!["A1".to_string()],
        });
        assert_eq!(delivered, 1);

        let event = rx1.recv().await.unwrap();
        assert_eq!(event.showtime_id(), st1);

        // The other group saw nothing
        assert!(matches!(
            rx2.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let notifier = ChangeNotifier::new(16);
        let delivered = notifier.publish(SeatMapEvent::SeatsBooked {
            showtime_id: Uuid::new_v4(),
            seat_ids: vec!["A1".to_string()],
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let notifier = ChangeNotifier::new(16);
        let st = Uuid::new_v4();
        let mut rx = notifier.subscribe(st);

        notifier.publish(SeatMapEvent::SeatsLocked {
            showtime_id: st,
            seat_ids: vec!["A1".to_string()],
            expires_at: 100,
        });
        notifier.publish(SeatMapEvent::SeatsReleased {
            showtime_id: st,
            seat_ids: vec!["A1".to_string()],
        });

        assert_eq!(rx.recv().await.unwrap().kind(), "seats_locked");
        assert_eq!(rx.recv().await.unwrap().kind(), "seats_released");
    }
}
