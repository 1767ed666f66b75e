use uuid::Uuid;

/// Seat-map change events, fanned out per showtime.
///
/// Timestamps are epoch seconds so every consumer (storefront countdown,
/// cross-service listeners) reads them without timezone handling.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatMapEvent {
    /// Full state, sent once when a subscriber joins a showtime group.
    /// Incremental events are only meaningful after this seed.
    Snapshot {
        showtime_id: Uuid,
        locked_seat_ids: Vec<String>,
        booked_seat_ids: Vec<String>,
    },
    SeatsLocked {
        showtime_id: Uuid,
        seat_ids: Vec<String>,
        expires_at: i64,
    },
    SeatsReleased {
        showtime_id: Uuid,
        seat_ids: Vec<String>,
    },
    SeatsBooked {
        showtime_id: Uuid,
        seat_ids: Vec<String>,
    },
}

impl SeatMapEvent {
    pub fn showtime_id(&self) -> Uuid {
        match self {
            SeatMapEvent::Snapshot { showtime_id, .. }
            | SeatMapEvent::SeatsLocked { showtime_id, .. }
            | SeatMapEvent::SeatsReleased { showtime_id, .. }
            | SeatMapEvent::SeatsBooked { showtime_id, .. } => *showtime_id,
        }
    }

    /// Name used as the SSE event type on the stream endpoint.
    pub fn kind(&self) -> &'static str {
        match self {
            SeatMapEvent::Snapshot { .. } => "snapshot",
            SeatMapEvent::SeatsLocked { .. } => "seats_locked",
            SeatMapEvent::SeatsReleased { .. } => "seats_released",
            SeatMapEvent::SeatsBooked { .. } => "seats_booked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SeatMapEvent::SeatsLocked {
            showtime_id: Uuid::new_v4(),
            seat_ids: vec!["A5".to_string(), "A6".to_string()],
            expires_at: 1_700_000_300,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "seats_locked");
        assert_eq!(json["seat_ids"][0], "A5");
        assert_eq!(json["expires_at"], 1_700_000_300);

        let back: SeatMapEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind(), "seats_locked");
    }
}
