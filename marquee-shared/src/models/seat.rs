/// Externally observable state of one seat for one showtime.
///
/// This is a projection derived from the lock ledger, never stored: exactly
/// one state applies per seat at any instant. The storefront renders it as
/// the gray/yellow/green/red seat map.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Available,
    Locked { holder_id: String, expires_at: i64 },
    Booked,
}

impl SeatState {
    pub fn is_available(&self) -> bool {
        matches!(self, SeatState::Available)
    }

    pub fn is_booked(&self) -> bool {
        matches!(self, SeatState::Booked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_state_serialization() {
        let locked = SeatState::Locked {
            holder_id: "session-1".to_string(),
            expires_at: 1_700_000_300,
        };
        let json = serde_json::to_value(&locked).unwrap();
        assert_eq!(json["state"], "LOCKED");
        assert_eq!(json["holder_id"], "session-1");

        assert!(SeatState::Available.is_available());
        assert!(!locked.is_available());
        assert!(SeatState::Booked.is_booked());
    }
}
