use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Seat categories in the auditorium
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatKind {
    Standard,
    Couple,
    Accessible,
}

impl Default for SeatKind {
    fn default() -> Self {
        SeatKind::Standard
    }
}

/// One physical seat in a room. Seat ids are the row/number labels the
/// storefront renders ("A5", "F12").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: String,
    #[serde(default)]
    pub kind: SeatKind,
}

/// Auditorium layout a showtime plays in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub seats: Vec<Seat>,
}

impl Room {
    pub fn seat_ids(&self) -> Vec<String> {
        self.seats.iter().map(|s| s.id.clone()).collect()
    }

    /// Which of the requested seats do not exist in this room
    pub fn unknown_seats(&self, seat_ids: &[String]) -> Vec<String> {
        let known: HashSet<&str> = self.seats.iter().map(|s| s.id.as_str()).collect();
        seat_ids
            .iter()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

/// One showing of a movie in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_title: String,
    pub starts_at: chrono::DateTime<chrono::Utc>,
    pub room: Room,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room {
            id: Uuid::new_v4(),
            name: "Screen 1".to_string(),
            seats: vec![
                Seat {
                    id: "A1".to_string(),
                    kind: SeatKind::Standard,
                },
                Seat {
                    id: "A2".to_string(),
                    kind: SeatKind::Couple,
                },
            ],
        }
    }

    #[test]
    fn test_unknown_seats() {
        let room = room();

        let unknown = room.unknown_seats(&["A1".to_string(), "Z9".to_string()]);
        assert_eq!(unknown, vec!["Z9".to_string()]);

        assert!(room.unknown_seats(&["A1".to_string(), "A2".to_string()]).is_empty());
        assert_eq!(room.seat_ids(), vec!["A1".to_string(), "A2".to_string()]);
    }
}
