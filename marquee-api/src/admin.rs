use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use marquee_catalog::{Room, Seat, SeatKind, Showtime};
use marquee_lock::LockError;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpsertShowtimeRequest {
    pub showtime_id: Option<Uuid>,
    pub movie_title: String,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub room_name: String,
    pub seats: Vec<SeatSpec>,
}

#[derive(Debug, Deserialize)]
pub struct SeatSpec {
    pub id: String,
    #[serde(default)]
    pub kind: SeatKind,
}

#[derive(Debug, Serialize)]
pub struct ShowtimeResponse {
    pub showtime_id: Uuid,
    pub movie_title: String,
    pub room_name: String,
    pub seat_count: usize,
}

// ============================================================================
// Showtime Seeding Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/showtimes", post(upsert_showtime))
        .route("/v1/admin/showtimes/{id}", get(get_showtime))
}

/// Register or replace a showtime and its room layout. In production the
/// catalog service owns this data; the seeding route keeps the lock
/// manager operable standalone.
async fn upsert_showtime(
    State(state): State<AppState>,
    Json(req): Json<UpsertShowtimeRequest>,
) -> Result<Json<ShowtimeResponse>, ApiError> {
    if req.seats.is_empty() {
        return Err(LockError::Validation("room must have at least one seat".to_string()).into());
    }

    let showtime = Showtime {
        id: req.showtime_id.unwrap_or_else(Uuid::new_v4),
        movie_title: req.movie_title,
        starts_at: req.starts_at.unwrap_or_else(Utc::now),
        room: Room {
            id: Uuid::new_v4(),
            name: req.room_name,
            seats: req
                .seats
                .into_iter()
                .map(|s| Seat {
                    id: s.id,
                    kind: s.kind,
                })
                .collect(),
        },
    };

    let response = ShowtimeResponse {
        showtime_id: showtime.id,
        movie_title: showtime.movie_title.clone(),
        room_name: showtime.room.name.clone(),
        seat_count: showtime.room.seats.len(),
    };

    state.catalog.upsert(showtime);
    info!(
        "Showtime {} registered with {} seats",
        response.showtime_id, response.seat_count
    );

    Ok(Json(response))
}

async fn get_showtime(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<Showtime>, ApiError> {
    let showtime = state
        .catalog
        .get(showtime_id)
        .ok_or(LockError::ShowtimeNotFound(showtime_id))?;

    Ok(Json(showtime))
}
