use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<String>,
    pub holder_id: String,
}

#[derive(Debug, Serialize)]
struct LockResponse {
    success: bool,
    locked_seat_ids: Vec<String>,
    expires_at: i64,
}

#[derive(Debug, Serialize)]
struct ExtendResponse {
    success: bool,
    expires_at: i64,
}

#[derive(Debug, Serialize)]
struct ReleaseResponse {
    success: bool,
    released_seat_ids: Vec<String>,
    skipped_seat_ids: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/holds", post(lock_seats))
        .route("/v1/holds/extend", post(extend_hold))
        .route("/v1/holds/release", post(unlock_seats))
}

async fn lock_seats(
    State(state): State<AppState>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<LockResponse>, ApiError> {
    let grant = state
        .coordinator
        .lock_seats(req.showtime_id, req.seat_ids, &req.holder_id)
        .await
        .map_err(|err| {
            state.metrics.observe_lock_error(&err);
            err
        })?;

    state.metrics.seats_locked.inc_by(grant.seat_ids.len() as u64);

    Ok(Json(LockResponse {
        success: true,
        locked_seat_ids: grant.seat_ids,
        expires_at: grant.expires_at.timestamp(),
    }))
}

async fn extend_hold(
    State(state): State<AppState>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<ExtendResponse>, ApiError> {
    let grant = state
        .coordinator
        .extend_hold(req.showtime_id, req.seat_ids, &req.holder_id)
        .await?;

    Ok(Json(ExtendResponse {
        success: true,
        expires_at: grant.expires_at.timestamp(),
    }))
}

async fn unlock_seats(
    State(state): State<AppState>,
    Json(req): Json<HoldRequest>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let outcome = state
        .coordinator
        .unlock_seats(req.showtime_id, req.seat_ids, &req.holder_id)
        .await?;

    state
        .metrics
        .seats_released
        .inc_by(outcome.released.len() as u64);

    // Partial release is not an error, but the caller must know its view
    // is stale for the skipped seats.
    Ok(Json(ReleaseResponse {
        success: !outcome.is_partial(),
        released_seat_ids: outcome.released,
        skipped_seat_ids: outcome.skipped,
    }))
}
