use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommitBookingRequest {
    pub showtime_id: Uuid,
    pub seat_ids: Vec<String>,
    pub holder_id: String,
}

#[derive(Debug, Serialize)]
struct CommitBookingResponse {
    success: bool,
    booked_seat_ids: Vec<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/bookings/commit", post(commit_booking))
}

/// Called by the checkout flow after payment authorization. The batch must
/// still be fully held by the paying holder; a duplicate commit therefore
/// fails with NOT_HOLDER.
async fn commit_booking(
    State(state): State<AppState>,
    Json(req): Json<CommitBookingRequest>,
) -> Result<Json<CommitBookingResponse>, ApiError> {
    let booked = state
        .coordinator
        .finalize_booking(req.showtime_id, req.seat_ids, &req.holder_id)
        .await?;

    state.metrics.bookings_finalized.inc();
    info!("Booking committed for showtime {}", req.showtime_id);

    Ok(Json(CommitBookingResponse {
        success: true,
        booked_seat_ids: booked,
    }))
}
