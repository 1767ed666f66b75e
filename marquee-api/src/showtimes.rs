use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::{future, Stream, StreamExt};
use marquee_shared::{SeatMapEvent, SeatState};
use serde::Serialize;
use std::collections::HashMap;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct SeatMapResponse {
    showtime_id: Uuid,
    locked_seat_ids: Vec<String>,
    booked_seat_ids: Vec<String>,
    seats: HashMap<String, SeatState>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/showtimes/{id}/seats", get(seat_map))
        .route("/v1/showtimes/{id}/stream", get(stream))
}

/// Snapshot for initial page load and for clients resyncing after a
/// NOT_HOLDER response or a dropped stream.
async fn seat_map(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Json<SeatMapResponse>, ApiError> {
    let snapshot = state.coordinator.seat_map(showtime_id).await?;

    Ok(Json(SeatMapResponse {
        showtime_id: snapshot.showtime_id,
        locked_seat_ids: snapshot.locked_seat_ids,
        booked_seat_ids: snapshot.booked_seat_ids,
        seats: snapshot.seats,
    }))
}

/// Live seat-map stream for one showtime group. The first event is always
/// a snapshot; incremental events are meaningless without it. A receiver
/// that lags the buffer has its stream ended so the client reconnects and
/// is re-seeded.
async fn stream(
    State(state): State<AppState>,
    Path(showtime_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let subscription = state.coordinator.subscribe(showtime_id).await?;

    let snapshot = subscription.snapshot;
    let seed = futures_util::stream::once(async move { to_sse_event(&snapshot) });

    let live = BroadcastStream::new(subscription.receiver)
        .take_while(|result| future::ready(result.is_ok()))
        .filter_map(|result| async move { result.ok().map(|event| to_sse_event(&event)) });

    Ok(Sse::new(seed.chain(live)).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &SeatMapEvent) -> Result<Event, axum::Error> {
    let data = serde_json::to_string(event).map_err(axum::Error::new)?;
    Ok(Event::default().event(event.kind()).data(data))
}
