use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use marquee_lock::LockError;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Lock(LockError),
    Internal(anyhow::Error),
}

impl From<LockError> for ApiError {
    fn from(err: LockError) -> Self {
        Self::Lock(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Lock(err) => {
                let (status, kind) = match &err {
                    LockError::ShowtimeNotFound(_) => (StatusCode::NOT_FOUND, "SHOWTIME_NOT_FOUND"),
                    LockError::SeatNotInRoom(_) => (StatusCode::BAD_REQUEST, "SEAT_NOT_IN_ROOM"),
                    LockError::SeatAlreadyLocked(_) => {
                        (StatusCode::CONFLICT, "SEAT_ALREADY_LOCKED")
                    }
                    LockError::SeatAlreadyBooked { .. } => {
                        (StatusCode::CONFLICT, "SEAT_ALREADY_BOOKED")
                    }
                    LockError::HoldExpired(_) => (StatusCode::GONE, "HOLD_EXPIRED"),
                    LockError::NotHolder(_) => (StatusCode::FORBIDDEN, "NOT_HOLDER"),
                    LockError::ExtensionLimitReached => {
                        (StatusCode::TOO_MANY_REQUESTS, "EXTENSION_LIMIT_REACHED")
                    }
                    LockError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
                    LockError::Transient(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "TRANSIENT_FAILURE")
                    }
                };

                // Seat-level detail so the storefront redraws exactly the
                // contested seats instead of showing a generic error.
                let mut body = json!({
                    "error": kind,
                    "message": err.to_string(),
                });
                if let Some(seat_ids) = err.conflicting_seat_ids() {
                    body["conflicting_seat_ids"] = json!(seat_ids);
                }

                (status, Json(body)).into_response()
            }
            ApiError::Internal(err) => {
                tracing::error!("Internal Server Error: {}", err);
                let body = Json(json!({
                    "error": "INTERNAL_SERVER_ERROR",
                    "message": "Internal Server Error",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
