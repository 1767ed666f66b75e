use axum::{extract::State, routing::get, Router};
use marquee_lock::LockError;
use prometheus::{Encoder, IntCounter, Opts, Registry, TextEncoder};

use crate::error::ApiError;
use crate::state::AppState;

pub struct Metrics {
    pub registry: Registry,
    pub seats_locked: IntCounter,
    pub lock_conflicts: IntCounter,
    pub seats_released: IntCounter,
    pub bookings_finalized: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let seats_locked = IntCounter::with_opts(Opts::new(
            "marquee_seats_locked_total",
            "Seats successfully locked",
        ))
        .expect("metrics opts");
        let lock_conflicts = IntCounter::with_opts(Opts::new(
            "marquee_lock_conflicts_total",
            "Lock batches rejected because seats were contested",
        ))
        .expect("metrics opts");
        let seats_released = IntCounter::with_opts(Opts::new(
            "marquee_seats_released_total",
            "Seats explicitly released by their holder",
        ))
        .expect("metrics opts");
        let bookings_finalized = IntCounter::with_opts(Opts::new(
            "marquee_bookings_finalized_total",
            "Hold batches converted to bookings",
        ))
        .expect("metrics opts");

        registry
            .register(Box::new(seats_locked.clone()))
            .expect("metrics registration");
        registry
            .register(Box::new(lock_conflicts.clone()))
            .expect("metrics registration");
        registry
            .register(Box::new(seats_released.clone()))
            .expect("metrics registration");
        registry
            .register(Box::new(bookings_finalized.clone()))
            .expect("metrics registration");

        Self {
            registry,
            seats_locked,
            lock_conflicts,
            seats_released,
            bookings_finalized,
        }
    }

    pub fn observe_lock_error(&self, err: &LockError) {
        if matches!(
            err,
            LockError::SeatAlreadyLocked(_) | LockError::SeatAlreadyBooked { .. }
        ) {
            self.lock_conflicts.inc();
        }
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/metrics", get(serve_metrics))
}

async fn serve_metrics(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.into()))
}
