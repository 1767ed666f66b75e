use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use marquee_api::{app, metrics::Metrics, AppState};
use marquee_catalog::InMemoryCatalog;
use marquee_lock::{ChangeNotifier, ExpirySweeper, LockCoordinator};
use marquee_store::LockStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_api=debug,marquee_lock=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marquee_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let store = Arc::new(LockStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let notifier = Arc::new(ChangeNotifier::new(config.notifier.event_buffer));

    let coordinator = Arc::new(LockCoordinator::new(
        store.clone(),
        catalog.clone(),
        notifier.clone(),
        config.hold_rules.clone(),
    ));

    // Expiry safety net: clients that vanish never pin a seat past TTL
    let sweeper = ExpirySweeper::new(
        store,
        notifier,
        Duration::from_secs(config.hold_rules.sweep_interval_seconds),
    );
    sweeper.spawn();

    let app_state = AppState {
        coordinator,
        catalog,
        metrics: Arc::new(Metrics::new()),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
