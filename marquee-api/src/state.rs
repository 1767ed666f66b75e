use crate::metrics::Metrics;
use marquee_catalog::InMemoryCatalog;
use marquee_lock::LockCoordinator;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<LockCoordinator>,
    pub catalog: Arc<InMemoryCatalog>,
    pub metrics: Arc<Metrics>,
}
