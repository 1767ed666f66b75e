use crate::showtime::Showtime;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Catalog-related errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Showtime not found: {0}")]
    NotFound(Uuid),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read side of the showtime catalog.
///
/// The catalog itself is an external collaborator; the lock manager only
/// needs to resolve a showtime to its room so seat references can be
/// validated. `Unavailable` is the transient kind callers may retry.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError>;
}

/// In-memory catalog backing the service and tests.
pub struct InMemoryCatalog {
    showtimes: RwLock<HashMap<Uuid, Showtime>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            showtimes: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a showtime (admin seeding path)
    pub fn upsert(&self, showtime: Showtime) {
        self.showtimes
            .write()
            .expect("catalog lock poisoned")
            .insert(showtime.id, showtime);
    }

    pub fn get(&self, id: Uuid) -> Option<Showtime> {
        self.showtimes
            .read()
            .expect("catalog lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.showtimes.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn showtime(&self, id: Uuid) -> Result<Option<Showtime>, CatalogError> {
        Ok(self.get(id))
    }
}
