pub mod repository;
pub mod showtime;

pub use repository::{CatalogError, CatalogRepository, InMemoryCatalog};
pub use showtime::{Room, Seat, SeatKind, Showtime};
