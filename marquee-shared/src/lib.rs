pub mod models;
pub mod pii;

pub use models::events::SeatMapEvent;
pub use models::seat::SeatState;
pub use pii::Masked;
