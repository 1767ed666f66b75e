pub mod coordinator;
pub mod notifier;
pub mod sweeper;

pub use coordinator::{HoldGrant, LockCoordinator, LockError, SeatMapSnapshot, Subscription};
pub use notifier::ChangeNotifier;
pub use sweeper::ExpirySweeper;
