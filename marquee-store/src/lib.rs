pub mod app_config;
pub mod ledger;
pub mod store;

pub use ledger::{
    AcquireConflict, AcquireGrant, ExtendError, FinalizeError, ReleaseOutcome, SeatEntry,
    SeatLedger, SeatLock,
};
pub use store::LockStore;
