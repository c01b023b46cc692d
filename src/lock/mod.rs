//! File Lock Manager (§4.B).

mod manager;
mod types;

pub use manager::FileLockManager;
pub use types::{AcquireStart, FileLock, LockResult, LockStats, OldestLock};
