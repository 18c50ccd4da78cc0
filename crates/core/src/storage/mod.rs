//! Storage contracts, the in-memory store and per-holding write locks.

mod holding_locks;
mod memory_store;
mod storage_traits;

pub use holding_locks::{HoldingLockGuard, HoldingLocks};
pub use memory_store::InMemoryLedgerStore;
pub use storage_traits::{LedgerStoreTrait, LedgerWriteBatch};
