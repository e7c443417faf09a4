//! Distributed locking for the LocalLife platform
//!
//! Mutual exclusion across processes, backed by the shared Redis store's
//! atomic set-if-absent and an identity-checked compare-and-delete release.
//! Acquisition never blocks; callers that want to wait loop with a bounded
//! [`RetryPolicy`] instead of dead-waiting on a lock they may never get.
//!
//! Every acquisition mints a fresh [`LockToken`]; release deletes the lock
//! key only when the stored token matches the presented one, so a process
//! whose lease expired cannot free a lock that has since been re-acquired
//! by another holder.

mod error;
mod lock;
mod memory;
mod redis_backend;

pub use error::LockError;
pub use lock::{DistributedLock, LockToken, RetryPolicy};
pub use memory::MemoryLock;
pub use redis_backend::RedisLock;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;
