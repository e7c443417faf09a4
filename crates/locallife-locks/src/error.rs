//! Error types for distributed locking.

use thiserror::Error;

/// Errors that can occur while acquiring or releasing a distributed lock.
///
/// Contention is not an error: an unavailable lock is reported as `None`
/// by [`DistributedLock::try_acquire`](crate::DistributedLock::try_acquire).
#[derive(Debug, Error)]
pub enum LockError {
	/// The shared store could not be reached or rejected the command.
	#[error("lock store error: {0}")]
	Store(String),
}
