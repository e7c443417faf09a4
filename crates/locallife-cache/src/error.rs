//! Error types for the cache layer.

use locallife_locks::LockError;
use thiserror::Error;

/// Errors that can occur in the cache resilience layer.
///
/// An unavailable rebuild lock is not represented here: the strategies
/// degrade to "serve absent" instead of propagating it.
#[derive(Debug, Error)]
pub enum CacheError {
	/// The cache store could not be reached or rejected the command.
	#[error("cache store error: {0}")]
	Store(String),

	/// A cached payload could not be encoded or decoded.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The distributed lock backing a rebuild failed at the store level.
	#[error("lock error: {0}")]
	Lock(#[from] LockError),

	/// The backing-store fallback failed while rebuilding an entry.
	#[error("fallback error: {0}")]
	Fallback(String),
}
