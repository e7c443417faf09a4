//! The distributed lock contract.

use crate::LockResult;
use async_trait::async_trait;
use std::time::Duration;

/// Opaque proof of a single lock acquisition.
///
/// A fresh token is minted for every successful acquisition, so two holders
/// can never collide regardless of the concurrency model (threads, tasks or
/// separate processes). Only the matching token can release the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
	/// Mint a new, unguessable token.
	///
	/// Public so out-of-crate [`DistributedLock`] implementations can mint
	/// holder identities the same way.
	pub fn new() -> Self {
		Self(uuid::Uuid::new_v4().simple().to_string())
	}

	/// The token's wire representation (the value stored under the lock key).
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl Default for LockToken {
	fn default() -> Self {
		Self::new()
	}
}

/// Bounded retry behavior for callers that want to wait for a lock.
///
/// # Examples
///
/// ```rust
/// use locallife_locks::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.interval, Duration::from_millis(50));
/// assert_eq!(policy.attempts, 5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	/// Sleep between attempts.
	pub interval: Duration,
	/// Total attempts before giving up.
	pub attempts: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			interval: Duration::from_millis(50),
			attempts: 5,
		}
	}
}

/// Distributed lock over a shared store.
///
/// `try_acquire` is a single atomic set-if-absent and never blocks; the
/// lease TTL guarantees liveness even if a holder crashes without
/// releasing. `release` is atomic compare-and-delete on the holder token,
/// a no-op when the presented token no longer matches.
///
/// # Examples
///
/// ```no_run
/// use locallife_locks::{DistributedLock, RedisLock};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let lock = RedisLock::new("redis://127.0.0.1/").await?;
///
/// if let Some(token) = lock.try_acquire("order:voucher:7", Duration::from_secs(10)).await? {
///     // critical section
///     lock.release("order:voucher:7", &token).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DistributedLock: Send + Sync {
	/// Attempt to acquire the lock for `resource` with the given lease.
	///
	/// Returns `Some(token)` iff the lock was free. Never blocks.
	async fn try_acquire(&self, resource: &str, lease: Duration) -> LockResult<Option<LockToken>>;

	/// Release the lock iff it is still held under `token`.
	///
	/// Returns `true` when the lock was deleted, `false` when the stored
	/// token did not match (lease expired and another holder took over).
	async fn release(&self, resource: &str, token: &LockToken) -> LockResult<bool>;

	/// Acquire with a bounded retry loop.
	///
	/// Sleeps `policy.interval` between attempts and gives up after
	/// `policy.attempts`, returning `None` rather than waiting forever on a
	/// lock this caller may never get.
	async fn acquire_with_retry(
		&self,
		resource: &str,
		lease: Duration,
		policy: RetryPolicy,
	) -> LockResult<Option<LockToken>> {
		for attempt in 0..policy.attempts {
			if let Some(token) = self.try_acquire(resource, lease).await? {
				return Ok(Some(token));
			}
			if attempt + 1 < policy.attempts {
				tokio::time::sleep(policy.interval).await;
			}
		}
		Ok(None)
	}
}
