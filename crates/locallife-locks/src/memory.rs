//! In-memory lock for single-process use and tests.

use crate::LockResult;
use crate::lock::{DistributedLock, LockToken};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

struct Holder {
	token: String,
	/// Expiry timestamp in milliseconds since epoch
	expires_at: i128,
}

/// In-memory implementation of [`DistributedLock`].
///
/// Expired holders are treated as absent, mirroring the store-level TTL of
/// the Redis implementation.
///
/// # Examples
///
/// ```rust
/// use locallife_locks::{DistributedLock, MemoryLock};
/// use std::time::Duration;
///
/// # async fn example() -> locallife_locks::LockResult<()> {
/// let lock = MemoryLock::new();
///
/// let token = lock.try_acquire("shop:1", Duration::from_secs(10)).await?.unwrap();
/// assert!(lock.try_acquire("shop:1", Duration::from_secs(10)).await?.is_none());
/// assert!(lock.release("shop:1", &token).await?);
/// # Ok(())
/// # }
/// ```
pub struct MemoryLock {
	locks: Arc<RwLock<HashMap<String, Holder>>>,
}

impl MemoryLock {
	/// Create a new in-memory lock table.
	pub fn new() -> Self {
		Self {
			locks: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	fn now_millis() -> i128 {
		chrono::Utc::now().timestamp_millis() as i128
	}

	/// Clean up expired holders
	async fn cleanup_expired(&self) {
		let mut locks = self.locks.write().await;
		let now = Self::now_millis();
		locks.retain(|_, holder| holder.expires_at > now);
	}
}

impl Default for MemoryLock {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl DistributedLock for MemoryLock {
	async fn try_acquire(&self, resource: &str, lease: Duration) -> LockResult<Option<LockToken>> {
		self.cleanup_expired().await;

		let mut locks = self.locks.write().await;
		let now = Self::now_millis();

		if let Some(holder) = locks.get(resource)
			&& holder.expires_at > now
		{
			return Ok(None);
		}

		let token = LockToken::new();
		locks.insert(
			resource.to_string(),
			Holder {
				token: token.as_str().to_string(),
				// as_millis() rather than as_secs() so sub-second leases work in tests
				expires_at: now + lease.as_millis() as i128,
			},
		);
		Ok(Some(token))
	}

	async fn release(&self, resource: &str, token: &LockToken) -> LockResult<bool> {
		let mut locks = self.locks.write().await;
		let now = Self::now_millis();

		match locks.get(resource) {
			Some(holder) if holder.expires_at > now && holder.token == token.as_str() => {
				locks.remove(resource);
				Ok(true)
			}
			Some(_) | None => Ok(false),
		}
	}
}

impl MemoryLock {
	/// Whether `resource` is currently held (mainly for tests).
	pub async fn is_locked(&self, resource: &str) -> LockResult<bool> {
		self.cleanup_expired().await;

		let locks = self.locks.read().await;
		let now = Self::now_millis();

		Ok(locks
			.get(resource)
			.map(|holder| holder.expires_at > now)
			.unwrap_or(false))
	}
}
