//! Redis-backed distributed lock.

use crate::lock::{DistributedLock, LockToken};
use crate::{LockError, LockResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Lua script for identity-checked release (compare-and-delete).
///
/// Deletes the lock key only when its current value equals the presented
/// holder token, in a single atomic unit. Prevents a holder whose lease
/// expired from deleting a lock since re-acquired by someone else.
///
/// KEYS[1] - lock key
/// ARGV[1] - holder token
///
/// Returns 1 if the lock was deleted, 0 otherwise.
const UNLOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
	return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis-based implementation of [`DistributedLock`].
///
/// Acquisition is a single `SET key token NX EX lease` round trip, so the
/// value and its TTL are written atomically; there is no window in which
/// the lock exists without a lease.
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
/// if let Some(token) = lock.try_acquire("shop:42", Duration::from_secs(10)).await? {
///     // rebuild the cache entry...
///     lock.release("shop:42", &token).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct RedisLock {
	connection: Arc<ConnectionManager>,
	key_prefix: String,
}

impl RedisLock {
	/// Create a new Redis-based lock.
	pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(redis_url)?;
		let connection = ConnectionManager::new(client).await?;

		Ok(Self {
			connection: Arc::new(connection),
			key_prefix: "lock:".to_string(),
		})
	}

	/// Create a Redis lock with a custom key prefix.
	///
	/// # Examples
	///
	/// ```no_run
	/// use locallife_locks::RedisLock;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let lock = RedisLock::with_prefix("redis://127.0.0.1/", "myapp:lock:".to_string()).await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn with_prefix(redis_url: &str, key_prefix: String) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(redis_url)?;
		let connection = ConnectionManager::new(client).await?;

		Ok(Self {
			connection: Arc::new(connection),
			key_prefix,
		})
	}

	fn lock_key(&self, resource: &str) -> String {
		format!("{}{}", self.key_prefix, resource)
	}
}

#[async_trait]
impl DistributedLock for RedisLock {
	async fn try_acquire(&self, resource: &str, lease: Duration) -> LockResult<Option<LockToken>> {
		let token = LockToken::new();
		let mut conn = (*self.connection).clone();
		let key = self.lock_key(resource);

		// SET NX EX writes value and lease in one atomic command.
		let reply: Option<String> = redis::cmd("SET")
			.arg(&key)
			.arg(token.as_str())
			.arg("NX")
			.arg("EX")
			.arg(lease.as_secs().max(1))
			.query_async(&mut conn)
			.await
			.map_err(|e| LockError::Store(format!("failed to acquire lock: {}", e)))?;

		Ok(reply.map(|_| token))
	}

	async fn release(&self, resource: &str, token: &LockToken) -> LockResult<bool> {
		let mut conn = (*self.connection).clone();
		let key = self.lock_key(resource);

		let script = redis::Script::new(UNLOCK_SCRIPT);
		let deleted: i64 = script
			.key(&key)
			.arg(token.as_str())
			.invoke_async(&mut conn)
			.await
			.map_err(|e| LockError::Store(format!("failed to release lock: {}", e)))?;

		if deleted == 0 {
			debug!(resource, "release skipped: token does not match current holder");
		}
		Ok(deleted == 1)
	}
}
