//! The read-through cache client.

use crate::CacheResult;
use crate::backend::CacheBackend;
use crate::entry::ExpiringValue;
use crate::rebuild::RebuildPool;
use locallife_locks::{DistributedLock, RetryPolicy};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Read-through cache with penetration, breakdown and stampede protection.
///
/// Composes a raw [`CacheBackend`], a [`DistributedLock`] guarding rebuilds
/// and a bounded [`RebuildPool`] for background refreshes. Values are JSON;
/// the empty string is the "confirmed absent" sentinel.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use locallife_cache::{CacheClient, MemoryCacheBackend, RebuildPool, RebuildPoolConfig};
/// use locallife_locks::MemoryLock;
///
/// # async fn example() -> locallife_cache::CacheResult<()> {
/// let client = CacheClient::new(
///     Arc::new(MemoryCacheBackend::new()),
///     Arc::new(MemoryLock::new()),
///     Arc::new(RebuildPool::new(RebuildPoolConfig::default())),
/// );
///
/// let shop: Option<String> = client
///     .query_with_pass_through("shop:", 7u64, Duration::from_secs(1800), |id| async move {
///         // fetch from the backing store
///         Ok(Some(format!("shop #{id}")))
///     })
///     .await?;
/// assert_eq!(shop.as_deref(), Some("shop #7"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheClient {
	backend: Arc<dyn CacheBackend>,
	lock: Arc<dyn DistributedLock>,
	rebuild_pool: Arc<RebuildPool>,
	null_ttl: Duration,
	lock_lease: Duration,
	retry: RetryPolicy,
}

impl CacheClient {
	/// Create a client with default tuning: 2 minute sentinel TTL, 10
	/// second rebuild lease, 50 ms x 5 lock retry.
	pub fn new(
		backend: Arc<dyn CacheBackend>,
		lock: Arc<dyn DistributedLock>,
		rebuild_pool: Arc<RebuildPool>,
	) -> Self {
		Self {
			backend,
			lock,
			rebuild_pool,
			null_ttl: Duration::from_secs(120),
			lock_lease: Duration::from_secs(10),
			retry: RetryPolicy::default(),
		}
	}

	/// Set the TTL for empty-sentinel entries.
	pub fn with_null_ttl(mut self, ttl: Duration) -> Self {
		self.null_ttl = ttl;
		self
	}

	/// Set the lease for per-id rebuild locks.
	pub fn with_lock_lease(mut self, lease: Duration) -> Self {
		self.lock_lease = lease;
		self
	}

	/// Set the bounded retry used when waiting on a rebuild lock.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;
		self
	}

	/// Cache `value` under `key` with a store-level TTL.
	pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
		let json = serde_json::to_string(value)?;
		self.backend.set(key, &json, Some(ttl)).await
	}

	/// Cache `value` under `key` with an embedded logical expiry and no
	/// store-level TTL.
	pub async fn set_with_logical_expiry<T: Serialize>(
		&self,
		key: &str,
		value: &T,
		ttl: Duration,
	) -> CacheResult<()> {
		let wrapped = ExpiringValue::new(value, ttl);
		let json = serde_json::to_string(&wrapped)?;
		self.backend.set(key, &json, None).await
	}

	/// Drop `key` from the cache (e.g. after the backing row was updated).
	pub async fn invalidate(&self, key: &str) -> CacheResult<()> {
		self.backend.delete(key).await
	}

	/// Read-through with penetration protection.
	///
	/// On a miss the backing store is queried once; a nonexistent id is
	/// remembered with a short-lived empty sentinel, so a burst of lookups
	/// for it costs at most one store query per sentinel window.
	pub async fn query_with_pass_through<T, ID, F, Fut>(
		&self,
		prefix: &str,
		id: ID,
		ttl: Duration,
		fetch: F,
	) -> CacheResult<Option<T>>
	where
		T: Serialize + DeserializeOwned,
		ID: Display,
		F: FnOnce(ID) -> Fut,
		Fut: Future<Output = CacheResult<Option<T>>>,
	{
		let key = format!("{}{}", prefix, id);
		match self.backend.get(&key).await? {
			Some(json) if !json.is_empty() => return Ok(Some(serde_json::from_str(&json)?)),
			// Empty sentinel: confirmed absent upstream.
			Some(_) => return Ok(None),
			None => {}
		}

		match fetch(id).await? {
			Some(value) => {
				self.set(&key, &value, ttl).await?;
				Ok(Some(value))
			}
			None => {
				self.backend.set(&key, "", Some(self.null_ttl)).await?;
				Ok(None)
			}
		}
	}

	/// Read-through with breakdown protection.
	///
	/// A per-id distributed lock admits exactly one concurrent rebuild.
	/// Waiters retry on a bounded policy and then fail soft to `None`
	/// rather than overloading the backing store; a waiter that does get
	/// the lock re-checks the cache first, since the previous holder
	/// usually rebuilt the entry already.
	pub async fn query_with_mutex<T, ID, F, Fut>(
		&self,
		prefix: &str,
		id: ID,
		ttl: Duration,
		fetch: F,
	) -> CacheResult<Option<T>>
	where
		T: Serialize + DeserializeOwned,
		ID: Display,
		F: FnOnce(ID) -> Fut,
		Fut: Future<Output = CacheResult<Option<T>>>,
	{
		let key = format!("{}{}", prefix, id);
		match self.backend.get(&key).await? {
			Some(json) if !json.is_empty() => return Ok(Some(serde_json::from_str(&json)?)),
			Some(_) => return Ok(None),
			None => {}
		}

		let Some(token) = self
			.lock
			.acquire_with_retry(&key, self.lock_lease, self.retry)
			.await?
		else {
			// Retries exhausted: serve absent instead of dead-waiting.
			return Ok(None);
		};

		let rebuilt = self.rebuild_under_lock(&key, id, ttl, fetch).await;

		// Released on every path, success and failure alike.
		if let Err(e) = self.lock.release(&key, &token).await {
			warn!(key = %key, error = %e, "failed to release rebuild lock");
		}
		rebuilt
	}

	async fn rebuild_under_lock<T, ID, F, Fut>(
		&self,
		key: &str,
		id: ID,
		ttl: Duration,
		fetch: F,
	) -> CacheResult<Option<T>>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce(ID) -> Fut,
		Fut: Future<Output = CacheResult<Option<T>>>,
	{
		// Another holder may have rebuilt the entry while we waited.
		match self.backend.get(key).await? {
			Some(json) if !json.is_empty() => return Ok(Some(serde_json::from_str(&json)?)),
			Some(_) => return Ok(None),
			None => {}
		}

		match fetch(id).await? {
			Some(value) => {
				self.set(key, &value, ttl).await?;
				Ok(Some(value))
			}
			None => {
				self.backend.set(key, "", Some(self.null_ttl)).await?;
				Ok(None)
			}
		}
	}

	/// Read-through with logical expiration (stale-while-revalidate).
	///
	/// Entries are pre-populated via [`warm_up`](Self::warm_up) or
	/// [`set_with_logical_expiry`](Self::set_with_logical_expiry) and never
	/// evicted by the store; a cold miss returns `None` without rebuilding.
	/// A logically expired entry is served as-is while at most one
	/// background rebuild (guarded by the per-id lock) refreshes it, so
	/// callers are never blocked and staleness is bounded by rebuild
	/// latency.
	pub async fn query_with_logical_expire<T, ID, F, Fut>(
		&self,
		prefix: &str,
		id: ID,
		ttl: Duration,
		fetch: F,
	) -> CacheResult<Option<T>>
	where
		T: Serialize + DeserializeOwned + Send + 'static,
		ID: Display + Send + 'static,
		F: FnOnce(ID) -> Fut + Send + 'static,
		Fut: Future<Output = CacheResult<Option<T>>> + Send + 'static,
	{
		let key = format!("{}{}", prefix, id);

		let Some(json) = self.backend.get(&key).await? else {
			return Ok(None);
		};
		let wrapped: ExpiringValue<T> = serde_json::from_str(&json)?;
		if !wrapped.is_expired() {
			return Ok(Some(wrapped.data));
		}

		// Stale: admit at most one rebuild, everyone serves the old value.
		if let Some(token) = self.lock.try_acquire(&key, self.lock_lease).await? {
			let backend = Arc::clone(&self.backend);
			let lock = Arc::clone(&self.lock);
			let task_key = key.clone();
			let task_token = token.clone();

			let submitted = self
				.rebuild_pool
				.try_submit(async move {
					match fetch(id).await {
						Ok(Some(value)) => {
							let rewrapped = ExpiringValue::new(value, ttl);
							match serde_json::to_string(&rewrapped) {
								Ok(json) => {
									if let Err(e) = backend.set(&task_key, &json, None).await {
										error!(key = %task_key, error = %e, "cache rebuild write failed");
									}
								}
								Err(e) => {
									error!(key = %task_key, error = %e, "cache rebuild encode failed");
								}
							}
						}
						Ok(None) => {
							warn!(key = %task_key, "backing store has no row for logically expired entry");
						}
						Err(e) => error!(key = %task_key, error = %e, "cache rebuild fetch failed"),
					}
					if let Err(e) = lock.release(&task_key, &task_token).await {
						warn!(key = %task_key, error = %e, "failed to release rebuild lock");
					}
				})
				.await;

			if !submitted {
				warn!(key = %key, "rebuild queue full; serving stale without rebuild");
				if let Err(e) = self.lock.release(&key, &token).await {
					warn!(key = %key, error = %e, "failed to release rebuild lock");
				}
			}
		}

		Ok(Some(wrapped.data))
	}

	/// Pre-populate a logically expiring entry from the backing store.
	///
	/// Returns whether a backing row existed. This is the out-of-band
	/// population step the logical-expiration strategy assumes.
	pub async fn warm_up<T, ID, F, Fut>(
		&self,
		prefix: &str,
		id: ID,
		ttl: Duration,
		fetch: F,
	) -> CacheResult<bool>
	where
		T: Serialize,
		ID: Display,
		F: FnOnce(ID) -> Fut,
		Fut: Future<Output = CacheResult<Option<T>>>,
	{
		let key = format!("{}{}", prefix, id);
		match fetch(id).await? {
			Some(value) => {
				self.set_with_logical_expiry(&key, &value, ttl).await?;
				Ok(true)
			}
			None => Ok(false),
		}
	}
}
