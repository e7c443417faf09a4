//! Redis cache backend.

use crate::backend::CacheBackend;
use crate::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;

/// Redis-based implementation of [`CacheBackend`].
///
/// # Examples
///
/// ```no_run
/// use locallife_cache::RedisCacheBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = RedisCacheBackend::new("redis://127.0.0.1/").await?;
/// # Ok(())
/// # }
/// ```
pub struct RedisCacheBackend {
	connection: Arc<ConnectionManager>,
	key_prefix: String,
}

impl RedisCacheBackend {
	/// Create a new Redis cache backend.
	pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(redis_url)?;
		let connection = ConnectionManager::new(client).await?;

		Ok(Self {
			connection: Arc::new(connection),
			key_prefix: String::new(),
		})
	}

	/// Set a key prefix for namespacing cache entries.
	///
	/// # Examples
	///
	/// ```no_run
	/// use locallife_cache::RedisCacheBackend;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let backend = RedisCacheBackend::new("redis://127.0.0.1/")
	///     .await?
	///     .with_key_prefix("cache:");
	/// # Ok(())
	/// # }
	/// ```
	pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();
		self
	}

	fn build_key(&self, key: &str) -> String {
		format!("{}{}", self.key_prefix, key)
	}
}

#[async_trait]
impl CacheBackend for RedisCacheBackend {
	async fn get(&self, key: &str) -> CacheResult<Option<String>> {
		let mut conn = (*self.connection).clone();
		let full_key = self.build_key(key);

		conn.get(&full_key)
			.await
			.map_err(|e| CacheError::Store(format!("GET failed: {}", e)))
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
		let mut conn = (*self.connection).clone();
		let full_key = self.build_key(key);

		match ttl {
			Some(ttl) => conn
				.set_ex(&full_key, value, ttl.as_secs().max(1))
				.await
				.map_err(|e| CacheError::Store(format!("SETEX failed: {}", e))),
			None => conn
				.set(&full_key, value)
				.await
				.map_err(|e| CacheError::Store(format!("SET failed: {}", e))),
		}
	}

	async fn delete(&self, key: &str) -> CacheResult<()> {
		let mut conn = (*self.connection).clone();
		let full_key = self.build_key(key);

		conn.del(&full_key)
			.await
			.map_err(|e| CacheError::Store(format!("DEL failed: {}", e)))
	}
}
