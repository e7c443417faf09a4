//! Atomic sequence backends.

use crate::{IdError, IdResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// An atomically incrementing counter per key.
///
/// The increment is the store's own atomic counter primitive; no
/// additional locking is layered on top.
#[async_trait]
pub trait SequenceBackend: Send + Sync {
	/// Increment the counter for `key` and return the new value.
	///
	/// The first call for a key returns 1.
	async fn next(&self, key: &str) -> IdResult<i64>;
}

/// Redis-backed sequence counter (`INCR`).
pub struct RedisSequenceBackend {
	connection: Arc<ConnectionManager>,
	key_prefix: String,
}

impl RedisSequenceBackend {
	/// Create a new Redis sequence backend.
	///
	/// # Examples
	///
	/// ```no_run
	/// use locallife_ids::RedisSequenceBackend;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let sequences = RedisSequenceBackend::new("redis://127.0.0.1/").await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(redis_url)?;
		let connection = ConnectionManager::new(client).await?;

		Ok(Self {
			connection: Arc::new(connection),
			key_prefix: "seq:".to_string(),
		})
	}

	/// Create a Redis sequence backend with a custom key prefix.
	pub async fn with_prefix(redis_url: &str, key_prefix: String) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(redis_url)?;
		let connection = ConnectionManager::new(client).await?;

		Ok(Self {
			connection: Arc::new(connection),
			key_prefix,
		})
	}
}

#[async_trait]
impl SequenceBackend for RedisSequenceBackend {
	async fn next(&self, key: &str) -> IdResult<i64> {
		let mut conn = (*self.connection).clone();
		let full_key = format!("{}{}", self.key_prefix, key);

		conn.incr(&full_key, 1i64)
			.await
			.map_err(|e| IdError::Store(format!("failed to increment sequence: {}", e)))
	}
}

/// In-memory sequence counter for single-process use and tests.
pub struct MemorySequenceBackend {
	counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl MemorySequenceBackend {
	/// Create a new in-memory sequence backend.
	pub fn new() -> Self {
		Self {
			counters: Arc::new(Mutex::new(HashMap::new())),
		}
	}
}

impl Default for MemorySequenceBackend {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SequenceBackend for MemorySequenceBackend {
	async fn next(&self, key: &str) -> IdResult<i64> {
		let mut counters = self.counters.lock().await;
		let counter = counters.entry(key.to_string()).or_insert(0);
		*counter += 1;
		Ok(*counter)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn first_increment_is_one() {
		let backend = MemorySequenceBackend::new();
		assert_eq!(backend.next("order:2026:08:06").await.unwrap(), 1);
		assert_eq!(backend.next("order:2026:08:06").await.unwrap(), 2);
	}

	#[tokio::test]
	async fn counters_are_key_scoped() {
		let backend = MemorySequenceBackend::new();
		backend.next("a").await.unwrap();
		backend.next("a").await.unwrap();
		assert_eq!(backend.next("b").await.unwrap(), 1);
	}
}
