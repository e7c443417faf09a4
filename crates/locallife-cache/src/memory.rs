//! In-memory cache backend for single-process use and tests.

use crate::backend::CacheBackend;
use crate::CacheResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct StoredEntry {
	value: String,
	expires_at: Option<Instant>,
}

impl StoredEntry {
	fn is_expired(&self) -> bool {
		self.expires_at.is_some_and(|at| Instant::now() >= at)
	}
}

/// In-memory implementation of [`CacheBackend`].
///
/// Expiry is enforced lazily on read, which is all the resilience
/// strategies require.
pub struct MemoryCacheBackend {
	entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl MemoryCacheBackend {
	/// Create a new empty backend.
	pub fn new() -> Self {
		Self {
			entries: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryCacheBackend {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
	async fn get(&self, key: &str) -> CacheResult<Option<String>> {
		{
			let entries = self.entries.read().await;
			match entries.get(key) {
				Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
				Some(_) => {}
				None => return Ok(None),
			}
		}

		// Expired: evict under the write lock.
		let mut entries = self.entries.write().await;
		if entries.get(key).is_some_and(StoredEntry::is_expired) {
			entries.remove(key);
		}
		Ok(entries.get(key).map(|entry| entry.value.clone()))
	}

	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
		let mut entries = self.entries.write().await;
		entries.insert(
			key.to_string(),
			StoredEntry {
				value: value.to_string(),
				expires_at: ttl.map(|d| Instant::now() + d),
			},
		);
		Ok(())
	}

	async fn delete(&self, key: &str) -> CacheResult<()> {
		let mut entries = self.entries.write().await;
		entries.remove(key);
		Ok(())
	}
}
