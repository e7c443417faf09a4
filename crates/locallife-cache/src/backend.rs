//! The raw cache storage contract.

use crate::CacheResult;
use async_trait::async_trait;
use std::time::Duration;

/// Raw string storage with per-key TTL.
///
/// Values are opaque to the backend; the [`CacheClient`](crate::CacheClient)
/// layers JSON encoding and the resilience strategies on top. The empty
/// string is reserved as the "confirmed absent" sentinel and is a valid
/// stored value, distinct from a missing key.
#[async_trait]
pub trait CacheBackend: Send + Sync {
	/// Read the raw value at `key`. `None` is a miss, `Some("")` the
	/// absent sentinel.
	async fn get(&self, key: &str) -> CacheResult<Option<String>>;

	/// Write `value` at `key`. `ttl = None` stores without store-level
	/// expiry (used by the logical-expiration strategy, which judges
	/// freshness from the payload instead).
	async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

	/// Remove `key`. Removing a missing key is not an error.
	async fn delete(&self, key: &str) -> CacheResult<()>;
}
