//! Cache resilience for the LocalLife read paths
//!
//! Three interchangeable read-through strategies shield the backing store
//! from the classic cache failure modes:
//!
//! - **Pass-through** ([`CacheClient::query_with_pass_through`]): misses
//!   for nonexistent ids write a short-lived empty sentinel, so a sustained
//!   burst of lookups for a missing record costs at most one backing-store
//!   query per sentinel window (penetration protection).
//! - **Mutex rebuild** ([`CacheClient::query_with_mutex`]): a per-id
//!   distributed lock admits exactly one rebuilder; everyone else retries
//!   briefly and then fails soft to "absent" instead of piling onto the
//!   store (breakdown protection).
//! - **Logical expiration** ([`CacheClient::query_with_logical_expire`]):
//!   entries carry their expiry inside the payload and are never evicted by
//!   the store; stale reads return immediately while a single background
//!   rebuild refreshes the entry (stale-while-revalidate).
//!
//! A cache miss and an empty sentinel are distinguishable everywhere: the
//! sentinel means "confirmed absent in the backing store", a miss means
//! "never checked or evicted".

mod backend;
mod client;
mod entry;
mod error;
mod memory;
mod rebuild;
mod redis_backend;

pub use backend::CacheBackend;
pub use client::CacheClient;
pub use entry::ExpiringValue;
pub use error::CacheError;
pub use memory::MemoryCacheBackend;
pub use rebuild::{RebuildPool, RebuildPoolConfig};
pub use redis_backend::RedisCacheBackend;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
