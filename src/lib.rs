//! # LocalLife engine
//!
//! The cache-resilience and flash-sale coordination engine behind the
//! LocalLife local-services platform.
//!
//! The platform's request handlers are thin data-access glue; everything
//! that has to survive contention lives here:
//!
//! - [`locks`]: distributed mutual exclusion over the shared Redis store,
//!   with identity-checked release so a stale holder can never free a lock
//!   that has since been re-acquired by someone else.
//! - [`ids`]: 64-bit, time-ordered order ids composed from a second
//!   timestamp and a date-scoped atomic sequence.
//! - [`cache`]: read-through caching with penetration (empty sentinel),
//!   breakdown (mutex rebuild) and stampede (logical expiry, stale-while-
//!   revalidate) protection.
//! - [`seckill`]: flash-sale admission: an atomic stock/dedup/enqueue
//!   script, a durable intake stream consumed by a worker group, and
//!   pending-list replay so an admitted order is never lost.
//!
//! Every component is a trait seam with a Redis-backed production
//! implementation and an in-memory implementation for single-process use
//! and deterministic tests.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use locallife::ids::{IdGenerator, RedisSequenceBackend};
//! use locallife::seckill::{OrderWorker, RedisSeckillBackend, SeckillCoordinator, SqlxOrderStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(RedisSeckillBackend::new("redis://127.0.0.1/").await?);
//! let sequences = Arc::new(RedisSequenceBackend::new("redis://127.0.0.1/").await?);
//! let ids = Arc::new(IdGenerator::new(sequences));
//! let store = Arc::new(SqlxOrderStore::connect("mysql://localhost/locallife").await?);
//!
//! let coordinator = SeckillCoordinator::new(backend.clone(), ids);
//! let worker = OrderWorker::new(backend, store).spawn();
//!
//! coordinator.publish_campaign(1, 100).await?;
//! let order_id = coordinator.submit(1, 42).await?;
//! println!("admitted as order {order_id}");
//!
//! worker.stop().await;
//! # Ok(())
//! # }
//! ```

pub use locallife_cache as cache;
pub use locallife_ids as ids;
pub use locallife_locks as locks;
pub use locallife_seckill as seckill;
