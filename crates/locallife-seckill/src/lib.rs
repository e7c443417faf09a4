//! Flash-sale ("seckill") admission and order persistence
//!
//! The hot path is one atomic admission script against the shared store:
//! check stock, check the per-voucher admitted-user set, then decrement,
//! admit and append the order intent to a durable intake stream, all in a
//! single indivisible unit. That single unit is what makes overselling and duplicate
//! orders impossible under arbitrary concurrency without an application
//! lock.
//!
//! Admitted callers return immediately with their order id; a background
//! [`OrderWorker`] consumes the intake stream through a consumer group,
//! persists each order inside a local database transaction and only then
//! acknowledges the entry. Unacknowledged entries survive worker crashes
//! in the group's pending list and are replayed until persisted: the
//! stream is the durable source of truth for "admitted but not yet
//! persisted".

mod backend;
mod coordinator;
mod error;
mod memory;
mod order_store;
mod record;
mod redis_backend;
mod sqlx_store;
mod worker;

pub use backend::SeckillBackend;
pub use coordinator::SeckillCoordinator;
pub use error::{OrderStoreError, SeckillError};
pub use memory::MemorySeckillBackend;
pub use order_store::{MemoryOrderStore, OrderStore};
pub use record::{AdmissionOutcome, OrderAdmissionRecord, PendingOrder, VoucherOrder};
pub use redis_backend::RedisSeckillBackend;
pub use sqlx_store::SqlxOrderStore;
pub use worker::{OrderWorker, WorkerConfig, WorkerHandle};

/// Result type for seckill operations
pub type SeckillResult<T> = Result<T, SeckillError>;
