//! Crash and persistence-failure recovery tests
//!
//! The intake queue is the durable source of truth for "admitted but not
//! yet persisted": these tests verify that entries survive worker failure
//! and are persisted exactly once.

use locallife_ids::{IdGenerator, MemorySequenceBackend};
use locallife_seckill::{
	MemoryOrderStore, MemorySeckillBackend, OrderStore, OrderWorker, SeckillBackend,
	SeckillCoordinator, WorkerConfig,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

fn coordinator(backend: Arc<MemorySeckillBackend>) -> SeckillCoordinator {
	let ids = Arc::new(IdGenerator::new(Arc::new(MemorySequenceBackend::new())));
	SeckillCoordinator::new(backend, ids)
}

fn worker_config(consumer: &str) -> WorkerConfig {
	WorkerConfig {
		consumer: consumer.to_string(),
		block: Duration::from_millis(100),
		batch: 1,
	}
}

async fn eventually<F, Fut>(mut check: F) -> bool
where
	F: FnMut() -> Fut,
	Fut: Future<Output = bool>,
{
	for _ in 0..250 {
		if check().await {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	false
}

/// A persist failure leaves the entry unacknowledged; the pending-list
/// sweep retries it until it lands, with no duplicate row.
#[tokio::test(flavor = "multi_thread")]
async fn failed_persist_is_replayed_from_pending() {
	let backend = Arc::new(MemorySeckillBackend::new());
	let store = Arc::new(MemoryOrderStore::new());
	let coordinator = coordinator(backend.clone());

	coordinator.publish_campaign(1, 5).await.unwrap();
	store.seed_stock(1, 5).await;

	// The first persist attempt will throw.
	store.fail_next(1);

	let order_id = coordinator.submit(1, 42).await.unwrap();

	let handle = OrderWorker::new(backend.clone(), store.clone())
		.with_config(worker_config("c1"))
		.spawn();

	let store_check = store.clone();
	assert!(
		eventually(move || {
			let store = store_check.clone();
			async move { store.fetch_order(order_id).await.unwrap().is_some() }
		})
		.await,
		"order was never persisted after the failure"
	);

	handle.stop().await;
	assert_eq!(store.order_count(1).await, 1);
	assert_eq!(backend.pending_count().await, 0);
}

/// A worker that dies after reading but before acknowledging leaves the
/// entry in its pending list; a restarted worker with the same consumer
/// name persists and acknowledges it before resuming the main loop.
#[tokio::test(flavor = "multi_thread")]
async fn crashed_worker_recovers_its_pending_entry_on_restart() {
	let backend = Arc::new(MemorySeckillBackend::new());
	let store = Arc::new(MemoryOrderStore::new());
	let coordinator = coordinator(backend.clone());

	coordinator.publish_campaign(1, 5).await.unwrap();
	store.seed_stock(1, 5).await;

	let order_id = coordinator.submit(1, 42).await.unwrap();

	// Simulate the crash: the entry is claimed but never persisted or
	// acknowledged.
	let claimed = backend
		.read_new("c1", 1, Duration::from_millis(100))
		.await
		.unwrap();
	assert_eq!(claimed.len(), 1);
	assert_eq!(claimed[0].record.order_id, order_id);
	assert_eq!(backend.pending_count().await, 1);
	assert_eq!(store.order_count(1).await, 0);

	// Restart: the startup sweep drains the backlog.
	let handle = OrderWorker::new(backend.clone(), store.clone())
		.with_config(worker_config("c1"))
		.spawn();

	let store_check = store.clone();
	assert!(
		eventually(move || {
			let store = store_check.clone();
			async move { store.fetch_order(order_id).await.unwrap().is_some() }
		})
		.await,
		"restarted worker never recovered the pending entry"
	);

	let backend_check = backend.clone();
	assert!(
		eventually(move || {
			let backend = backend_check.clone();
			async move { backend.pending_count().await == 0 }
		})
		.await,
		"recovered entry was never acknowledged"
	);

	handle.stop().await;
	assert_eq!(store.order_count(1).await, 1);
}

/// Redelivery after a crash-between-persist-and-ack must not create a
/// second row: persistence is idempotent on the order id.
#[tokio::test(flavor = "multi_thread")]
async fn redelivery_after_persist_does_not_duplicate() {
	let backend = Arc::new(MemorySeckillBackend::new());
	let store = Arc::new(MemoryOrderStore::new());
	let coordinator = coordinator(backend.clone());

	coordinator.publish_campaign(1, 5).await.unwrap();
	store.seed_stock(1, 5).await;

	let order_id = coordinator.submit(1, 42).await.unwrap();

	// First worker persists but "crashes" before acknowledging.
	let claimed = backend
		.read_new("c1", 1, Duration::from_millis(100))
		.await
		.unwrap();
	let order = locallife_seckill::VoucherOrder::from_record(&claimed[0].record);
	store.persist(&order).await.unwrap();
	assert_eq!(store.order_count(1).await, 1);

	// Restarted worker replays the still-pending entry.
	let handle = OrderWorker::new(backend.clone(), store.clone())
		.with_config(worker_config("c1"))
		.spawn();

	let backend_check = backend.clone();
	assert!(
		eventually(move || {
			let backend = backend_check.clone();
			async move { backend.pending_count().await == 0 }
		})
		.await,
		"replayed entry was never acknowledged"
	);

	handle.stop().await;
	// Exactly one row and exactly one stock decrement.
	assert_eq!(store.order_count(1).await, 1);
	assert_eq!(store.remaining_stock(1).await, 4);
	assert!(store.fetch_order(order_id).await.unwrap().is_some());
}

/// The standalone sweep persists a claimed backlog without a running
/// main loop.
#[tokio::test]
async fn standalone_sweep_drains_backlog() {
	let backend = Arc::new(MemorySeckillBackend::new());
	let store = Arc::new(MemoryOrderStore::new());
	let coordinator = coordinator(backend.clone());

	coordinator.publish_campaign(1, 5).await.unwrap();
	store.seed_stock(1, 5).await;

	for user_id in 1..=3u64 {
		coordinator.submit(1, user_id).await.unwrap();
	}
	backend
		.read_new("c1", 3, Duration::from_millis(100))
		.await
		.unwrap();
	assert_eq!(backend.pending_count().await, 3);

	let worker =
		OrderWorker::new(backend.clone(), store.clone()).with_config(worker_config("c1"));
	worker.drain_pending().await;

	assert_eq!(store.order_count(1).await, 3);
	assert_eq!(backend.pending_count().await, 0);
}
