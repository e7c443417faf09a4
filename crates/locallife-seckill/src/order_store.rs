//! The durable order persistence seam.

use crate::error::OrderStoreError;
use crate::record::VoucherOrder;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Durable persistence for admitted orders.
///
/// `persist` must be idempotent on the order id: the intake queue delivers
/// at least once, so a redelivered order must not create a second row or
/// decrement stock twice. Implementations uphold this with a uniqueness
/// constraint on the id and a single local transaction per order.
#[async_trait]
pub trait OrderStore: Send + Sync {
	/// Persist one admitted order: insert the row and decrement the
	/// durable stock inside one transaction. Re-persisting an already
	/// stored id is a successful no-op.
	async fn persist(&self, order: &VoucherOrder) -> Result<(), OrderStoreError>;

	/// Look up a persisted order by id.
	async fn fetch_order(&self, order_id: u64) -> Result<Option<VoucherOrder>, OrderStoreError>;
}

#[derive(Default)]
struct Inner {
	stock: HashMap<u64, i64>,
	orders: HashMap<u64, VoucherOrder>,
}

/// In-memory implementation of [`OrderStore`] for tests and single-process
/// use.
///
/// [`fail_next`](MemoryOrderStore::fail_next) injects persistence failures
/// so recovery paths can be exercised deterministically.
pub struct MemoryOrderStore {
	inner: Arc<Mutex<Inner>>,
	fail_remaining: AtomicU32,
}

impl MemoryOrderStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner::default())),
			fail_remaining: AtomicU32::new(0),
		}
	}

	/// Seed the durable stock column for a voucher.
	pub async fn seed_stock(&self, voucher_id: u64, stock: i64) {
		let mut inner = self.inner.lock().await;
		inner.stock.insert(voucher_id, stock);
	}

	/// Make the next `count` persist calls fail.
	pub fn fail_next(&self, count: u32) {
		self.fail_remaining.store(count, Ordering::SeqCst);
	}

	/// Number of persisted orders for a voucher.
	pub async fn order_count(&self, voucher_id: u64) -> usize {
		let inner = self.inner.lock().await;
		inner
			.orders
			.values()
			.filter(|order| order.voucher_id == voucher_id)
			.count()
	}

	/// Remaining durable stock for a voucher.
	pub async fn remaining_stock(&self, voucher_id: u64) -> i64 {
		let inner = self.inner.lock().await;
		inner.stock.get(&voucher_id).copied().unwrap_or(0)
	}
}

impl Default for MemoryOrderStore {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
	async fn persist(&self, order: &VoucherOrder) -> Result<(), OrderStoreError> {
		if self
			.fail_remaining
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
			.is_ok()
		{
			return Err(OrderStoreError::Database(
				"injected persistence failure".to_string(),
			));
		}

		let mut inner = self.inner.lock().await;

		// Redelivery of an already persisted order is a no-op.
		if inner.orders.contains_key(&order.id) {
			return Ok(());
		}

		let stock = inner.stock.entry(order.voucher_id).or_insert(0);
		if *stock <= 0 {
			return Err(OrderStoreError::StockExhausted(order.voucher_id));
		}
		*stock -= 1;
		inner.orders.insert(order.id, order.clone());
		Ok(())
	}

	async fn fetch_order(&self, order_id: u64) -> Result<Option<VoucherOrder>, OrderStoreError> {
		let inner = self.inner.lock().await;
		Ok(inner.orders.get(&order_id).cloned())
	}
}
