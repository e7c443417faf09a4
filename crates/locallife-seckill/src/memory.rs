//! In-memory seckill store for single-process use and tests.

use crate::backend::SeckillBackend;
use crate::record::{AdmissionOutcome, OrderAdmissionRecord, PendingOrder};
use crate::{SeckillError, SeckillResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, timeout};

struct PendingDelivery {
	consumer: String,
	record: OrderAdmissionRecord,
}

#[derive(Default)]
struct Inner {
	stock: HashMap<u64, i64>,
	admitted: HashMap<u64, HashSet<u64>>,
	/// Append-only log of (sequence, record).
	entries: Vec<(u64, OrderAdmissionRecord)>,
	next_seq: u64,
	/// Index into `entries` of the next never-delivered entry.
	delivered: usize,
	/// Delivered but unacknowledged entries, oldest first.
	pending: BTreeMap<u64, PendingDelivery>,
}

/// In-memory implementation of [`SeckillBackend`].
///
/// Admission runs under a single mutex, which gives it the same
/// atomicity the Redis implementation gets from its server-side script.
/// The intake log models one consumer group with per-consumer pending
/// lists.
pub struct MemorySeckillBackend {
	inner: Arc<Mutex<Inner>>,
	appended: Arc<Notify>,
}

impl MemorySeckillBackend {
	/// Create an empty backend.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(Inner {
				next_seq: 1,
				..Inner::default()
			})),
			appended: Arc::new(Notify::new()),
		}
	}

	/// Remaining admission stock for `voucher_id` (mainly for tests).
	pub async fn remaining_stock(&self, voucher_id: u64) -> i64 {
		let inner = self.inner.lock().await;
		inner.stock.get(&voucher_id).copied().unwrap_or(0)
	}

	/// Number of unacknowledged deliveries across all consumers (mainly
	/// for tests).
	pub async fn pending_count(&self) -> usize {
		let inner = self.inner.lock().await;
		inner.pending.len()
	}

	fn entry_id(seq: u64) -> String {
		format!("{}-0", seq)
	}

	fn parse_entry_id(entry_id: &str) -> SeckillResult<u64> {
		entry_id
			.split('-')
			.next()
			.and_then(|part| part.parse().ok())
			.ok_or_else(|| SeckillError::MalformedEntry {
				entry_id: entry_id.to_string(),
				reason: "not a <seq>-<step> stream id".to_string(),
			})
	}
}

impl Default for MemorySeckillBackend {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl SeckillBackend for MemorySeckillBackend {
	async fn seed_stock(&self, voucher_id: u64, stock: i64) -> SeckillResult<()> {
		let mut inner = self.inner.lock().await;
		inner.stock.insert(voucher_id, stock);
		Ok(())
	}

	async fn reserve(&self, record: &OrderAdmissionRecord) -> SeckillResult<AdmissionOutcome> {
		let mut inner = self.inner.lock().await;

		if inner.stock.get(&record.voucher_id).copied().unwrap_or(0) <= 0 {
			return Ok(AdmissionOutcome::InsufficientStock);
		}
		if inner
			.admitted
			.get(&record.voucher_id)
			.is_some_and(|users| users.contains(&record.user_id))
		{
			return Ok(AdmissionOutcome::DuplicateOrder);
		}

		*inner.stock.entry(record.voucher_id).or_insert(0) -= 1;
		inner
			.admitted
			.entry(record.voucher_id)
			.or_default()
			.insert(record.user_id);
		let seq = inner.next_seq;
		inner.next_seq += 1;
		inner.entries.push((seq, record.clone()));

		self.appended.notify_one();
		Ok(AdmissionOutcome::Admitted)
	}

	async fn ensure_group(&self) -> SeckillResult<()> {
		Ok(())
	}

	async fn read_new(
		&self,
		consumer: &str,
		count: usize,
		block: Duration,
	) -> SeckillResult<Vec<PendingOrder>> {
		let deadline = Instant::now() + block;

		loop {
			{
				let mut inner = self.inner.lock().await;
				if inner.delivered < inner.entries.len() {
					let take = count.max(1).min(inner.entries.len() - inner.delivered);
					let start = inner.delivered;
					let batch: Vec<(u64, OrderAdmissionRecord)> =
						inner.entries[start..start + take].to_vec();
					inner.delivered += take;

					let mut delivered = Vec::with_capacity(take);
					for (seq, record) in batch {
						inner.pending.insert(
							seq,
							PendingDelivery {
								consumer: consumer.to_string(),
								record: record.clone(),
							},
						);
						delivered.push(PendingOrder {
							entry_id: Self::entry_id(seq),
							record,
						});
					}
					return Ok(delivered);
				}
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Ok(Vec::new());
			}
			// A missed notification only costs one extra loop turn; the
			// bounded wait still holds.
			let _ = timeout(remaining, self.appended.notified()).await;
		}
	}

	async fn read_pending(&self, consumer: &str, count: usize) -> SeckillResult<Vec<PendingOrder>> {
		let inner = self.inner.lock().await;

		Ok(inner
			.pending
			.iter()
			.filter(|(_, delivery)| delivery.consumer == consumer)
			.take(count.max(1))
			.map(|(seq, delivery)| PendingOrder {
				entry_id: Self::entry_id(*seq),
				record: delivery.record.clone(),
			})
			.collect())
	}

	async fn ack(&self, entry_id: &str) -> SeckillResult<()> {
		let seq = Self::parse_entry_id(entry_id)?;
		let mut inner = self.inner.lock().await;
		inner.pending.remove(&seq);
		Ok(())
	}
}
