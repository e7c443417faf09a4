//! The seckill store contract.

use crate::SeckillResult;
use crate::record::{AdmissionOutcome, OrderAdmissionRecord, PendingOrder};
use async_trait::async_trait;
use std::time::Duration;

/// Admission state plus the durable intake queue.
///
/// Both live behind one trait because the admission step must mutate them
/// atomically: stock check, dedup check, decrement, admit and enqueue are
/// a single indivisible unit with respect to every concurrent attempt for
/// the same voucher. The Redis implementation runs them as one server-side
/// script; the in-memory implementation serializes them on one mutex.
///
/// Consumption is an explicit two-phase protocol: a delivered entry stays
/// in the consumer's pending list until [`ack`](SeckillBackend::ack), and
/// [`read_pending`](SeckillBackend::read_pending) replays the
/// unacknowledged backlog after a crash or a persistence failure.
#[async_trait]
pub trait SeckillBackend: Send + Sync {
	/// Write the stock counter a campaign admits against.
	async fn seed_stock(&self, voucher_id: u64, stock: i64) -> SeckillResult<()>;

	/// Run the atomic admission script for one order intent.
	///
	/// On [`AdmissionOutcome::Admitted`] the stock was decremented, the
	/// user added to the admitted set and the record appended to the
	/// intake queue; on either rejection nothing was changed.
	async fn reserve(&self, record: &OrderAdmissionRecord) -> SeckillResult<AdmissionOutcome>;

	/// Idempotently create the consumer group over the intake stream.
	async fn ensure_group(&self) -> SeckillResult<()>;

	/// Read up to `count` never-delivered entries for `consumer`, waiting
	/// at most `block`. An empty result is normal, not an error.
	async fn read_new(
		&self,
		consumer: &str,
		count: usize,
		block: Duration,
	) -> SeckillResult<Vec<PendingOrder>>;

	/// Read up to `count` entries from `consumer`'s unacknowledged
	/// backlog, oldest first. Does not block.
	async fn read_pending(&self, consumer: &str, count: usize) -> SeckillResult<Vec<PendingOrder>>;

	/// Acknowledge a delivered entry, removing it from the pending list.
	async fn ack(&self, entry_id: &str) -> SeckillResult<()>;
}
