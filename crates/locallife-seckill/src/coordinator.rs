//! The flash-sale admission front door.

use crate::backend::SeckillBackend;
use crate::record::{AdmissionOutcome, OrderAdmissionRecord};
use crate::{SeckillError, SeckillResult};
use locallife_ids::IdGenerator;
use std::sync::Arc;
use tracing::debug;

/// Purpose tag for order ids.
const ORDER_ID_TAG: &str = "order";

/// Admission control for flash-sale campaigns.
///
/// `submit` is the entire hot path: generate an order id, run the atomic
/// admission script, return. Durable persistence happens asynchronously in
/// the [`OrderWorker`](crate::OrderWorker), so the caller's latency never
/// includes a database write.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use locallife_ids::{IdGenerator, MemorySequenceBackend};
/// use locallife_seckill::{MemorySeckillBackend, SeckillCoordinator, SeckillError};
///
/// # async fn example() -> locallife_seckill::SeckillResult<()> {
/// let coordinator = SeckillCoordinator::new(
///     Arc::new(MemorySeckillBackend::new()),
///     Arc::new(IdGenerator::new(Arc::new(MemorySequenceBackend::new()))),
/// );
///
/// coordinator.publish_campaign(1, 100).await?;
/// let order_id = coordinator.submit(1, 42).await?;
///
/// // The same user cannot order twice.
/// assert!(matches!(
///     coordinator.submit(1, 42).await,
///     Err(SeckillError::DuplicateOrder)
/// ));
/// # let _ = order_id;
/// # Ok(())
/// # }
/// ```
pub struct SeckillCoordinator {
	backend: Arc<dyn SeckillBackend>,
	ids: Arc<IdGenerator>,
}

impl SeckillCoordinator {
	/// Create a coordinator over a seckill backend and an id generator.
	pub fn new(backend: Arc<dyn SeckillBackend>, ids: Arc<IdGenerator>) -> Self {
		Self { backend, ids }
	}

	/// Open a campaign: seed its admission stock and make sure the intake
	/// consumer group exists before the first order arrives.
	pub async fn publish_campaign(&self, voucher_id: u64, stock: i64) -> SeckillResult<()> {
		self.backend.seed_stock(voucher_id, stock).await?;
		self.backend.ensure_group().await
	}

	/// Attempt to buy one voucher for `user_id`.
	///
	/// Returns the order id on admission. [`SeckillError::InsufficientStock`]
	/// and [`SeckillError::DuplicateOrder`] are expected rejections with no
	/// side effects; any other error means the store was unreachable and
	/// nothing can be said about the attempt.
	pub async fn submit(&self, voucher_id: u64, user_id: u64) -> SeckillResult<u64> {
		let order_id = self.ids.next_id(ORDER_ID_TAG).await?;
		let record = OrderAdmissionRecord {
			order_id,
			user_id,
			voucher_id,
		};

		match self.backend.reserve(&record).await? {
			AdmissionOutcome::Admitted => {
				debug!(order_id, user_id, voucher_id, "order admitted");
				Ok(order_id)
			}
			AdmissionOutcome::InsufficientStock => Err(SeckillError::InsufficientStock),
			AdmissionOutcome::DuplicateOrder => Err(SeckillError::DuplicateOrder),
		}
	}
}
