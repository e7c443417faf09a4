//! The id generator.

use crate::sequence::SequenceBackend;
use crate::{IdError, IdResult};
use chrono::Utc;
use std::sync::Arc;

/// Number of low bits reserved for the daily sequence.
const SEQUENCE_BITS: u32 = 32;

/// Generates 64-bit ids of the form `(seconds_since_epoch << 32) | sequence`.
///
/// Within one calendar day and one purpose tag, ids are strictly
/// increasing; across days the timestamp component dominates the ordering.
/// The sequence resets each day because the counter key embeds the date.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use locallife_ids::{IdGenerator, MemorySequenceBackend};
///
/// # async fn example() -> locallife_ids::IdResult<()> {
/// let ids = IdGenerator::new(Arc::new(MemorySequenceBackend::new()));
///
/// let first = ids.next_id("order").await?;
/// let second = ids.next_id("order").await?;
/// assert!(first < second);
/// # Ok(())
/// # }
/// ```
pub struct IdGenerator {
	backend: Arc<dyn SequenceBackend>,
	epoch_seconds: i64,
}

impl IdGenerator {
	/// Generator epoch: 2024-01-01T00:00:00Z.
	pub const DEFAULT_EPOCH: i64 = 1_704_067_200;

	/// Create a generator with the default epoch.
	pub fn new(backend: Arc<dyn SequenceBackend>) -> Self {
		Self {
			backend,
			epoch_seconds: Self::DEFAULT_EPOCH,
		}
	}

	/// Create a generator with a custom epoch (seconds since the Unix
	/// epoch). The epoch must predate every call site's wall clock.
	pub fn with_epoch(backend: Arc<dyn SequenceBackend>, epoch_seconds: i64) -> Self {
		Self {
			backend,
			epoch_seconds,
		}
	}

	/// Generate the next id for `purpose_tag`.
	///
	/// Safe for unbounded concurrent callers: the only shared state is the
	/// store-side counter, which increments atomically.
	pub async fn next_id(&self, purpose_tag: &str) -> IdResult<u64> {
		let now = Utc::now();

		let timestamp = now.timestamp() - self.epoch_seconds;
		if timestamp < 0 {
			return Err(IdError::ClockBeforeEpoch);
		}

		// The counter key embeds the date, so each (tag, day) pair gets its
		// own sequence starting at 1.
		let date_key = format!("{}:{}", purpose_tag, now.format("%Y:%m:%d"));
		let sequence = self.backend.next(&date_key).await?;
		if sequence < 0 || sequence > u32::MAX as i64 {
			return Err(IdError::SequenceOverflow(purpose_tag.to_string()));
		}

		Ok(((timestamp as u64) << SEQUENCE_BITS) | sequence as u64)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::MemorySequenceBackend;
	use async_trait::async_trait;

	#[tokio::test]
	async fn ids_increase_within_a_day() {
		let ids = IdGenerator::new(Arc::new(MemorySequenceBackend::new()));

		let first = ids.next_id("order").await.unwrap();
		let second = ids.next_id("order").await.unwrap();
		assert!(first < second);
	}

	#[tokio::test]
	async fn sequence_occupies_low_bits() {
		let ids = IdGenerator::new(Arc::new(MemorySequenceBackend::new()));

		let id = ids.next_id("order").await.unwrap();
		assert_eq!(id & 0xFFFF_FFFF, 1);

		let id = ids.next_id("order").await.unwrap();
		assert_eq!(id & 0xFFFF_FFFF, 2);
	}

	#[tokio::test]
	async fn tags_use_independent_sequences() {
		let ids = IdGenerator::new(Arc::new(MemorySequenceBackend::new()));

		ids.next_id("order").await.unwrap();
		ids.next_id("order").await.unwrap();
		let other = ids.next_id("coupon").await.unwrap();
		assert_eq!(other & 0xFFFF_FFFF, 1);
	}

	#[tokio::test]
	async fn concurrent_generation_yields_unique_ids() {
		let ids = Arc::new(IdGenerator::new(Arc::new(MemorySequenceBackend::new())));

		let handles: Vec<_> = (0..100)
			.map(|_| {
				let ids = Arc::clone(&ids);
				tokio::spawn(async move { ids.next_id("order").await.unwrap() })
			})
			.collect();

		let mut seen = std::collections::HashSet::new();
		for handle in handles {
			assert!(seen.insert(handle.await.unwrap()));
		}
		assert_eq!(seen.len(), 100);
	}

	struct OverflowingBackend;

	#[async_trait]
	impl SequenceBackend for OverflowingBackend {
		async fn next(&self, _key: &str) -> IdResult<i64> {
			Ok(u32::MAX as i64 + 1)
		}
	}

	#[tokio::test]
	async fn overflow_is_a_typed_error() {
		let ids = IdGenerator::new(Arc::new(OverflowingBackend));

		let err = ids.next_id("order").await.unwrap_err();
		assert!(matches!(err, IdError::SequenceOverflow(tag) if tag == "order"));
	}

	#[tokio::test]
	async fn clock_before_epoch_is_a_typed_error() {
		// An epoch in the far future makes the current clock invalid.
		let ids = IdGenerator::with_epoch(Arc::new(MemorySequenceBackend::new()), i64::MAX);

		let err = ids.next_id("order").await.unwrap_err();
		assert!(matches!(err, IdError::ClockBeforeEpoch));
	}
}
