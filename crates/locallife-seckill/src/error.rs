//! Error types for the seckill flow.

use locallife_ids::IdError;
use thiserror::Error;

/// Errors and rejections surfaced by the seckill flow.
///
/// The first two variants are expected business outcomes, not failures;
/// [`is_rejection`](SeckillError::is_rejection) separates them from store
/// trouble so callers can decide whether a retry makes sense.
#[derive(Debug, Error)]
pub enum SeckillError {
	/// Stock for the voucher is exhausted.
	#[error("stock exhausted")]
	InsufficientStock,

	/// The user already holds an order for this voucher.
	#[error("duplicate order")]
	DuplicateOrder,

	/// The shared store could not be reached or the admission script
	/// failed.
	#[error("store error: {0}")]
	Store(String),

	/// Order id generation failed.
	#[error("id generation error: {0}")]
	Id(#[from] IdError),

	/// A stream entry could not be decoded into an admission record.
	#[error("malformed stream entry {entry_id}: {reason}")]
	MalformedEntry {
		/// Stream entry id of the offending record.
		entry_id: String,
		/// What was missing or unparseable.
		reason: String,
	},

	/// Durable persistence failed; the entry stays unacknowledged for
	/// replay.
	#[error("persistence failure: {0}")]
	Persistence(#[from] OrderStoreError),
}

impl SeckillError {
	/// Whether this is an expected business rejection rather than a
	/// failure.
	pub fn is_rejection(&self) -> bool {
		matches!(
			self,
			SeckillError::InsufficientStock | SeckillError::DuplicateOrder
		)
	}
}

/// Errors from the durable order store.
#[derive(Debug, Error)]
pub enum OrderStoreError {
	/// The database could not be reached or rejected the statement.
	#[error("database error: {0}")]
	Database(String),

	/// The durable stock row was missing or already zero: persisted state
	/// diverged from admission state.
	#[error("durable stock exhausted for voucher {0}")]
	StockExhausted(u64),
}
