//! Order records and admission outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one run of the atomic admission script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
	/// Stock reserved, user admitted, intent enqueued.
	Admitted,
	/// Stock counter was zero (or the campaign was never seeded).
	InsufficientStock,
	/// The user is already in the per-voucher admitted set.
	DuplicateOrder,
}

/// The order intent appended to the intake stream on admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAdmissionRecord {
	pub order_id: u64,
	pub user_id: u64,
	pub voucher_id: u64,
}

/// A stream entry delivered to a consumer but not yet acknowledged.
#[derive(Debug, Clone)]
pub struct PendingOrder {
	/// Stream entry id, used for acknowledgment.
	pub entry_id: String,
	pub record: OrderAdmissionRecord,
}

/// The persisted order row: the permanent record of one admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherOrder {
	pub id: u64,
	pub user_id: u64,
	pub voucher_id: u64,
	pub created_at: DateTime<Utc>,
}

impl VoucherOrder {
	/// Build the durable row for an admitted intent, stamped now.
	pub fn from_record(record: &OrderAdmissionRecord) -> Self {
		Self {
			id: record.order_id,
			user_id: record.user_id,
			voucher_id: record.voucher_id,
			created_at: Utc::now(),
		}
	}
}
