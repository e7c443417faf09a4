//! Logical-expiry payload wrapper.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A payload wrapped with an embedded logical expiry.
///
/// Used by the logical-expiration strategy: the store never evicts the
/// entry, and freshness is judged by comparing `expire_at` to the wall
/// clock at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiringValue<T> {
	pub data: T,
	pub expire_at: DateTime<Utc>,
}

impl<T> ExpiringValue<T> {
	/// Wrap `data` with an expiry `ttl` from now.
	pub fn new(data: T, ttl: Duration) -> Self {
		Self {
			data,
			expire_at: Utc::now() + ttl,
		}
	}

	/// Whether the embedded expiry has passed.
	pub fn is_expired(&self) -> bool {
		self.expire_at <= Utc::now()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(Duration::from_secs(60), false)]
	#[case(Duration::ZERO, true)]
	fn expiry_follows_embedded_timestamp(#[case] ttl: Duration, #[case] expired: bool) {
		let value = ExpiringValue::new(42u64, ttl);
		assert_eq!(value.is_expired(), expired);
	}

	#[test]
	fn round_trips_through_json() {
		let value = ExpiringValue::new("payload".to_string(), Duration::from_secs(60));
		let json = serde_json::to_string(&value).unwrap();
		let back: ExpiringValue<String> = serde_json::from_str(&json).unwrap();
		assert_eq!(back.data, "payload");
		assert_eq!(back.expire_at, value.expire_at);
	}
}
