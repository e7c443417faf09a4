//! Redis-backed seckill store: admission script plus intake stream.

use crate::record::{AdmissionOutcome, OrderAdmissionRecord, PendingOrder};
use crate::{SeckillError, SeckillResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

/// Lua script for atomic admission.
///
/// Checks stock and the per-voucher admitted-user set, then decrements,
/// admits and appends the order intent to the intake stream in one atomic
/// unit, so no interleaving of concurrent attempts can oversell or admit
/// a user twice.
///
/// KEYS[1] - stock counter key
/// KEYS[2] - admitted-user set key
/// KEYS[3] - intake stream key
/// ARGV[1] - voucher id
/// ARGV[2] - user id
/// ARGV[3] - order id
///
/// Returns 0 on admission, 1 on insufficient stock, 2 on duplicate order.
const ADMISSION_SCRIPT: &str = r#"
local stock = tonumber(redis.call('GET', KEYS[1]))
if stock == nil or stock <= 0 then
	return 1
end
if redis.call('SISMEMBER', KEYS[2], ARGV[2]) == 1 then
	return 2
end
redis.call('INCRBY', KEYS[1], -1)
redis.call('SADD', KEYS[2], ARGV[2])
redis.call('XADD', KEYS[3], '*', 'order_id', ARGV[3], 'user_id', ARGV[2], 'voucher_id', ARGV[1])
return 0
"#;

/// Redis-based implementation of [`SeckillBackend`](crate::SeckillBackend).
///
/// # Examples
///
/// ```no_run
/// use locallife_seckill::RedisSeckillBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = RedisSeckillBackend::new("redis://127.0.0.1/").await?;
/// # Ok(())
/// # }
/// ```
pub struct RedisSeckillBackend {
	connection: Arc<ConnectionManager>,
	stream_key: String,
	group: String,
	stock_prefix: String,
	admitted_prefix: String,
}

impl RedisSeckillBackend {
	/// Create a backend with the default key layout
	/// (`seckill:orders` stream, `orders` group, `seckill:stock:` /
	/// `seckill:admitted:` prefixes).
	pub async fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(redis_url)?;
		let connection = ConnectionManager::new(client).await?;

		Ok(Self {
			connection: Arc::new(connection),
			stream_key: "seckill:orders".to_string(),
			group: "orders".to_string(),
			stock_prefix: "seckill:stock:".to_string(),
			admitted_prefix: "seckill:admitted:".to_string(),
		})
	}

	/// Override the intake stream key and consumer group name.
	pub fn with_stream(mut self, stream_key: impl Into<String>, group: impl Into<String>) -> Self {
		self.stream_key = stream_key.into();
		self.group = group.into();
		self
	}

	fn stock_key(&self, voucher_id: u64) -> String {
		format!("{}{}", self.stock_prefix, voucher_id)
	}

	fn admitted_key(&self, voucher_id: u64) -> String {
		format!("{}{}", self.admitted_prefix, voucher_id)
	}

	fn store_err(context: &str, e: redis::RedisError) -> SeckillError {
		SeckillError::Store(format!("{}: {}", context, e))
	}

	fn parse_entry(id: &redis::streams::StreamId) -> SeckillResult<PendingOrder> {
		let field = |name: &str| -> SeckillResult<u64> {
			id.get::<u64>(name).ok_or_else(|| SeckillError::MalformedEntry {
				entry_id: id.id.clone(),
				reason: format!("missing or non-numeric field '{}'", name),
			})
		};

		Ok(PendingOrder {
			entry_id: id.id.clone(),
			record: OrderAdmissionRecord {
				order_id: field("order_id")?,
				user_id: field("user_id")?,
				voucher_id: field("voucher_id")?,
			},
		})
	}

	fn collect_entries(reply: StreamReadReply) -> SeckillResult<Vec<PendingOrder>> {
		let mut entries = Vec::new();
		for key in reply.keys {
			for id in &key.ids {
				entries.push(Self::parse_entry(id)?);
			}
		}
		Ok(entries)
	}
}

#[async_trait]
impl crate::backend::SeckillBackend for RedisSeckillBackend {
	async fn seed_stock(&self, voucher_id: u64, stock: i64) -> SeckillResult<()> {
		let mut conn = (*self.connection).clone();
		let _: () = conn
			.set(self.stock_key(voucher_id), stock)
			.await
			.map_err(|e| Self::store_err("failed to seed stock", e))?;
		Ok(())
	}

	async fn reserve(&self, record: &OrderAdmissionRecord) -> SeckillResult<AdmissionOutcome> {
		let mut conn = (*self.connection).clone();

		let script = redis::Script::new(ADMISSION_SCRIPT);
		let code: i64 = script
			.key(self.stock_key(record.voucher_id))
			.key(self.admitted_key(record.voucher_id))
			.key(&self.stream_key)
			.arg(record.voucher_id)
			.arg(record.user_id)
			.arg(record.order_id)
			.invoke_async(&mut conn)
			.await
			.map_err(|e| Self::store_err("admission script failed", e))?;

		match code {
			0 => Ok(AdmissionOutcome::Admitted),
			1 => Ok(AdmissionOutcome::InsufficientStock),
			2 => Ok(AdmissionOutcome::DuplicateOrder),
			other => Err(SeckillError::Store(format!(
				"admission script returned unknown code {}",
				other
			))),
		}
	}

	async fn ensure_group(&self) -> SeckillResult<()> {
		let mut conn = (*self.connection).clone();

		let created: Result<String, redis::RedisError> = conn
			.xgroup_create_mkstream(&self.stream_key, &self.group, "$")
			.await;

		match created {
			Ok(_) => Ok(()),
			// The group surviving a restart is the normal case.
			Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
			Err(e) => Err(Self::store_err("failed to create consumer group", e)),
		}
	}

	async fn read_new(
		&self,
		consumer: &str,
		count: usize,
		block: Duration,
	) -> SeckillResult<Vec<PendingOrder>> {
		let mut conn = (*self.connection).clone();

		let options = StreamReadOptions::default()
			.group(&self.group, consumer)
			.count(count)
			.block(block.as_millis() as usize);

		let reply: StreamReadReply = conn
			.xread_options(&[&self.stream_key], &[">"], &options)
			.await
			.map_err(|e| Self::store_err("group read failed", e))?;

		Self::collect_entries(reply)
	}

	async fn read_pending(&self, consumer: &str, count: usize) -> SeckillResult<Vec<PendingOrder>> {
		let mut conn = (*self.connection).clone();

		// Reading from id 0 re-delivers this consumer's unacknowledged
		// entries from the start of the log.
		let options = StreamReadOptions::default()
			.group(&self.group, consumer)
			.count(count);

		let reply: StreamReadReply = conn
			.xread_options(&[&self.stream_key], &["0"], &options)
			.await
			.map_err(|e| Self::store_err("pending read failed", e))?;

		Self::collect_entries(reply)
	}

	async fn ack(&self, entry_id: &str) -> SeckillResult<()> {
		let mut conn = (*self.connection).clone();

		let _: i64 = conn
			.xack(&self.stream_key, &self.group, &[entry_id])
			.await
			.map_err(|e| Self::store_err("ack failed", e))?;
		Ok(())
	}
}
