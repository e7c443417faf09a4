//! Database-backed order persistence.

use crate::error::OrderStoreError;
use crate::order_store::OrderStore;
use crate::record::VoucherOrder;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tracing::debug;

/// [`OrderStore`] on a SQL database via `sqlx`.
///
/// The order row and the durable stock decrement are written in one local
/// transaction. Idempotency against redelivery comes from the primary key
/// on the order id: a duplicate insert aborts the transaction and reports
/// success, leaving the first persist untouched. Statements use `?`
/// placeholders, matching the SQLite and MySQL deployments the platform
/// runs on.
///
/// # Examples
///
/// ```no_run
/// use locallife_seckill::SqlxOrderStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqlxOrderStore::connect("mysql://localhost/locallife").await?;
/// store.ensure_schema().await?;
/// # Ok(())
/// # }
/// ```
pub struct SqlxOrderStore {
	pool: AnyPool,
}

impl SqlxOrderStore {
	/// Wrap an existing pool.
	pub fn new(pool: AnyPool) -> Self {
		Self { pool }
	}

	/// Connect to `database_url` with a default pool.
	pub async fn connect(database_url: &str) -> Result<Self, OrderStoreError> {
		sqlx::any::install_default_drivers();
		let pool = AnyPoolOptions::new()
			.max_connections(16)
			.connect(database_url)
			.await
			.map_err(Self::db_err)?;
		Ok(Self { pool })
	}

	/// Create the order and stock tables if they do not exist.
	pub async fn ensure_schema(&self) -> Result<(), OrderStoreError> {
		sqlx::query(
			"CREATE TABLE IF NOT EXISTS voucher_order (
				id BIGINT PRIMARY KEY,
				user_id BIGINT NOT NULL,
				voucher_id BIGINT NOT NULL,
				created_at VARCHAR(64) NOT NULL
			)",
		)
		.execute(&self.pool)
		.await
		.map_err(Self::db_err)?;

		// One order per user per campaign, enforced durably as well.
		sqlx::query(
			"CREATE UNIQUE INDEX IF NOT EXISTS idx_voucher_order_user
				ON voucher_order (user_id, voucher_id)",
		)
		.execute(&self.pool)
		.await
		.map_err(Self::db_err)?;

		sqlx::query(
			"CREATE TABLE IF NOT EXISTS seckill_voucher (
				voucher_id BIGINT PRIMARY KEY,
				stock BIGINT NOT NULL
			)",
		)
		.execute(&self.pool)
		.await
		.map_err(Self::db_err)?;

		Ok(())
	}

	/// Reset the durable stock row for a campaign.
	pub async fn seed_stock(&self, voucher_id: u64, stock: i64) -> Result<(), OrderStoreError> {
		let mut tx = self.pool.begin().await.map_err(Self::db_err)?;

		sqlx::query("DELETE FROM seckill_voucher WHERE voucher_id = ?")
			.bind(voucher_id as i64)
			.execute(&mut *tx)
			.await
			.map_err(Self::db_err)?;
		sqlx::query("INSERT INTO seckill_voucher (voucher_id, stock) VALUES (?, ?)")
			.bind(voucher_id as i64)
			.bind(stock)
			.execute(&mut *tx)
			.await
			.map_err(Self::db_err)?;

		tx.commit().await.map_err(Self::db_err)
	}

	fn db_err(e: sqlx::Error) -> OrderStoreError {
		OrderStoreError::Database(e.to_string())
	}
}

#[async_trait]
impl OrderStore for SqlxOrderStore {
	async fn persist(&self, order: &VoucherOrder) -> Result<(), OrderStoreError> {
		let mut tx = self.pool.begin().await.map_err(Self::db_err)?;

		let inserted = sqlx::query(
			"INSERT INTO voucher_order (id, user_id, voucher_id, created_at)
				VALUES (?, ?, ?, ?)",
		)
		.bind(order.id as i64)
		.bind(order.user_id as i64)
		.bind(order.voucher_id as i64)
		.bind(order.created_at.to_rfc3339())
		.execute(&mut *tx)
		.await;

		if let Err(e) = inserted {
			if let sqlx::Error::Database(db_err) = &e
				&& db_err.is_unique_violation()
			{
				// Redelivery: the first persist already committed.
				debug!(order_id = order.id, "order already persisted; skipping");
				return Ok(());
			}
			return Err(Self::db_err(e));
		}

		let updated = sqlx::query(
			"UPDATE seckill_voucher SET stock = stock - 1
				WHERE voucher_id = ? AND stock > 0",
		)
		.bind(order.voucher_id as i64)
		.execute(&mut *tx)
		.await
		.map_err(Self::db_err)?;

		if updated.rows_affected() == 0 {
			// Dropping the transaction rolls the insert back.
			return Err(OrderStoreError::StockExhausted(order.voucher_id));
		}

		tx.commit().await.map_err(Self::db_err)
	}

	async fn fetch_order(&self, order_id: u64) -> Result<Option<VoucherOrder>, OrderStoreError> {
		let row = sqlx::query(
			"SELECT id, user_id, voucher_id, created_at FROM voucher_order WHERE id = ?",
		)
		.bind(order_id as i64)
		.fetch_optional(&self.pool)
		.await
		.map_err(Self::db_err)?;

		let Some(row) = row else {
			return Ok(None);
		};

		let created_at: String = row.try_get("created_at").map_err(Self::db_err)?;
		let created_at: DateTime<Utc> = created_at
			.parse::<DateTime<chrono::FixedOffset>>()
			.map_err(|e| OrderStoreError::Database(format!("bad created_at: {}", e)))?
			.with_timezone(&Utc);

		Ok(Some(VoucherOrder {
			id: row.try_get::<i64, _>("id").map_err(Self::db_err)? as u64,
			user_id: row.try_get::<i64, _>("user_id").map_err(Self::db_err)? as u64,
			voucher_id: row.try_get::<i64, _>("voucher_id").map_err(Self::db_err)? as u64,
			created_at,
		}))
	}
}
