//! Background order persistence worker.

use crate::backend::SeckillBackend;
use crate::order_store::OrderStore;
use crate::record::{PendingOrder, VoucherOrder};
use crate::SeckillResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Tuning for one [`OrderWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
	/// Consumer name within the intake group. Each worker needs its own so
	/// pending entries can be replayed to the right one.
	pub consumer: String,
	/// Bounded wait per intake read; the shutdown signal is checked
	/// between reads.
	pub block: Duration,
	/// Entries claimed per read.
	pub batch: usize,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			consumer: "worker-1".to_string(),
			block: Duration::from_secs(2),
			batch: 1,
		}
	}
}

/// Consumes the intake stream and persists admitted orders.
///
/// Per entry: persist inside a local transaction, then acknowledge. A
/// persistence failure leaves the entry unacknowledged and triggers a
/// [`drain_pending`](OrderWorker::drain_pending) sweep, so an admitted
/// order is retried until it lands; the queue entry is only ever removed
/// after a successful persist.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use locallife_seckill::{MemoryOrderStore, MemorySeckillBackend, OrderWorker};
///
/// # async fn example() {
/// let backend = Arc::new(MemorySeckillBackend::new());
/// let store = Arc::new(MemoryOrderStore::new());
///
/// let handle = OrderWorker::new(backend, store).spawn();
/// // ... serve traffic ...
/// handle.stop().await;
/// # }
/// ```
pub struct OrderWorker {
	backend: Arc<dyn SeckillBackend>,
	store: Arc<dyn OrderStore>,
	config: WorkerConfig,
}

impl OrderWorker {
	/// Create a worker with the default [`WorkerConfig`].
	pub fn new(backend: Arc<dyn SeckillBackend>, store: Arc<dyn OrderStore>) -> Self {
		Self {
			backend,
			store,
			config: WorkerConfig::default(),
		}
	}

	/// Replace the worker configuration.
	pub fn with_config(mut self, config: WorkerConfig) -> Self {
		self.config = config;
		self
	}

	/// Start the worker loop on a new task.
	pub fn spawn(self) -> WorkerHandle {
		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
		let handle = tokio::spawn(self.run(shutdown_rx));
		WorkerHandle {
			shutdown_tx,
			handle,
		}
	}

	async fn run(self, mut shutdown: broadcast::Receiver<()>) {
		if let Err(e) = self.backend.ensure_group().await {
			error!(error = %e, "failed to ensure intake consumer group");
		}

		// Crash recovery: whatever this consumer read but never
		// acknowledged in a previous life gets persisted first.
		self.drain_pending().await;

		info!(consumer = %self.config.consumer, "order worker started");
		loop {
			tokio::select! {
				_ = shutdown.recv() => break,
				batch = self.backend.read_new(&self.config.consumer, self.config.batch, self.config.block) => {
					match batch {
						Ok(entries) => {
							for entry in entries {
								if let Err(e) = self.process(&entry).await {
									warn!(
										entry_id = %entry.entry_id,
										error = %e,
										"order persistence failed; replaying pending backlog"
									);
									self.drain_pending().await;
								}
							}
						}
						Err(e) => {
							error!(error = %e, "intake read failed");
							tokio::time::sleep(Duration::from_millis(500)).await;
						}
					}
				}
			}
		}
		info!(consumer = %self.config.consumer, "order worker stopped");
	}

	async fn process(&self, entry: &PendingOrder) -> SeckillResult<()> {
		let order = VoucherOrder::from_record(&entry.record);
		self.store.persist(&order).await?;
		self.backend.ack(&entry.entry_id).await?;
		debug!(order_id = order.id, entry_id = %entry.entry_id, "order persisted");
		Ok(())
	}

	/// Replay this consumer's unacknowledged backlog until it is empty.
	///
	/// Entries that still fail to persist are retried with a short pause;
	/// they are never acknowledged without a successful persist and never
	/// dropped. Also runnable as a standalone sweep.
	pub async fn drain_pending(&self) {
		loop {
			match self
				.backend
				.read_pending(&self.config.consumer, self.config.batch.max(1))
				.await
			{
				Ok(entries) if entries.is_empty() => break,
				Ok(entries) => {
					for entry in entries {
						if let Err(e) = self.process(&entry).await {
							warn!(
								entry_id = %entry.entry_id,
								error = %e,
								"pending entry still failing; will retry"
							);
							tokio::time::sleep(Duration::from_millis(100)).await;
						}
					}
				}
				Err(e) => {
					// The backlog is untouched; the next pass retries it.
					error!(error = %e, "pending read failed");
					break;
				}
			}
		}
	}
}

/// Handle to a spawned [`OrderWorker`].
pub struct WorkerHandle {
	shutdown_tx: broadcast::Sender<()>,
	handle: JoinHandle<()>,
}

impl WorkerHandle {
	/// Signal shutdown and wait for the worker to finish its current read.
	///
	/// A worker wedged against a persistently failing store is aborted
	/// after a bounded wait rather than hanging the caller.
	pub async fn stop(self) {
		let _ = self.shutdown_tx.send(());
		let mut handle = self.handle;
		if tokio::time::timeout(Duration::from_secs(5), &mut handle)
			.await
			.is_err()
		{
			warn!("order worker did not stop in time; aborting");
			handle.abort();
		}
	}

	/// Whether the worker task has exited.
	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}
