//! Bounded background rebuild pool.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

type RebuildJob = BoxFuture<'static, ()>;

/// Sizing for a [`RebuildPool`].
#[derive(Debug, Clone, Copy)]
pub struct RebuildPoolConfig {
	/// Concurrent rebuild tasks.
	pub workers: usize,
	/// Queued rebuilds accepted beyond the running ones.
	pub queue_depth: usize,
}

impl Default for RebuildPoolConfig {
	fn default() -> Self {
		Self {
			workers: 10,
			queue_depth: 64,
		}
	}
}

/// An explicitly constructed worker pool for cache rebuilds.
///
/// The logical-expiration strategy submits its rebuild tasks here instead
/// of spawning unbounded work; when the queue is full the submission is
/// refused and the caller keeps serving the stale value.
///
/// # Examples
///
/// ```rust
/// use locallife_cache::{RebuildPool, RebuildPoolConfig};
///
/// # async fn example() {
/// let pool = RebuildPool::new(RebuildPoolConfig::default());
/// pool.try_submit(async { /* rebuild one entry */ }).await;
/// pool.shutdown().await;
/// # }
/// ```
pub struct RebuildPool {
	tx: Mutex<Option<mpsc::Sender<RebuildJob>>>,
	workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RebuildPool {
	/// Start a pool with the given sizing.
	pub fn new(config: RebuildPoolConfig) -> Self {
		let (tx, rx) = mpsc::channel::<RebuildJob>(config.queue_depth.max(1));
		let rx = Arc::new(Mutex::new(rx));

		let workers = (0..config.workers.max(1))
			.map(|_| {
				let rx = Arc::clone(&rx);
				tokio::spawn(async move {
					loop {
						let job = {
							let mut rx = rx.lock().await;
							rx.recv().await
						};
						match job {
							Some(job) => job.await,
							None => break,
						}
					}
				})
			})
			.collect();

		Self {
			tx: Mutex::new(Some(tx)),
			workers: Mutex::new(workers),
		}
	}

	/// Submit a rebuild task.
	///
	/// Returns `false` when the queue is full or the pool has been shut
	/// down; the task is dropped and the submitter must clean up anything
	/// it was counting on the task to do (e.g. release a rebuild lock).
	pub async fn try_submit(&self, task: impl Future<Output = ()> + Send + 'static) -> bool {
		let tx = self.tx.lock().await;
		match tx.as_ref() {
			Some(tx) => tx.try_send(Box::pin(task)).is_ok(),
			None => false,
		}
	}

	/// Stop accepting tasks, run the queue dry and join the workers.
	pub async fn shutdown(&self) {
		let tx = self.tx.lock().await.take();
		drop(tx);

		let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
		for handle in handles {
			let _ = handle.await;
		}
	}
}
