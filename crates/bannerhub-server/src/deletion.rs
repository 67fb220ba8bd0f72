//! Asynchronous batched banner deletion.
//!
//! Request tasks hand ids to a [`DeletionBatcher`]; a single
//! [`DeletionWorker`] owns the accumulation buffer and flushes it to the
//! store with one `bulk_delete` per timer tick, plus a final flush on
//! shutdown.
//!
//! ## Lifecycle
//!
//! ```text
//! Running ──stop()──► Draining ──final flush──► Stopped
//! ```
//!
//! A failed flush keeps the buffer for the next tick, so an id may be
//! submitted to the store more than once. Ids still buffered when the final
//! flush fails are lost.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use bannerhub_storage::{BannerId, DynBannerStore};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::DeletionConfig;
use crate::error::{ServiceError, ServiceResult};

struct Shared {
    tx: mpsc::Sender<BannerId>,
    shutdown: watch::Sender<bool>,
    stopped: watch::Receiver<bool>,
    shutdown_timeout: Duration,
}

/// Producer handle for the deletion worker. Cheap to clone.
#[derive(Clone)]
pub struct DeletionBatcher {
    shared: Arc<Shared>,
}

/// Consumer side of the batcher. Run it with [`DeletionWorker::run`].
pub struct DeletionWorker {
    rx: mpsc::Receiver<BannerId>,
    store: DynBannerStore,
    buffer: Vec<BannerId>,
    flush_interval: Duration,
    shutdown: watch::Receiver<bool>,
    stopped: watch::Sender<bool>,
}

/// Marks the batcher stopped when the worker exits, including by panic.
struct StoppedGuard(watch::Sender<bool>);

impl Drop for StoppedGuard {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

impl DeletionBatcher {
    /// Creates the handle and its worker without starting the worker.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the buffer length or either interval is zero.
    pub fn new(
        store: DynBannerStore,
        config: &DeletionConfig,
    ) -> ServiceResult<(Self, DeletionWorker)> {
        config.validate().map_err(ServiceError::InvalidConfig)?;

        let (tx, rx) = mpsc::channel(config.buffer_length);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let batcher = Self {
            shared: Arc::new(Shared {
                tx,
                shutdown: shutdown_tx,
                stopped: stopped_rx,
                shutdown_timeout: config.shutdown_timeout(),
            }),
        };
        let worker = DeletionWorker {
            rx,
            store,
            buffer: Vec::with_capacity(config.buffer_length),
            flush_interval: config.flush_interval(),
            shutdown: shutdown_rx,
            stopped: stopped_tx,
        };
        Ok((batcher, worker))
    }

    /// Creates the batcher and spawns its worker on the current runtime.
    pub fn spawn(store: DynBannerStore, config: &DeletionConfig) -> ServiceResult<Self> {
        let (batcher, worker) = Self::new(store, config)?;
        tokio::spawn(worker.run());
        Ok(batcher)
    }

    /// Queues a banner id for deletion.
    ///
    /// Waits for queue space when the queue is full; ids are never dropped.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` if `id` is not positive
    /// - `ShuttingDown` once [`stop`](Self::stop) has been called
    pub async fn enqueue(&self, id: BannerId) -> ServiceResult<()> {
        if id <= 0 {
            return Err(ServiceError::out_of_range("id"));
        }
        if self.is_stopping() {
            return Err(ServiceError::ShuttingDown);
        }
        self.shared
            .tx
            .send(id)
            .await
            .map_err(|_| ServiceError::ShuttingDown)
    }

    /// Stops the worker and waits for it to drain.
    ///
    /// Safe to call from several tasks; only the first call triggers the
    /// shutdown and every caller waits for the same stopped state.
    ///
    /// # Errors
    ///
    /// Returns `ShutdownTimeout` if the worker has not stopped within the
    /// configured timeout. The worker keeps running in that case.
    pub async fn stop(&self) -> ServiceResult<()> {
        let triggered = self.shared.shutdown.send_if_modified(|stopping| {
            if *stopping {
                false
            } else {
                *stopping = true;
                true
            }
        });
        if triggered {
            tracing::info!("Deletion batcher shutting down");
        }

        let timeout = self.shared.shutdown_timeout;
        let mut stopped = self.shared.stopped.clone();
        let wait = stopped.wait_for(|s| *s).map(|res| res.is_ok());
        match tokio::time::timeout(timeout, wait).await {
            // `false` means the worker was dropped without running.
            Ok(_) => Ok(()),
            Err(_) => {
                tracing::error!(?timeout, "Deletion batcher did not stop in time");
                Err(ServiceError::ShutdownTimeout(timeout))
            }
        }
    }

    /// Whether `stop` has been called.
    pub fn is_stopping(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// Whether the worker has exited.
    pub fn is_stopped(&self) -> bool {
        *self.shared.stopped.borrow()
    }
}

impl DeletionWorker {
    /// Runs until shutdown is requested or every handle is dropped.
    pub async fn run(self) {
        let DeletionWorker {
            mut rx,
            store,
            mut buffer,
            flush_interval,
            mut shutdown,
            stopped,
        } = self;
        let _guard = StoppedGuard(stopped);

        let mut ticker = tokio::time::interval_at(Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(?flush_interval, "Deletion batcher started");

        loop {
            tokio::select! {
                biased;

                // Also resolves once every handle is dropped.
                _ = shutdown.wait_for(|stopping| *stopping).map(|res| res.is_ok()) => break,
                _ = ticker.tick() => {
                    flush(&store, &mut buffer).await;
                }
                received = rx.recv() => match received {
                    Some(id) => buffer.push(id),
                    None => break,
                },
            }
        }

        rx.close();
        while let Some(id) = rx.recv().await {
            buffer.push(id);
        }

        if !flush(&store, &mut buffer).await {
            tracing::error!(
                count = buffer.len(),
                ids = ?buffer,
                "Final deletion flush failed; ids were not deleted"
            );
        }
        tracing::info!("Deletion batcher stopped");
    }
}

/// Deletes the buffered ids in one store call.
///
/// Returns `true` when the buffer is empty afterwards. A failed or panicking
/// store call leaves the buffer untouched.
async fn flush(store: &DynBannerStore, buffer: &mut Vec<BannerId>) -> bool {
    if buffer.is_empty() {
        return true;
    }

    let result = AssertUnwindSafe(store.bulk_delete(buffer.as_slice()))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok(())) => {
            tracing::info!(count = buffer.len(), "Flushed banner deletions");
            buffer.clear();
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(
                count = buffer.len(),
                category = %e.category(),
                error = %e,
                "Banner deletion flush failed, will retry"
            );
            false
        }
        Err(_) => {
            tracing::error!(count = buffer.len(), "Banner deletion flush panicked, will retry");
            false
        }
    }
}
