use crate::error::CallError;
use crate::metrics::Metrics;
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, TryAcquireError};

/// Runs blocking calls on the worker runtime's blocking pool.
///
/// At most `max_concurrent` calls execute at once. Further callers wait in a
/// FIFO queue (the semaphore's) of at most `max_queue_depth` entries; a call
/// arriving at a full queue fails with [`CallError::QueueOverflow`].
///
/// The caller's task suspends while the call runs and resumes on whatever
/// executor it was polled from, so a task on the UI loop comes back to the
/// UI loop. Cloning yields a handle to the same pool.
#[derive(Clone)]
pub struct WorkerDispatch {
    handle: Handle,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    max_queue_depth: usize,
    queued: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
    metrics: Option<Arc<Metrics>>,
}

/// Holds one queue slot; released on drop, including when the waiting caller is cancelled
struct QueueSlot(Arc<AtomicUsize>);

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts a call as running for as long as the worker closure is alive
struct RunningSlot(Arc<AtomicUsize>);

impl Drop for RunningSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerDispatch {
    /// Create a dispatcher on `handle`'s blocking pool.
    ///
    /// `max_concurrent` is clamped to at least 1.
    pub fn new(handle: Handle, max_concurrent: usize, max_queue_depth: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            max_queue_depth,
            queued: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Calls currently executing on a worker
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Callers currently waiting for a worker
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Run `f` on a worker and wait for its return value.
    ///
    /// # Errors
    /// - [`CallError::QueueOverflow`] if every worker is busy and the queue is full
    /// - [`CallError::Cancelled`] if the dispatcher was closed while waiting
    /// - [`CallError::WorkerPanicked`] if `f` panicked
    ///
    /// Dropping the returned future while queued gives the queue slot back.
    /// Dropping it while `f` runs detaches: `f` finishes on its worker, its
    /// result is discarded and the worker slot is freed afterwards.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T, CallError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(CallError::Cancelled),
            Err(TryAcquireError::NoPermits) => {
                let depth = self.queued.fetch_add(1, Ordering::SeqCst);
                let _slot = QueueSlot(Arc::clone(&self.queued));

                if depth >= self.max_queue_depth {
                    tracing::warn!(
                        "Worker queue full ({} waiting, limit {}), rejecting call",
                        depth,
                        self.max_queue_depth
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_queue_overflow();
                    }
                    return Err(CallError::QueueOverflow { depth });
                }

                tracing::debug!("All {} workers busy, queueing call ({} ahead)", self.max_concurrent, depth);
                Arc::clone(&self.permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| CallError::Cancelled)?
            }
        };

        self.running.fetch_add(1, Ordering::SeqCst);
        let running = RunningSlot(Arc::clone(&self.running));

        let join = self.handle.spawn_blocking(move || {
            let _permit = permit;
            let _running = running;
            f()
        });

        match join.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                tracing::error!("Worker panicked: {}", message);
                Err(CallError::WorkerPanicked(message))
            }
            Err(_) => Err(CallError::Cancelled),
        }
    }

    /// Stop accepting calls. Queued callers fail with [`CallError::Cancelled`];
    /// running calls finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
