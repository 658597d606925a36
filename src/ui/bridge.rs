// EventLoopBridge - Coordinates between the worker runtime and the UI loop
//
// The UI loop is a single-threaded cooperative executor (a tokio LocalSet).
// Only tasks on that loop touch the view. Work that blocks runs on the worker
// runtime; a loop task awaiting it suspends and resumes on the loop.
//
// The bridge provides:
// - Safe view updates from any thread via a bounded channel drained on the loop
// - Spawning view-bound tasks on the loop
// - Closing the view: aborting its tasks and dropping it, so late results are discarded

use crate::metrics::Metrics;
use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle, LocalSet};

type ViewUpdate<V> = Box<dyn FnOnce(&mut V) + Send>;

/// Owns the UI loop and the view living on it
///
/// This bridge enables:
/// - View updates from worker threads (via [`EventLoopBridgeHandle::update_ui`])
/// - Spawning loop tasks that hold a [`ViewRef`] (via [`spawn_local`](Self::spawn_local))
/// - Tearing the view down while fetches are still in flight (via [`close_view`](Self::close_view))
///
/// # Example
/// ```ignore
/// let ui_runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
/// let bridge = EventLoopBridge::new(ConsoleView::new(true));
///
/// bridge.spawn_local(move |view| async move {
///     let clients = fetcher.get(&data_bridge).await;
///     view.with(|v| v.show_clients(&clients));
/// });
///
/// bridge.block_on(&ui_runtime, shutdown_signal());
/// ```
pub struct EventLoopBridge<V: 'static> {
    /// The view; `None` once closed
    view: Rc<RefCell<Option<V>>>,

    /// Executor for loop tasks
    local: LocalSet,

    /// Abort handles of view-bound tasks
    tasks: RefCell<Vec<AbortHandle>>,

    /// Channel for sending view updates from other threads to the loop
    /// Bounded to 100 updates to prevent unbounded memory growth if the loop lags
    ui_update_tx: mpsc::Sender<ViewUpdate<V>>,

    metrics: Option<Arc<Metrics>>,
}

impl<V: 'static> EventLoopBridge<V> {
    /// Create a new EventLoopBridge owning `view`
    ///
    /// This queues a loop task that drains update requests and applies them
    /// to the view. Nothing runs until the loop is driven with
    /// [`block_on`](Self::block_on) or [`run_until`](Self::run_until).
    pub fn new(view: V) -> Self {
        Self::build(view, None)
    }

    pub fn with_metrics(view: V, metrics: Arc<Metrics>) -> Self {
        Self::build(view, Some(metrics))
    }

    fn build(view: V, metrics: Option<Arc<Metrics>>) -> Self {
        let view = Rc::new(RefCell::new(Some(view)));
        // Use bounded channel with capacity 100 to prevent OOM if the loop lags
        let (ui_update_tx, mut ui_update_rx) = mpsc::channel::<ViewUpdate<V>>(100);

        let local = LocalSet::new();
        let view_for_updates = Rc::downgrade(&view);
        local.spawn_local(async move {
            tracing::debug!("EventLoopBridge update task started");

            while let Some(update) = ui_update_rx.recv().await {
                let Some(view) = view_for_updates.upgrade() else {
                    break;
                };
                match view.borrow_mut().as_mut() {
                    Some(view) => update(view),
                    None => tracing::debug!("View closed, dropping update"),
                }
            }

            tracing::debug!("EventLoopBridge update task terminated");
        });

        Self {
            view,
            local,
            tasks: RefCell::new(Vec::new()),
            ui_update_tx,
            metrics,
        }
    }

    /// Schedule a view update from the loop itself
    ///
    /// See [`EventLoopBridgeHandle::update_ui`] for details.
    pub fn update_ui<F>(&self, update: F)
    where
        F: FnOnce(&mut V) + Send + 'static,
    {
        send_update(&self.ui_update_tx, self.metrics.as_deref(), Box::new(update));
    }

    /// Spawn a view-bound task on the loop
    ///
    /// The task receives a [`ViewRef`]. It is aborted by
    /// [`close_view`](Self::close_view) at its next suspension point.
    pub fn spawn_local<F, Fut>(&self, task: F) -> JoinHandle<Fut::Output>
    where
        F: FnOnce(ViewRef<V>) -> Fut,
        Fut: Future + 'static,
        Fut::Output: 'static,
    {
        let handle = self.local.spawn_local(task(self.view_ref()));

        let mut tasks = self.tasks.borrow_mut();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle.abort_handle());

        handle
    }

    /// Get a lightweight, cloneable handle for other threads
    pub fn handle(&self) -> EventLoopBridgeHandle<V> {
        EventLoopBridgeHandle {
            ui_update_tx: self.ui_update_tx.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn view_ref(&self) -> ViewRef<V> {
        ViewRef {
            view: Rc::downgrade(&self.view),
        }
    }

    pub fn is_view_open(&self) -> bool {
        self.view.borrow().is_some()
    }

    /// Abort the view's tasks and drop the view
    ///
    /// Work already running on a worker finishes there; its result reaches a
    /// [`ViewRef`] that no longer resolves and is discarded.
    pub fn close_view(&self) -> Option<V> {
        let aborted = {
            let mut tasks = self.tasks.borrow_mut();
            let count = tasks.iter().filter(|t| !t.is_finished()).count();
            for task in tasks.drain(..) {
                task.abort();
            }
            count
        };

        let view = self.view.borrow_mut().take();
        if view.is_some() {
            tracing::info!("View closed ({} running tasks aborted)", aborted);
        }
        view
    }

    /// Drive the loop on `runtime` until `future` completes
    pub fn block_on<F: Future>(&self, runtime: &Runtime, future: F) -> F::Output {
        self.local.block_on(runtime, future)
    }

    /// Drive the loop from within an existing current-thread runtime
    pub async fn run_until<F: Future>(&self, future: F) -> F::Output {
        self.local.run_until(future).await
    }
}

/// Access to the view from a loop task
///
/// Resolves only while the view is open.
pub struct ViewRef<V> {
    view: Weak<RefCell<Option<V>>>,
}

// Manual Clone implementation to avoid requiring V: Clone
impl<V> Clone for ViewRef<V> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.clone(),
        }
    }
}

impl<V> ViewRef<V> {
    /// Run `f` against the view, or return `None` if it was closed
    ///
    /// Must not be called re-entrantly from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let view = self.view.upgrade()?;
        let mut slot = view.borrow_mut();
        slot.as_mut().map(f)
    }

    pub fn is_open(&self) -> bool {
        self.view
            .upgrade()
            .is_some_and(|view| view.borrow().is_some())
    }
}

/// Lightweight handle that can be cloned and sent to other threads
///
/// This is the `Send` side of the bridge: worker threads and tasks on the
/// worker runtime use it to push view updates onto the loop.
pub struct EventLoopBridgeHandle<V> {
    ui_update_tx: mpsc::Sender<ViewUpdate<V>>,
    metrics: Option<Arc<Metrics>>,
}

// Manual Clone implementation to avoid requiring V: Clone
impl<V> Clone for EventLoopBridgeHandle<V> {
    fn clone(&self) -> Self {
        Self {
            ui_update_tx: self.ui_update_tx.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<V: 'static> EventLoopBridgeHandle<V> {
    /// Schedule a view update from any thread
    ///
    /// The update is queued and runs on the loop's next turn. When the
    /// channel is full the update is dropped with a warning.
    ///
    /// # Example
    /// ```ignore
    /// handle.update_ui(move |view| view.show_status(&status));
    /// ```
    pub fn update_ui<F>(&self, update: F)
    where
        F: FnOnce(&mut V) + Send + 'static,
    {
        send_update(&self.ui_update_tx, self.metrics.as_deref(), Box::new(update));
    }
}

fn send_update<V>(tx: &mpsc::Sender<ViewUpdate<V>>, metrics: Option<&Metrics>, update: ViewUpdate<V>) {
    match tx.try_send(update) {
        Ok(_) => {
            if let Some(metrics) = metrics {
                metrics.record_ui_update();
            }
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("UI update channel full - skipping update to prevent backpressure");
            if let Some(metrics) = metrics {
                metrics.record_ui_channel_full();
            }
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::warn!("Failed to send UI update - event loop has stopped");
        }
    }
}
