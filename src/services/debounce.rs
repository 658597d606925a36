// Per-key debouncing and in-flight coalescing
//
// Each key owns a DebounceWindow holding the time of the last executed run,
// the run currently in flight (a Shared future every waiter polls) and the
// last completed result. Windows are created lazily and live as long as the
// Debouncer that owns them.

use crate::metrics::Metrics;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{Duration, Instant};

type SharedRun<T> = Shared<BoxFuture<'static, Arc<T>>>;

struct InFlight {
    generation: u64,
    /// `SharedRun<T>` for the key's value type
    run: Box<dyn Any + Send>,
    waiters: usize,
    /// Window start before this run claimed it, restored if the run is abandoned
    previous_invocation: Option<Instant>,
}

#[derive(Default)]
struct DebounceWindow {
    last_invocation: Option<Instant>,
    in_flight: Option<InFlight>,
    last_result: Option<Arc<dyn Any + Send + Sync>>,
}

#[derive(Default)]
struct WindowTable {
    windows: HashMap<String, DebounceWindow>,
    next_generation: u64,
}

/// How a debounced call was answered
#[derive(Debug, Clone, PartialEq)]
pub enum Debounced<T> {
    /// The operation ran for this call
    Executed(T),
    /// Attached to a run already in flight
    Joined(T),
    /// Inside the window, answered with the previous result
    Reused(T),
    /// Inside the window with nothing to reuse yet
    Suppressed,
}

impl<T> Debounced<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Debounced::Executed(v) | Debounced::Joined(v) | Debounced::Reused(v) => Some(v),
            Debounced::Suppressed => None,
        }
    }

    pub fn was_executed(&self) -> bool {
        matches!(self, Debounced::Executed(_))
    }
}

/// Answer for a call that lands inside a debounce window
enum InsideWindow<T> {
    Reuse(Arc<T>),
    Suppress,
}

enum Plan<T, F, S> {
    Start(SharedRun<T>, WaiterGuard),
    Join(SharedRun<T>, WaiterGuard),
    /// Answered without running; `S` is uninhabited for plain coalescing
    Settled(S),
    /// Key already holds a different value type
    Untracked(F),
}

/// Held by every caller awaiting a run. When the last one goes away before
/// the run finishes, the run is dropped and the key is free again.
struct WaiterGuard {
    table: Arc<Mutex<WindowTable>>,
    key: String,
    generation: u64,
}

impl WaiterGuard {
    /// Give up this waiter's claim; returns the run if nobody else is waiting
    fn release(&self) -> Option<InFlight> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let window = table.windows.get_mut(&self.key)?;

        let in_flight = window
            .in_flight
            .as_mut()
            .filter(|in_flight| in_flight.generation == self.generation)?;
        in_flight.waiters = in_flight.waiters.saturating_sub(1);
        if in_flight.waiters > 0 {
            return None;
        }

        let abandoned = window.in_flight.take()?;
        window.last_invocation = abandoned.previous_invocation;
        Some(abandoned)
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if let Some(abandoned) = self.release() {
            tracing::debug!("All waiters for '{}' dropped, cancelling run", self.key);
            // The run may own guards of nested runs on this table, so it is
            // dropped only after the lock is released
            drop(abandoned);
        }
    }
}

/// Debounce and coalesce table, one per controller or view.
///
/// - [`coalesce`](Self::coalesce): at most one execution per key at a time;
///   concurrent callers share the run and receive the same `Arc`.
/// - [`debounce`](Self::debounce): calls less than `window` after the last
///   executed call do not execute; they join the in-flight run or reuse the
///   last result.
///
/// A run whose callers are all dropped is cancelled and leaves the key as it
/// was before the run started.
///
/// Cloning shares the table.
#[derive(Clone, Default)]
pub struct Debouncer {
    table: Arc<Mutex<WindowTable>>,
    metrics: Option<Arc<Metrics>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn lock(&self) -> MutexGuard<'_, WindowTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` unless a run for `key` is already in flight, in which case
    /// wait for that one. All concurrent callers get the identical `Arc`.
    pub async fn coalesce<T, F, Fut>(&self, key: &str, op: F) -> Arc<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        match self.plan(key, op, |_, _| None::<Infallible>) {
            Plan::Start(run, guard) => {
                let _guard = guard;
                run.await
            }
            Plan::Join(run, guard) => {
                let _guard = guard;
                self.count_saved_call(false);
                run.await
            }
            Plan::Settled(never) => match never {},
            Plan::Untracked(op) => Arc::new(op().await),
        }
    }

    /// Run `op` at most once per `window` for `key`.
    ///
    /// A call at or after `window` since the last executed call runs `op`.
    /// A call inside the window joins the in-flight run if there is one,
    /// otherwise reuses the last result, otherwise is suppressed.
    pub async fn debounce<T, F, Fut>(&self, key: &str, window: Duration, op: F) -> Debounced<Arc<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let plan = self.plan(key, op, |entry, now| {
            if entry
                .last_invocation
                .is_some_and(|last| now.duration_since(last) < window)
            {
                return Some(match entry.last_result.clone().map(|r| r.downcast::<T>()) {
                    Some(Ok(value)) => InsideWindow::Reuse(value),
                    _ => InsideWindow::Suppress,
                });
            }
            entry.last_invocation = Some(now);
            None
        });

        match plan {
            Plan::Start(run, guard) => {
                let _guard = guard;
                Debounced::Executed(run.await)
            }
            Plan::Join(run, guard) => {
                let _guard = guard;
                self.count_saved_call(true);
                Debounced::Joined(run.await)
            }
            Plan::Settled(InsideWindow::Reuse(value)) => {
                self.count_saved_call(true);
                Debounced::Reused(value)
            }
            Plan::Settled(InsideWindow::Suppress) => {
                self.count_saved_call(true);
                Debounced::Suppressed
            }
            Plan::Untracked(op) => Debounced::Executed(Arc::new(op().await)),
        }
    }

    /// Wrap `op` into a cloneable operation whose calls are coalesced on `key`.
    pub fn coalesced<T, F, Fut>(
        &self,
        key: impl Into<String>,
        op: F,
    ) -> impl Fn() -> BoxFuture<'static, Arc<T>> + Clone + Send + Sync + 'static
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let debouncer = self.clone();
        let key = key.into();
        move || {
            let debouncer = debouncer.clone();
            let key = key.clone();
            let op = op.clone();
            async move { debouncer.coalesce(&key, op).await }.boxed()
        }
    }

    /// Wrap `op` into a cloneable operation whose calls are debounced on `key`.
    pub fn debounced<T, F, Fut>(
        &self,
        key: impl Into<String>,
        window: Duration,
        op: F,
    ) -> impl Fn() -> BoxFuture<'static, Debounced<Arc<T>>> + Clone + Send + Sync + 'static
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let debouncer = self.clone();
        let key = key.into();
        move || {
            let debouncer = debouncer.clone();
            let key = key.clone();
            let op = op.clone();
            async move { debouncer.debounce(&key, window, op).await }.boxed()
        }
    }

    /// Whether a run for `key` is currently in flight
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.lock()
            .windows
            .get(key)
            .is_some_and(|w| w.in_flight.is_some())
    }

    /// Forget everything about `key`. Waiters of an in-flight run still get
    /// its value; the result is not kept.
    pub fn clear(&self, key: &str) {
        let removed = self.lock().windows.remove(key);
        drop(removed);
    }

    /// Forget every key
    pub fn reset(&self) {
        let windows = std::mem::take(&mut self.lock().windows);
        tracing::debug!("Resetting {} debounce windows", windows.len());
        drop(windows);
    }

    /// Decide how a call on `key` is answered.
    ///
    /// `inside_window` runs under the table lock when nothing is in flight;
    /// returning `Some` answers the call without running `op`, returning
    /// `None` lets the call start a run.
    fn plan<T, F, Fut, S>(
        &self,
        key: &str,
        op: F,
        inside_window: impl FnOnce(&mut DebounceWindow, Instant) -> Option<S>,
    ) -> Plan<T, F, S>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let now = Instant::now();
        let mut guard = self.lock();
        let table = &mut *guard;
        let entry = table.windows.entry(key.to_string()).or_default();

        if let Some(in_flight) = entry.in_flight.as_mut() {
            let Some(run) = in_flight.run.downcast_ref::<SharedRun<T>>() else {
                tracing::warn!("Key '{}' is in use with a different value type, running untracked", key);
                return Plan::Untracked(op);
            };
            in_flight.waiters += 1;
            return Plan::Join(
                run.clone(),
                WaiterGuard {
                    table: Arc::clone(&self.table),
                    key: key.to_string(),
                    generation: in_flight.generation,
                },
            );
        }

        let previous_invocation = entry.last_invocation;
        if let Some(answer) = inside_window(&mut *entry, now) {
            return Plan::Settled(answer);
        }

        table.next_generation += 1;
        let generation = table.next_generation;

        let run = self.make_run(key.to_string(), generation, op);
        entry.in_flight = Some(InFlight {
            generation,
            run: Box::new(run.clone()),
            waiters: 1,
            previous_invocation,
        });

        Plan::Start(
            run,
            WaiterGuard {
                table: Arc::clone(&self.table),
                key: key.to_string(),
                generation,
            },
        )
    }

    fn make_run<T, F, Fut>(&self, key: String, generation: u64, op: F) -> SharedRun<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let table = Arc::clone(&self.table);
        async move {
            let value = Arc::new(op().await);
            finish_run(&table, &key, generation, &value);
            value
        }
        .boxed()
        .shared()
    }

    fn count_saved_call(&self, debounced: bool) {
        if let Some(metrics) = &self.metrics {
            if debounced {
                metrics.record_debounced();
            } else {
                metrics.record_coalesced();
            }
        }
    }
}

/// Publish a finished run's value, unless the run was superseded or the key cleared
fn finish_run<T: Send + Sync + 'static>(
    table: &Mutex<WindowTable>,
    key: &str,
    generation: u64,
    value: &Arc<T>,
) {
    let finished = {
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(window) = table.windows.get_mut(key) else {
            return;
        };

        if !window
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            return;
        }
        window.last_result = Some(Arc::clone(value) as Arc<dyn Any + Send + Sync>);
        window.in_flight.take()
    };
    drop(finished);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WINDOW: Duration = Duration::from_millis(500);

    fn counting_op(
        counter: &Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Fn() -> BoxFuture<'static, usize> + Clone + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(delay).await;
                counter.fetch_add(1, Ordering::SeqCst) + 1
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_coalesce_runs_once() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::from_millis(100));

        let (a, b) = tokio::join!(
            debouncer.coalesce("clients", op.clone()),
            debouncer.coalesce("clients", op.clone()),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!debouncer.is_in_flight("clients"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_coalesce_runs_again() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::ZERO);

        assert_eq!(*debouncer.coalesce("files", op.clone()).await, 1);
        assert_eq!(*debouncer.coalesce("files", op.clone()).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_inside_window_reuses_result() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::ZERO);

        let first = debouncer.debounce("refresh", WINDOW, op.clone()).await;
        tokio::time::advance(WINDOW / 2).await;
        let second = debouncer.debounce("refresh", WINDOW, op.clone()).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(first.was_executed());
        assert!(matches!(second, Debounced::Reused(_)));
        assert!(Arc::ptr_eq(&first.value().unwrap(), &second.value().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_inside_window_joins_slow_run() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, WINDOW * 2);

        let first = debouncer.debounced("refresh", WINDOW, op.clone());
        let second = first.clone();
        let late = async {
            tokio::time::sleep(WINDOW / 2).await;
            second().await
        };

        let (a, b) = tokio::join!(first(), late);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(a.was_executed());
        assert!(matches!(b, Debounced::Joined(_)));
        assert!(Arc::ptr_eq(&a.value().unwrap(), &b.value().unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_at_window_expiry_executes() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::ZERO);

        debouncer.debounce("search", WINDOW, op.clone()).await;
        tokio::time::advance(WINDOW).await;
        let again = debouncer.debounce("search", WINDOW, op.clone()).await;

        assert!(again.was_executed());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suppressed_when_nothing_to_reuse() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::ZERO);

        debouncer.debounce("refresh", WINDOW, op.clone()).await;
        tokio::time::advance(WINDOW / 2).await;

        // The stored result has another type, so there is nothing to hand back
        let second = debouncer
            .debounce("refresh", WINDOW, || async { "text" })
            .await;
        assert_eq!(second, Debounced::Suppressed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_debounce_lets_next_call_run() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let slow = counting_op(&counter, Duration::from_secs(10));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            debouncer.debounce("refresh", WINDOW, slow),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(!debouncer.is_in_flight("refresh"));

        let quick = counting_op(&counter, Duration::ZERO);
        let next = debouncer.debounce("refresh", WINDOW, quick.clone()).await;
        assert!(next.was_executed());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // The completed run opened a window of its own
        let again = debouncer.debounce("refresh", WINDOW, quick).await;
        assert!(matches!(again, Debounced::Reused(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_keeps_earlier_window() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let quick = counting_op(&counter, Duration::ZERO);
        let slow = counting_op(&counter, Duration::from_secs(10));

        debouncer.debounce("refresh", WINDOW, quick.clone()).await;
        tokio::time::advance(WINDOW).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            debouncer.debounce("refresh", WINDOW, slow),
        )
        .await;
        assert!(abandoned.is_err());

        // The window is back to the first run's, which has already expired
        assert!(debouncer.debounce("refresh", WINDOW, quick).await.was_executed());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_nested_runs_releases_every_key() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let inner = debouncer.clone();
        let inner_op = counting_op(&counter, Duration::from_secs(10));
        let outer = debouncer.debounce("refresh_all", WINDOW, move || async move {
            let (a, b) = tokio::join!(
                inner.coalesce("clients", inner_op.clone()),
                inner.coalesce("files", inner_op.clone()),
            );
            *a + *b
        });

        let cancelled = tokio::time::timeout(Duration::from_millis(10), outer).await;
        assert!(cancelled.is_err());
        assert!(!debouncer.is_in_flight("refresh_all"));
        assert!(!debouncer.is_in_flight("clients"));
        assert!(!debouncer.is_in_flight("files"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiters_free_the_key() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::from_secs(10));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), debouncer.coalesce("logs", op.clone())).await;
        assert!(cancelled.is_err());
        assert!(!debouncer.is_in_flight("logs"));

        let quick = counting_op(&counter, Duration::ZERO);
        assert_eq!(*debouncer.coalesce("logs", quick).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::ZERO);

        debouncer.debounce("a", WINDOW, op.clone()).await;
        let other = debouncer.debounce("b", WINDOW, op.clone()).await;

        assert!(other.was_executed());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_window() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::ZERO);

        debouncer.debounce("refresh", WINDOW, op.clone()).await;
        debouncer.clear("refresh");
        assert!(debouncer.debounce("refresh", WINDOW, op.clone()).await.was_executed());

        debouncer.reset();
        assert!(debouncer.debounce("refresh", WINDOW, op.clone()).await.was_executed());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_type_runs_untracked() {
        let debouncer = Debouncer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let slow = counting_op(&counter, Duration::from_millis(100));

        let (a, b) = tokio::join!(
            debouncer.coalesce("mixed", slow),
            debouncer.coalesce("mixed", || async { "text" }),
        );

        assert_eq!(*a, 1);
        assert_eq!(*b, "text");
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_count_saved_calls() {
        let metrics = Arc::new(Metrics::new());
        let debouncer = Debouncer::new().with_metrics(Arc::clone(&metrics));
        let counter = Arc::new(AtomicUsize::new(0));
        let op = counting_op(&counter, Duration::from_millis(50));

        tokio::join!(
            debouncer.coalesce("k", op.clone()),
            debouncer.coalesce("k", op.clone()),
        );
        debouncer.debounce("d", WINDOW, op.clone()).await;
        debouncer.debounce("d", WINDOW, op.clone()).await;

        assert_eq!(metrics.coalesced_calls(), 1);
        assert_eq!(metrics.debounced_calls(), 1);
    }
}
