// Bridge metrics module
//
// Lightweight counters for monitoring how the data bridge behaves: how many
// calls ran, how many failed, and how much work the debouncer saved.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Session-wide bridge metrics
///
/// Uses atomic operations for thread-safe tracking without locks. Counters
/// are bumped from worker threads and the UI loop alike and logged on
/// shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Calls that entered the SafeCaller
    pub calls_started: AtomicU64,

    /// Calls that ended in a Failure
    pub calls_failed: AtomicU64,

    /// Calls that hit the call deadline
    pub timeouts: AtomicU64,

    /// Calls rejected because the worker queue was full
    pub queue_overflows: AtomicU64,

    /// Fetches answered with the fallback value
    pub fallbacks_served: AtomicU64,

    /// Calls that joined an in-flight run instead of starting one
    pub coalesced_calls: AtomicU64,

    /// Calls dropped or answered from cache inside a debounce window
    pub debounced_calls: AtomicU64,

    /// UI updates marshalled onto the loop
    pub ui_updates: AtomicU64,

    /// UI updates dropped because the loop's channel was full
    pub ui_update_channel_full: AtomicU64,

    /// Application start time
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            calls_started: AtomicU64::new(0),
            calls_failed: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            queue_overflows: AtomicU64::new(0),
            fallbacks_served: AtomicU64::new(0),
            coalesced_calls: AtomicU64::new(0),
            debounced_calls: AtomicU64::new(0),
            ui_updates: AtomicU64::new(0),
            ui_update_channel_full: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_call(&self) {
        self.calls_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.calls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_overflow(&self) {
        self.queue_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_debounced(&self) {
        self.debounced_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_update(&self) {
        self.ui_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ui_channel_full(&self) {
        self.ui_update_channel_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn calls_started(&self) -> u64 {
        self.calls_started.load(Ordering::Relaxed)
    }

    pub fn calls_failed(&self) -> u64 {
        self.calls_failed.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    pub fn fallbacks_served(&self) -> u64 {
        self.fallbacks_served.load(Ordering::Relaxed)
    }

    pub fn coalesced_calls(&self) -> u64 {
        self.coalesced_calls.load(Ordering::Relaxed)
    }

    pub fn debounced_calls(&self) -> u64 {
        self.debounced_calls.load(Ordering::Relaxed)
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Share of started calls that failed, in percent
    pub fn failure_rate(&self) -> f64 {
        let started = self.calls_started();
        if started > 0 {
            self.calls_failed() as f64 * 100.0 / started as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Bridge Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Calls: {} started, {} failed ({:.1}%), {} timed out, {} rejected",
            self.calls_started(),
            self.calls_failed(),
            self.failure_rate(),
            self.timeouts(),
            self.queue_overflows.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Fallbacks served: {}, coalesced: {}, debounced: {}",
            self.fallbacks_served(),
            self.coalesced_calls(),
            self.debounced_calls()
        );
        tracing::info!(
            "UI updates: {}, channel full errors: {}",
            self.ui_updates.load(Ordering::Relaxed),
            self.ui_update_channel_full.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
