// Connection health tracking for a data bridge
//
// The tracker is the single owner of a bridge's ConnectionState. It is only
// ever moved by call outcomes reported from the SafeCaller; UI code reads
// snapshots for display and never writes.

use crate::error::CallError;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Reachability of the backend as observed through call outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConnectionState {
    /// No call has completed yet
    Unknown,
    Live,
    /// Reachable, but recent calls are failing
    Degraded,
    Unavailable,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Live => "live",
            ConnectionState::Degraded => "degraded",
            ConnectionState::Unavailable => "unavailable",
        }
    }
}

/// Failure counts that drive the Live -> Degraded -> Unavailable steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    /// Consecutive failures while Live before moving to Degraded
    pub degraded_after: u32,
    /// Further consecutive failures while Degraded before moving to Unavailable
    pub unavailable_after: u32,
}

impl HealthThresholds {
    pub fn new(degraded_after: u32, unavailable_after: u32) -> Self {
        Self {
            degraded_after: degraded_after.max(1),
            unavailable_after: unavailable_after.max(1),
        }
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Point-in-time view of a tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub state: ConnectionState,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct HealthInner {
    state: ConnectionState,
    consecutive_failures: u32,
    /// Failures since entering the current state; resets on every transition
    failures_in_state: u32,
    total_failures: u64,
    total_successes: u64,
    last_error: Option<String>,
}

/// Tracks ConnectionState for one bridge.
///
/// Transitions:
/// - `Unknown` -> `Live` on the first success, -> `Unavailable` on the first failure
/// - `Live` -> `Degraded` after `degraded_after` consecutive failures
/// - `Degraded` -> `Unavailable` after `unavailable_after` further failures
/// - `Degraded | Unavailable` -> `Live` on any success
///
/// A tracker built with [`HealthTracker::fixed`] reports one state forever and
/// ignores outcomes; the stub bridge uses it.
#[derive(Debug)]
pub struct HealthTracker {
    thresholds: HealthThresholds,
    frozen: bool,
    inner: Mutex<HealthInner>,
}

impl HealthTracker {
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self::with_state(thresholds, ConnectionState::Unknown, false)
    }

    /// A tracker pinned to `state`.
    pub fn fixed(state: ConnectionState) -> Self {
        Self::with_state(HealthThresholds::default(), state, true)
    }

    fn with_state(thresholds: HealthThresholds, state: ConnectionState, frozen: bool) -> Self {
        Self {
            thresholds,
            frozen,
            inner: Mutex::new(HealthInner {
                state,
                consecutive_failures: 0,
                failures_in_state: 0,
                total_failures: 0,
                total_successes: 0,
                last_error: None,
            }),
        }
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self.lock();
        HealthSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            last_error: inner.last_error.clone(),
        }
    }

    /// Record a successful call.
    ///
    /// Returns `(from, to)` when the state changed.
    pub fn record_success(&self) -> Option<(ConnectionState, ConnectionState)> {
        if self.frozen {
            return None;
        }

        let mut inner = self.lock();
        inner.total_successes += 1;
        inner.consecutive_failures = 0;

        let from = inner.state;
        if from == ConnectionState::Live {
            return None;
        }

        inner.state = ConnectionState::Live;
        inner.failures_in_state = 0;
        tracing::info!(from = from.label(), to = "live", "Connection state changed");
        Some((from, ConnectionState::Live))
    }

    /// Record a failed call.
    ///
    /// Returns `(from, to)` when the state changed.
    pub fn record_failure(&self, error: &CallError) -> Option<(ConnectionState, ConnectionState)> {
        if self.frozen {
            return None;
        }

        let mut inner = self.lock();
        inner.total_failures += 1;
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.failures_in_state = inner.failures_in_state.saturating_add(1);
        inner.last_error = Some(error.to_string());

        let from = inner.state;
        let to = match from {
            ConnectionState::Unknown => ConnectionState::Unavailable,
            ConnectionState::Live if inner.failures_in_state >= self.thresholds.degraded_after => {
                ConnectionState::Degraded
            }
            ConnectionState::Degraded
                if inner.failures_in_state >= self.thresholds.unavailable_after =>
            {
                ConnectionState::Unavailable
            }
            other => other,
        };

        if to == from {
            return None;
        }

        inner.state = to;
        inner.failures_in_state = 0;
        tracing::warn!(
            from = from.label(),
            to = to.label(),
            consecutive_failures = inner.consecutive_failures,
            "Connection state changed"
        );
        Some((from, to))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HealthInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new(HealthThresholds::default())
    }
}
