use super::dispatch::WorkerDispatch;
use crate::bridge::{DataBridge, SharedBridge};
use crate::error::CallError;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a bridge call. Every call ends in exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult<T> {
    Success(T),
    Failure {
        reason: CallError,
        operation: &'static str,
    },
}

impl<T> CallResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            CallResult::Success(value) => Some(value),
            CallResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&CallError> {
        match self {
            CallResult::Success(_) => None,
            CallResult::Failure { reason, .. } => Some(reason),
        }
    }

    /// The payload, or `fallback` on failure
    pub fn unwrap_or(self, fallback: T) -> T {
        match self {
            CallResult::Success(value) => value,
            CallResult::Failure { .. } => fallback,
        }
    }

    pub fn into_result(self) -> Result<T, CallError> {
        match self {
            CallResult::Success(value) => Ok(value),
            CallResult::Failure { reason, .. } => Err(reason),
        }
    }
}

/// The single choke point for bridge calls.
///
/// Runs an operation on a worker via [`WorkerDispatch`], bounded by
/// `call_timeout`, and converts every error (including a timeout or a panic)
/// into [`CallResult::Failure`]. Outcomes are recorded on the bridge's
/// health tracker: connectivity failures push it towards `Degraded` and
/// `Unavailable`, any success brings it back to `Live`.
///
/// On timeout the worker keeps running until the operation returns; its
/// result is then discarded.
#[derive(Clone)]
pub struct SafeCaller {
    dispatch: WorkerDispatch,
    call_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl SafeCaller {
    pub fn new(dispatch: WorkerDispatch, call_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            dispatch,
            call_timeout,
            metrics,
        }
    }

    pub fn dispatch(&self) -> &WorkerDispatch {
        &self.dispatch
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run `thunk` against `bridge` on a worker and contain any failure.
    pub async fn call<T, F>(&self, operation: &'static str, bridge: &SharedBridge, thunk: F) -> CallResult<T>
    where
        F: FnOnce(&dyn DataBridge) -> Result<T, CallError> + Send + 'static,
        T: Send + 'static,
    {
        self.metrics.record_call();
        let started = Instant::now();
        let worker_bridge = Arc::clone(bridge);

        let outcome = match tokio::time::timeout(
            self.call_timeout,
            self.dispatch.run_blocking(move || thunk(worker_bridge.as_ref())),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(dispatch_error)) => Err(dispatch_error),
            Err(_) => {
                self.metrics.record_timeout();
                Err(CallError::Timeout(self.call_timeout))
            }
        };

        match outcome {
            Ok(value) => {
                bridge.health().record_success();
                tracing::debug!(
                    operation,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Bridge call succeeded"
                );
                CallResult::Success(value)
            }
            Err(reason) => {
                self.metrics.record_failure();
                if reason.is_connectivity_failure() {
                    tracing::warn!(operation, kind = reason.kind(), error = %reason, "Bridge call failed");
                    bridge.health().record_failure(&reason);
                } else {
                    tracing::warn!(operation, kind = reason.kind(), error = %reason, "Bridge call not executed");
                }
                CallResult::Failure { reason, operation }
            }
        }
    }
}
