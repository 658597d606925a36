use std::time::Duration;
use thiserror::Error;

/// Errors a bridge call can end in.
///
/// `Transport`, `Timeout` and `Protocol` describe the backend; they are
/// contained by [`SafeCaller`](crate::services::SafeCaller) and never reach
/// UI code except as a fallback value. `QueueOverflow` and `Cancelled` are
/// structural conditions of the dispatch layer and do not count against the
/// backend's health.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Worker queue full ({depth} calls waiting)")]
    QueueOverflow { depth: usize },

    #[error("Call cancelled")]
    Cancelled,

    #[error("Worker panicked: {0}")]
    WorkerPanicked(String),
}

impl CallError {
    /// Whether this failure says something about the backend's reachability.
    ///
    /// Only these errors move the bridge's connection state.
    pub fn is_connectivity_failure(&self) -> bool {
        matches!(
            self,
            CallError::Transport(_)
                | CallError::Timeout(_)
                | CallError::Protocol(_)
                | CallError::WorkerPanicked(_)
        )
    }

    /// Short, stable label used in structured log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Transport(_) => "transport",
            CallError::Timeout(_) => "timeout",
            CallError::Protocol(_) => "protocol",
            CallError::QueueOverflow { .. } => "queue_overflow",
            CallError::Cancelled => "cancelled",
            CallError::WorkerPanicked(_) => "panic",
        }
    }
}
