use super::safe_call::{CallResult, SafeCaller};
use crate::bridge::{BridgeMode, BridgeOperation, SharedBridge};
use crate::error::CallError;
use std::sync::Arc;

/// Value produced by a fetcher, with the error that forced a fallback (if any)
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub error: Option<CallError>,
}

impl<T> Fetched<T> {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

struct FetcherInner<O: BridgeOperation> {
    caller: SafeCaller,
    fallback: O::Output,
}

/// Reusable accessor for one bridge operation.
///
/// Built once (per view, per session) with [`SafeCaller::make_fetcher`] and
/// called many times. A fetch never fails: when the call does not produce a
/// value, a clone of the fallback captured at construction is returned.
/// Cloning is one `Arc` bump.
pub struct Fetcher<O: BridgeOperation> {
    inner: Arc<FetcherInner<O>>,
}

impl<O: BridgeOperation> Clone for Fetcher<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O: BridgeOperation> Fetcher<O> {
    pub fn operation(&self) -> &'static str {
        O::NAME
    }

    pub fn fallback(&self) -> &O::Output {
        &self.inner.fallback
    }

    /// Fetch the operation's value, or the fallback.
    pub async fn fetch(&self, bridge: &SharedBridge, args: O::Args) -> O::Output {
        self.fetch_detailed(bridge, args).await.value
    }

    /// Like [`fetch`](Self::fetch), but also reports why a fallback was served.
    pub async fn fetch_detailed(&self, bridge: &SharedBridge, args: O::Args) -> Fetched<O::Output> {
        // Stub answers are synthetic and instant, no worker needed
        if bridge.mode() == BridgeMode::Stub {
            return match O::invoke(bridge.as_ref(), args) {
                Ok(value) => Fetched { value, error: None },
                Err(error) => self.serve_fallback(error),
            };
        }

        match self
            .inner
            .caller
            .call(O::NAME, bridge, move |b| O::invoke(b, args))
            .await
        {
            CallResult::Success(value) => Fetched { value, error: None },
            CallResult::Failure { reason, .. } => self.serve_fallback(reason),
        }
    }

    fn serve_fallback(&self, error: CallError) -> Fetched<O::Output> {
        self.inner.caller.metrics().record_fallback();
        tracing::debug!("Serving fallback for {} ({})", O::NAME, error.kind());
        Fetched {
            value: self.inner.fallback.clone(),
            error: Some(error),
        }
    }
}

impl<O: BridgeOperation<Args = ()>> Fetcher<O> {
    /// Fetch an operation that takes no arguments.
    pub async fn get(&self, bridge: &SharedBridge) -> O::Output {
        self.fetch(bridge, ()).await
    }
}

impl SafeCaller {
    /// Build a fetcher for `O` that falls back to `fallback`.
    pub fn make_fetcher<O: BridgeOperation>(&self, fallback: O::Output) -> Fetcher<O> {
        Fetcher {
            inner: Arc::new(FetcherInner {
                caller: self.clone(),
                fallback,
            }),
        }
    }

    /// Build a fetcher for `O` that falls back to the operation's empty value.
    pub fn make_default_fetcher<O: BridgeOperation>(&self) -> Fetcher<O> {
        self.make_fetcher::<O>(O::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::operations::{
        DisconnectClient, GetClients, GetDatabaseInfo, GetServerStatus,
    };
    use crate::bridge::transport::MockTransport;
    use crate::bridge::{ConnectionState, Endpoints, HealthThresholds, LiveBridge, StubBridge};
    use crate::metrics::Metrics;
    use crate::models::records::{ClientRecord, ClientStatus, ServerStatus};
    use crate::services::dispatch::WorkerDispatch;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn caller() -> SafeCaller {
        SafeCaller::new(
            WorkerDispatch::new(Handle::current(), 2, 8),
            Duration::from_secs(2),
            Arc::new(Metrics::new()),
        )
    }

    fn live(mock: MockTransport) -> SharedBridge {
        Arc::new(LiveBridge::new(Arc::new(mock), Endpoints::default(), HealthThresholds::default()))
    }

    fn unreachable() -> SharedBridge {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Err(CallError::Transport("connection refused".to_string())));
        live(mock)
    }

    fn placeholder_client() -> ClientRecord {
        ClientRecord {
            id: "placeholder".to_string(),
            address: "-".to_string(),
            status: ClientStatus::Offline,
            connected_at: String::new(),
            last_activity: String::new(),
        }
    }

    #[tokio::test]
    async fn test_failing_bridge_returns_exact_fallback() {
        let caller = caller();
        let bridge = unreachable();

        let clients = caller.make_fetcher::<GetClients>(vec![placeholder_client()]);
        let status = caller.make_fetcher::<GetServerStatus>(ServerStatus {
            port: 9000,
            ..ServerStatus::stopped()
        });
        let database = caller.make_default_fetcher::<GetDatabaseInfo>();

        for _ in 0..3 {
            assert_eq!(clients.get(&bridge).await, vec![placeholder_client()]);
            assert_eq!(status.get(&bridge).await.port, 9000);
            assert_eq!(&database.get(&bridge).await, database.fallback());
        }

        assert_eq!(caller.metrics().fallbacks_served(), 9);
        assert_eq!(bridge.connection_state(), ConnectionState::Unavailable);
    }

    #[tokio::test]
    async fn test_fallback_reports_reason() {
        let caller = caller();
        let fetched = caller
            .make_default_fetcher::<GetClients>()
            .fetch_detailed(&unreachable(), ())
            .await;

        assert!(fetched.is_fallback());
        assert_eq!(fetched.value, Vec::new());
        assert_eq!(
            fetched.error,
            Some(CallError::Transport("connection refused".to_string()))
        );
    }

    #[tokio::test]
    async fn test_recovers_once_backend_answers() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);

        let mut mock = MockTransport::new();
        mock.expect_send().returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CallError::Timeout(Duration::from_secs(5)))
            } else {
                Ok(json!([{
                    "id": "c-7",
                    "address": "10.0.0.7:5000",
                    "status": "Registered",
                    "connectedAt": "",
                    "lastActivity": ""
                }]))
            }
        });

        let caller = caller();
        let bridge = live(mock);
        let fetcher = caller.make_default_fetcher::<GetClients>();

        assert!(fetcher.get(&bridge).await.is_empty());
        assert!(fetcher.get(&bridge).await.is_empty());
        assert_eq!(bridge.connection_state(), ConnectionState::Unavailable);

        let clients = fetcher.get(&bridge).await;
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, "c-7");
        assert_eq!(bridge.connection_state(), ConnectionState::Live);
    }

    #[tokio::test]
    async fn test_stub_is_served_inline() {
        let caller = caller();
        let bridge: SharedBridge = Arc::new(StubBridge::new());
        let fetcher = caller.make_default_fetcher::<GetClients>();

        assert!(fetcher.get(&bridge).await.is_empty());
        // Never reached the worker pool
        assert_eq!(caller.metrics().calls_started(), 0);
    }

    #[tokio::test]
    async fn test_mutation_with_argument() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.path == "/api/clients/abc/disconnect")
            .returning(|_| Ok(json!({"success": true})));

        let caller = caller();
        let disconnect = caller.make_default_fetcher::<DisconnectClient>();
        assert!(disconnect.fetch(&live(mock), "abc".to_string()).await);
        assert_eq!(disconnect.operation(), "disconnect_client");
    }

    #[tokio::test]
    async fn test_clones_share_fallback() {
        let caller = caller();
        let fetcher = caller.make_fetcher::<GetClients>(vec![placeholder_client()]);
        let copy = fetcher.clone();

        assert!(std::ptr::eq(fetcher.fallback(), copy.fallback()));
    }
}
