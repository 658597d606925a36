// Dashboard Controller - Bridges the view with the data bridge
//
// This module contains the DashboardController which coordinates between:
// - The data bridge (live or stub), reached only through fetchers
// - StateManager (presentation state)
// - Debouncer (refresh and search-box debouncing, per-list coalescing)
// - EventLoopBridge (view updates on the UI loop)
//
// It handles:
// - Full and per-list refreshes
// - Client actions (disconnect, delete) with follow-up refresh and notifications
// - The client search filter
// - Mirroring the bridge's connection state into presentation state

use crate::bridge::operations::{
    BridgeOperation, DeleteClient, DisconnectClient, GetClients, GetDatabaseInfo, GetFiles,
    GetLogs, GetRecentActivity, GetServerStatus, IsConnected,
};
use crate::bridge::{BridgeMode, ConnectionState, SharedBridge};
use crate::error::CallError;
use crate::models::BridgeSettings;
use crate::models::records::{
    ActivityItem, ClientRecord, DatabaseInfo, FileRecord, LogEntry, ServerStatus,
};
use crate::services::{Debounced, Debouncer, Fetched, Fetcher, SafeCaller};
use crate::state::{NotificationLevel, StateChange, StateManager};
use crate::ui::bridge::EventLoopBridge;
use crate::ui::view::ConsoleView;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Outcome of one full refresh
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSummary {
    pub requested: usize,
    pub failed: usize,
    pub first_error: Option<CallError>,
}

/// One fetcher per operation, built once per controller
struct Fetchers {
    clients: Fetcher<GetClients>,
    files: Fetcher<GetFiles>,
    database: Fetcher<GetDatabaseInfo>,
    logs: Fetcher<GetLogs>,
    server_status: Fetcher<GetServerStatus>,
    activity: Fetcher<GetRecentActivity>,
    disconnect: Fetcher<DisconnectClient>,
    delete: Fetcher<DeleteClient>,
    ping: Fetcher<IsConnected>,
}

impl Fetchers {
    fn new(caller: &SafeCaller) -> Self {
        Self {
            clients: caller.make_default_fetcher(),
            files: caller.make_default_fetcher(),
            database: caller.make_default_fetcher(),
            logs: caller.make_default_fetcher(),
            server_status: caller.make_default_fetcher(),
            activity: caller.make_default_fetcher(),
            disconnect: caller.make_default_fetcher(),
            delete: caller.make_default_fetcher(),
            ping: caller.make_default_fetcher(),
        }
    }
}

struct ControllerInner {
    bridge: SharedBridge,
    state: StateManager,
    debouncer: Debouncer,
    fetchers: Fetchers,
    refresh_window: Duration,
    search_window: Duration,
    /// Latest search text; the debounced run applies whatever is here when it fires
    pending_filter: Mutex<String>,
}

/// Dashboard controller that wires the bridging layer to presentation state
///
/// This is the main coordinator for the dashboard. It:
/// - Builds one fetcher per bridge operation and reuses them
/// - Debounces full refreshes and search-box input, coalesces per-list refreshes
/// - Applies fetched values to the [`StateManager`] and raises notifications
///
/// The controller never fails: every bridge failure turns into a fallback
/// value plus, where the user should know, a notification. Cloning is cheap.
///
/// # Example
/// ```ignore
/// let caller = SafeCaller::new(dispatch, settings.call_timeout(), metrics);
/// let controller = DashboardController::new(&caller, bridge, StateManager::new(), &settings);
///
/// controller.attach_view(&event_loop);
/// event_loop.spawn_local(move |_| async move {
///     controller.refresh_all().await;
/// });
/// ```
#[derive(Clone)]
pub struct DashboardController {
    inner: Arc<ControllerInner>,
}

impl DashboardController {
    /// Create a controller for `bridge`
    ///
    /// Records the bridge selection in `state`.
    pub fn new(caller: &SafeCaller, bridge: SharedBridge, state: StateManager, settings: &BridgeSettings) -> Self {
        let debouncer = Debouncer::new().with_metrics(Arc::clone(caller.metrics()));

        state.set_bridge(bridge.mode(), bridge.connection_state());
        if bridge.mode() == BridgeMode::Stub {
            state.notify(
                NotificationLevel::Warning,
                format!("Server at {} is unreachable, showing placeholder data", settings.server_url),
            );
        }

        tracing::info!("Dashboard controller initialized ({:?} bridge)", bridge.mode());

        Self {
            inner: Arc::new(ControllerInner {
                bridge,
                state,
                debouncer,
                fetchers: Fetchers::new(caller),
                refresh_window: settings.refresh_debounce(),
                search_window: settings.search_debounce(),
                pending_filter: Mutex::new(String::new()),
            }),
        }
    }

    pub fn bridge(&self) -> &SharedBridge {
        &self.inner.bridge
    }

    pub fn state(&self) -> &StateManager {
        &self.inner.state
    }

    /// Refresh every panel of the dashboard
    ///
    /// Debounced: calls less than the refresh window after the last executed
    /// refresh join it or reuse its summary. The six reads run concurrently,
    /// each coalesced with any per-list refresh already in flight.
    pub async fn refresh_all(&self) -> Debounced<Arc<RefreshSummary>> {
        let this = self.clone();
        self.inner
            .debouncer
            .debounce("refresh_all", self.inner.refresh_window, move || async move {
                this.run_full_refresh().await
            })
            .await
    }

    async fn run_full_refresh(&self) -> RefreshSummary {
        self.inner.state.start_refresh();

        let (clients, files, database, logs, server, activity) = tokio::join!(
            self.refresh_clients(),
            self.refresh_files(),
            self.refresh_database(),
            self.refresh_logs(),
            self.refresh_server_status(),
            self.refresh_activity(),
        );

        let errors: Vec<CallError> = [
            clients.error.clone(),
            files.error.clone(),
            database.error.clone(),
            logs.error.clone(),
            server.error.clone(),
            activity.error.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        self.inner.state.finish_refresh();

        let summary = RefreshSummary {
            requested: 6,
            failed: errors.len(),
            first_error: errors.into_iter().next(),
        };

        if summary.failed > 0 {
            tracing::debug!("Refresh finished with {} of {} reads failed", summary.failed, summary.requested);
        } else {
            tracing::debug!("Refresh finished");
        }

        summary
    }

    pub async fn refresh_clients(&self) -> Arc<Fetched<Vec<ClientRecord>>> {
        self.refresh_one(&self.inner.fetchers.clients, StateManager::apply_clients)
            .await
    }

    pub async fn refresh_files(&self) -> Arc<Fetched<Vec<FileRecord>>> {
        self.refresh_one(&self.inner.fetchers.files, StateManager::apply_files)
            .await
    }

    pub async fn refresh_database(&self) -> Arc<Fetched<DatabaseInfo>> {
        self.refresh_one(&self.inner.fetchers.database, StateManager::apply_database)
            .await
    }

    pub async fn refresh_logs(&self) -> Arc<Fetched<Vec<LogEntry>>> {
        self.refresh_one(&self.inner.fetchers.logs, StateManager::apply_logs)
            .await
    }

    pub async fn refresh_server_status(&self) -> Arc<Fetched<ServerStatus>> {
        self.refresh_one(&self.inner.fetchers.server_status, StateManager::apply_server_status)
            .await
    }

    pub async fn refresh_activity(&self) -> Arc<Fetched<Vec<ActivityItem>>> {
        self.refresh_one(&self.inner.fetchers.activity, StateManager::apply_activity)
            .await
    }

    /// Fetch one read operation, coalesced on its name, and apply the result
    async fn refresh_one<O>(
        &self,
        fetcher: &Fetcher<O>,
        apply: fn(&StateManager, O::Output) -> Vec<StateChange>,
    ) -> Arc<Fetched<O::Output>>
    where
        O: BridgeOperation<Args = ()>,
    {
        let this = self.clone();
        let fetcher = fetcher.clone();
        self.inner
            .debouncer
            .coalesce(O::NAME, move || async move {
                let fetched = fetcher.fetch_detailed(&this.inner.bridge, ()).await;
                apply(&this.inner.state, fetched.value.clone());
                this.sync_connection();
                fetched
            })
            .await
    }

    /// Ask the server to drop a client's session
    ///
    /// Returns the server's answer, `false` if the call failed.
    pub async fn disconnect_client(&self, client_id: &str) -> bool {
        self.client_action(&self.inner.fetchers.disconnect, client_id, "disconnect", "disconnected")
            .await
    }

    /// Ask the server to remove a client registration
    ///
    /// Returns the server's answer, `false` if the call failed.
    pub async fn delete_client(&self, client_id: &str) -> bool {
        self.client_action(&self.inner.fetchers.delete, client_id, "delete", "deleted")
            .await
    }

    async fn client_action<O>(&self, fetcher: &Fetcher<O>, client_id: &str, verb: &str, done: &str) -> bool
    where
        O: BridgeOperation<Args = String, Output = bool>,
    {
        tracing::info!("Requesting {} of client {}", verb, client_id);
        let fetched = fetcher.fetch_detailed(&self.inner.bridge, client_id.to_string()).await;
        self.sync_connection();

        if fetched.value {
            tracing::info!("Client {} {}", client_id, done);
            self.inner
                .state
                .notify(NotificationLevel::Success, format!("Client {} {}", client_id, done));
            self.refresh_clients().await;
            return true;
        }

        let reason = match (&fetched.error, self.inner.bridge.mode()) {
            (Some(error), _) => error.to_string(),
            (None, BridgeMode::Stub) => "server unavailable".to_string(),
            (None, BridgeMode::Live) => "rejected by server".to_string(),
        };
        tracing::warn!("Could not {} client {}: {}", verb, client_id, reason);
        self.inner.state.notify(
            NotificationLevel::Error,
            format!("Could not {} client {}: {}", verb, client_id, reason),
        );
        false
    }

    /// Update the client search filter
    ///
    /// Keystrokes arriving within the search window join one run, which
    /// waits out the window and applies the latest text. Returns the number
    /// of visible clients after the filter in effect.
    pub async fn set_client_filter(&self, text: &str) -> usize {
        *self
            .inner
            .pending_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = text.to_string();

        let this = self.clone();
        let window = self.inner.search_window;
        let outcome = self
            .inner
            .debouncer
            .debounce("client_filter", window, move || async move {
                tokio::time::sleep(window).await;
                let filter = this
                    .inner
                    .pending_filter
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                this.inner.state.set_client_filter(&filter);
                this.inner.state.read(|s| s.visible_clients.len())
            })
            .await;

        match outcome.value() {
            Some(visible) => *visible,
            None => self.inner.state.read(|s| s.visible_clients.len()),
        }
    }

    /// Ask the server whether it considers itself healthy
    pub async fn check_connection(&self) -> bool {
        let connected = self.inner.fetchers.ping.get(&self.inner.bridge).await;
        self.sync_connection();
        connected
    }

    /// Copy the bridge's connection state into presentation state
    ///
    /// Notifies the user when the connection is lost or restored.
    fn sync_connection(&self) -> ConnectionState {
        let connection = self.inner.bridge.connection_state();
        let changes = self.inner.state.set_connection(connection);

        if !changes.is_empty() && self.inner.bridge.mode() == BridgeMode::Live {
            match connection {
                ConnectionState::Degraded | ConnectionState::Unavailable => {
                    let reason = self
                        .inner
                        .bridge
                        .health()
                        .snapshot()
                        .last_error
                        .unwrap_or_else(|| "no response".to_string());
                    self.inner.state.notify(
                        NotificationLevel::Warning,
                        format!("Server connection {}: {}", connection.label(), reason),
                    );
                }
                ConnectionState::Live => {
                    self.inner
                        .state
                        .notify(NotificationLevel::Success, "Connected to server");
                }
                ConnectionState::Unknown => {}
            }
        }

        connection
    }

    /// Render state changes into `event_loop`'s view
    ///
    /// Spawns a loop task that lives until the view is closed.
    pub fn attach_view(&self, event_loop: &EventLoopBridge<ConsoleView>) -> JoinHandle<()> {
        let state = self.inner.state.clone();
        let mut rx = state.subscribe();

        event_loop.spawn_local(move |view| async move {
            tracing::debug!("View subscription started");

            loop {
                match rx.recv().await {
                    Ok(change) => {
                        tracing::trace!("State change received: {:?}", change);
                        let snapshot = state.snapshot();
                        if view.with(|v| v.apply(&change, &snapshot)).is_none() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("View lagged behind, {} state changes skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            tracing::debug!("View subscription terminated");
        })
    }

    /// Forget debounce state (view teardown)
    pub fn close(&self) {
        self.inner.debouncer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::MockTransport;
    use crate::bridge::{Endpoints, HealthThresholds, LiveBridge, StubBridge};
    use crate::metrics::Metrics;
    use crate::services::WorkerDispatch;
    use serde_json::json;

    fn caller() -> SafeCaller {
        SafeCaller::new(
            WorkerDispatch::new(tokio::runtime::Handle::current(), 4, 16),
            Duration::from_secs(2),
            Arc::new(Metrics::new()),
        )
    }

    fn controller(bridge: SharedBridge) -> DashboardController {
        DashboardController::new(&caller(), bridge, StateManager::new(), &BridgeSettings::default())
    }

    fn live(mock: MockTransport) -> SharedBridge {
        Arc::new(LiveBridge::new(Arc::new(mock), Endpoints::default(), HealthThresholds::default()))
    }

    #[tokio::test]
    async fn test_stub_controller_notifies_and_refreshes_empty() {
        let state = StateManager::new();
        let mut rx = state.subscribe();
        let controller = DashboardController::new(
            &caller(),
            Arc::new(StubBridge::new()),
            state,
            &BridgeSettings::default(),
        );

        let summary = controller.refresh_all().await.value().unwrap();
        assert_eq!(summary.failed, 0);

        let snapshot = controller.state().snapshot();
        assert_eq!(snapshot.bridge_mode, BridgeMode::Stub);
        assert_eq!(snapshot.connection, ConnectionState::Unavailable);
        assert!(snapshot.clients.is_empty());

        let mut saw_warning = false;
        while let Ok(change) = rx.try_recv() {
            if let StateChange::Notification { level, .. } = change {
                saw_warning |= level == NotificationLevel::Warning;
            }
        }
        assert!(saw_warning);
    }

    #[tokio::test]
    async fn test_refresh_all_is_debounced() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .times(6)
            .returning(|req| match req.operation {
                "get_database_info" => Ok(json!({
                    "status": "Connected", "tableCount": 3, "recordCount": 10, "sizeHuman": "1 MB"
                })),
                "get_server_status" => Ok(json!({
                    "running": true, "port": 8080, "uptimeHuman": "1h", "totalTransfers": 5,
                    "activeClients": 1, "totalFiles": 2, "storageUsedHuman": "3 MB"
                })),
                _ => Ok(json!([])),
            });

        let controller = controller(live(mock));
        let first = controller.refresh_all().await;
        let second = controller.refresh_all().await;

        assert!(first.was_executed());
        assert!(matches!(second, Debounced::Reused(_)));
        assert_eq!(controller.state().snapshot().connection, ConnectionState::Live);
        assert!(controller.state().snapshot().server.running);
    }

    #[tokio::test]
    async fn test_failed_disconnect_notifies_error() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .returning(|_| Err(CallError::Transport("connection refused".to_string())));

        let controller = controller(live(mock));
        let mut rx = controller.state().subscribe();

        assert!(!controller.disconnect_client("abc").await);

        let notifications: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|change| match change {
                StateChange::Notification { level, message } => Some((level, message)),
                _ => None,
            })
            .collect();

        assert!(notifications.iter().any(|(level, message)| {
            *level == NotificationLevel::Error && message.contains("Could not disconnect client abc")
        }));
        assert!(notifications.iter().any(|(level, _)| *level == NotificationLevel::Warning));
    }

    #[tokio::test]
    async fn test_successful_delete_refreshes_clients() {
        let mut mock = MockTransport::new();
        mock.expect_send()
            .withf(|req| req.operation == "delete_client")
            .times(1)
            .returning(|_| Ok(json!({"success": true})));
        mock.expect_send()
            .withf(|req| req.operation == "get_clients")
            .times(1)
            .returning(|_| Ok(json!([])));

        let controller = controller(live(mock));
        assert!(controller.delete_client("c-1").await);
        assert_eq!(controller.state().snapshot().connection, ConnectionState::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_keystrokes_apply_latest_text() {
        let controller = controller(Arc::new(StubBridge::new()));
        controller.state().apply_clients(vec![
            ClientRecord {
                id: "alpha".to_string(),
                address: "10.0.0.1".to_string(),
                status: crate::models::ClientStatus::Connected,
                connected_at: String::new(),
                last_activity: String::new(),
            },
            ClientRecord {
                id: "beta".to_string(),
                address: "10.0.0.2".to_string(),
                status: crate::models::ClientStatus::Offline,
                connected_at: String::new(),
                last_activity: String::new(),
            },
        ]);

        let typing = async {
            tokio::join!(
                controller.set_client_filter("a"),
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    controller.set_client_filter("al").await
                },
                async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    controller.set_client_filter("alp").await
                },
            )
        };

        let (first, second, third) = typing.await;
        assert_eq!((first, second, third), (1, 1, 1));
        assert_eq!(controller.state().snapshot().client_filter, "alp");
    }
}
