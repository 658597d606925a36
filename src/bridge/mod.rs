//! Data-access bridge - named remote operations independent of transport.
//!
//! Two implementations satisfy the same [`DataBridge`] contract:
//!
//! - [`LiveBridge`]: performs blocking I/O through a [`Transport`] and returns
//!   raw errors, which the [`SafeCaller`](crate::services::SafeCaller) contains
//! - [`StubBridge`]: answers every operation with its empty value, instantly
//!
//! [`select_bridge`] picks one of them once, at startup. A live bridge whose
//! backend later goes away stays live; its [`HealthTracker`] reports the
//! degradation and fetchers serve fallbacks.

pub mod health;
pub mod live;
pub mod operations;
pub mod stub;
pub mod transport;

pub use health::{ConnectionState, HealthSnapshot, HealthThresholds, HealthTracker};
pub use live::LiveBridge;
pub use operations::BridgeOperation;
pub use stub::StubBridge;
pub use transport::{Endpoints, HttpTransport, Method, Request, Transport};

use crate::error::CallError;
use crate::models::config::{BridgeModeSetting, BridgeSettings};
use crate::models::records::{
    ActivityItem, ClientRecord, DatabaseInfo, FileRecord, LogEntry, ServerStatus,
};
use crate::services::dispatch::WorkerDispatch;
use serde::Serialize;
use std::sync::Arc;

/// Which implementation backs a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BridgeMode {
    Live,
    Stub,
}

/// Capability contract shared by the live and stub bridges.
///
/// Every method may block and must not be called from the UI loop directly.
pub trait DataBridge: Send + Sync {
    fn mode(&self) -> BridgeMode;

    /// Health tracker owned by this bridge
    fn health(&self) -> &HealthTracker;

    fn connection_state(&self) -> ConnectionState {
        self.health().state()
    }

    fn get_clients(&self) -> Result<Vec<ClientRecord>, CallError>;
    fn get_files(&self) -> Result<Vec<FileRecord>, CallError>;
    fn get_database_info(&self) -> Result<DatabaseInfo, CallError>;
    fn get_logs(&self) -> Result<Vec<LogEntry>, CallError>;
    fn get_server_status(&self) -> Result<ServerStatus, CallError>;
    fn get_recent_activity(&self) -> Result<Vec<ActivityItem>, CallError>;
    fn disconnect_client(&self, client_id: &str) -> Result<bool, CallError>;
    fn delete_client(&self, client_id: &str) -> Result<bool, CallError>;
    fn is_connected(&self) -> Result<bool, CallError>;
}

/// Bridge handle shared between the controller and worker threads
pub type SharedBridge = Arc<dyn DataBridge>;

/// Choose the bridge implementation for this session.
///
/// `mode: auto` probes the server once through the worker pool, bounded by
/// `probe_timeout`. The choice is never revisited.
pub async fn select_bridge(
    settings: &BridgeSettings,
    transport: Arc<dyn Transport>,
    dispatch: &WorkerDispatch,
) -> SharedBridge {
    let endpoints = Endpoints::with_overrides(&settings.endpoints);
    let thresholds = HealthThresholds::new(
        settings.degraded_after_failures,
        settings.unavailable_after_failures,
    );

    let use_live = match settings.mode {
        BridgeModeSetting::Live => true,
        BridgeModeSetting::Stub => false,
        BridgeModeSetting::Auto => {
            let probe_transport = Arc::clone(&transport);
            let probe = dispatch.run_blocking(move || probe_transport.probe());

            match tokio::time::timeout(settings.probe_timeout(), probe).await {
                Ok(Ok(Ok(()))) => true,
                Ok(Ok(Err(e))) | Ok(Err(e)) => {
                    tracing::warn!("Server probe failed ({}), using stub bridge", e);
                    false
                }
                Err(_) => {
                    tracing::warn!(
                        "Server probe timed out after {:?}, using stub bridge",
                        settings.probe_timeout()
                    );
                    false
                }
            }
        }
    };

    if use_live {
        tracing::info!("Using live bridge for {}", settings.server_url);
        Arc::new(LiveBridge::new(transport, endpoints, thresholds))
    } else {
        tracing::info!("Using stub bridge");
        Arc::new(StubBridge::new())
    }
}
