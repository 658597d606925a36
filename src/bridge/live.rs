use super::transport::{Endpoints, Transport};
use super::{BridgeMode, DataBridge, HealthThresholds, HealthTracker};
use crate::error::CallError;
use crate::models::records::{
    ActivityItem, ClientRecord, DatabaseInfo, FileRecord, LogEntry, ServerStatus,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Body returned by mutating endpoints
#[derive(Debug, Deserialize)]
struct MutationResponse {
    success: bool,
}

/// Body returned by the health endpoint
#[derive(Debug, Deserialize)]
struct HealthResponse {
    connected: bool,
}

/// Bridge that talks to the backup server through a [`Transport`].
///
/// Methods block on I/O and return the raw transport/protocol error on
/// failure. They are meant to be called through the
/// [`SafeCaller`](crate::services::SafeCaller), which runs them on a worker,
/// records the outcome on this bridge's health tracker and turns failures
/// into fallback values.
pub struct LiveBridge {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    health: HealthTracker,
}

impl LiveBridge {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            transport,
            endpoints,
            health: HealthTracker::new(thresholds),
        }
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        id: Option<&str>,
    ) -> Result<T, CallError> {
        let request = self.endpoints.request(operation, id)?;
        let body = self.transport.send(&request)?;

        serde_json::from_value(body)
            .map_err(|e| CallError::Protocol(format!("{} returned an unexpected shape: {}", operation, e)))
    }
}

impl DataBridge for LiveBridge {
    fn mode(&self) -> BridgeMode {
        BridgeMode::Live
    }

    fn health(&self) -> &HealthTracker {
        &self.health
    }

    fn get_clients(&self) -> Result<Vec<ClientRecord>, CallError> {
        self.fetch("get_clients", None)
    }

    fn get_files(&self) -> Result<Vec<FileRecord>, CallError> {
        self.fetch("get_files", None)
    }

    fn get_database_info(&self) -> Result<DatabaseInfo, CallError> {
        self.fetch("get_database_info", None)
    }

    fn get_logs(&self) -> Result<Vec<LogEntry>, CallError> {
        self.fetch("get_logs", None)
    }

    fn get_server_status(&self) -> Result<ServerStatus, CallError> {
        self.fetch("get_server_status", None)
    }

    fn get_recent_activity(&self) -> Result<Vec<ActivityItem>, CallError> {
        self.fetch("get_recent_activity", None)
    }

    fn disconnect_client(&self, client_id: &str) -> Result<bool, CallError> {
        let response: MutationResponse = self.fetch("disconnect_client", Some(client_id))?;
        Ok(response.success)
    }

    fn delete_client(&self, client_id: &str) -> Result<bool, CallError> {
        let response: MutationResponse = self.fetch("delete_client", Some(client_id))?;
        Ok(response.success)
    }

    fn is_connected(&self) -> Result<bool, CallError> {
        let response: HealthResponse = self.fetch("is_connected", None)?;
        Ok(response.connected)
    }
}
