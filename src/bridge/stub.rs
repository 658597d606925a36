use super::operations::{
    BridgeOperation, GetClients, GetDatabaseInfo, GetFiles, GetLogs, GetRecentActivity,
    GetServerStatus,
};
use super::{BridgeMode, ConnectionState, DataBridge, HealthTracker};
use crate::error::CallError;
use crate::models::records::{
    ActivityItem, ClientRecord, DatabaseInfo, FileRecord, LogEntry, ServerStatus,
};

/// Bridge used when no backend is reachable.
///
/// Every operation answers immediately with the operation's empty value and
/// never fails. Its connection state is pinned to `Unavailable`.
#[derive(Debug)]
pub struct StubBridge {
    health: HealthTracker,
}

impl StubBridge {
    pub fn new() -> Self {
        Self {
            health: HealthTracker::fixed(ConnectionState::Unavailable),
        }
    }
}

impl Default for StubBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBridge for StubBridge {
    fn mode(&self) -> BridgeMode {
        BridgeMode::Stub
    }

    fn health(&self) -> &HealthTracker {
        &self.health
    }

    fn get_clients(&self) -> Result<Vec<ClientRecord>, CallError> {
        Ok(GetClients::empty())
    }

    fn get_files(&self) -> Result<Vec<FileRecord>, CallError> {
        Ok(GetFiles::empty())
    }

    fn get_database_info(&self) -> Result<DatabaseInfo, CallError> {
        Ok(GetDatabaseInfo::empty())
    }

    fn get_logs(&self) -> Result<Vec<LogEntry>, CallError> {
        Ok(GetLogs::empty())
    }

    fn get_server_status(&self) -> Result<ServerStatus, CallError> {
        Ok(GetServerStatus::empty())
    }

    fn get_recent_activity(&self) -> Result<Vec<ActivityItem>, CallError> {
        Ok(GetRecentActivity::empty())
    }

    fn disconnect_client(&self, client_id: &str) -> Result<bool, CallError> {
        tracing::debug!("Stub bridge ignoring disconnect for client {}", client_id);
        Ok(false)
    }

    fn delete_client(&self, client_id: &str) -> Result<bool, CallError> {
        tracing::debug!("Stub bridge ignoring delete for client {}", client_id);
        Ok(false)
    }

    fn is_connected(&self) -> Result<bool, CallError> {
        Ok(false)
    }
}
