// Typed descriptors for the bridge operation catalogue
//
// Each descriptor ties an operation name to its argument type, its payload
// type and its empty value. Fetchers are built from descriptors, so a
// fallback of the wrong shape does not compile.

use super::DataBridge;
use crate::error::CallError;
use crate::models::records::{
    ActivityItem, ClientRecord, DatabaseInfo, FileRecord, LogEntry, ServerStatus,
};

/// One named remote operation of a [`DataBridge`]
pub trait BridgeOperation: Send + Sync + 'static {
    /// Operation name used for logging, metrics and endpoint lookup
    const NAME: &'static str;

    type Args: Send + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Perform the operation against `bridge`. May block.
    fn invoke(bridge: &dyn DataBridge, args: Self::Args) -> Result<Self::Output, CallError>;

    /// The value shown when the operation cannot produce real data
    fn empty() -> Self::Output;
}

pub struct GetClients;
pub struct GetFiles;
pub struct GetDatabaseInfo;
pub struct GetLogs;
pub struct GetServerStatus;
pub struct GetRecentActivity;
pub struct DisconnectClient;
pub struct DeleteClient;
pub struct IsConnected;

impl BridgeOperation for GetClients {
    const NAME: &'static str = "get_clients";
    type Args = ();
    type Output = Vec<ClientRecord>;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.get_clients()
    }

    fn empty() -> Self::Output {
        Vec::new()
    }
}

impl BridgeOperation for GetFiles {
    const NAME: &'static str = "get_files";
    type Args = ();
    type Output = Vec<FileRecord>;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.get_files()
    }

    fn empty() -> Self::Output {
        Vec::new()
    }
}

impl BridgeOperation for GetDatabaseInfo {
    const NAME: &'static str = "get_database_info";
    type Args = ();
    type Output = DatabaseInfo;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.get_database_info()
    }

    fn empty() -> Self::Output {
        DatabaseInfo::disconnected()
    }
}

impl BridgeOperation for GetLogs {
    const NAME: &'static str = "get_logs";
    type Args = ();
    type Output = Vec<LogEntry>;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.get_logs()
    }

    fn empty() -> Self::Output {
        Vec::new()
    }
}

impl BridgeOperation for GetServerStatus {
    const NAME: &'static str = "get_server_status";
    type Args = ();
    type Output = ServerStatus;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.get_server_status()
    }

    fn empty() -> Self::Output {
        ServerStatus::stopped()
    }
}

impl BridgeOperation for GetRecentActivity {
    const NAME: &'static str = "get_recent_activity";
    type Args = ();
    type Output = Vec<ActivityItem>;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.get_recent_activity()
    }

    fn empty() -> Self::Output {
        Vec::new()
    }
}

impl BridgeOperation for DisconnectClient {
    const NAME: &'static str = "disconnect_client";
    type Args = String;
    type Output = bool;

    fn invoke(bridge: &dyn DataBridge, client_id: String) -> Result<Self::Output, CallError> {
        bridge.disconnect_client(&client_id)
    }

    fn empty() -> Self::Output {
        false
    }
}

impl BridgeOperation for DeleteClient {
    const NAME: &'static str = "delete_client";
    type Args = String;
    type Output = bool;

    fn invoke(bridge: &dyn DataBridge, client_id: String) -> Result<Self::Output, CallError> {
        bridge.delete_client(&client_id)
    }

    fn empty() -> Self::Output {
        false
    }
}

impl BridgeOperation for IsConnected {
    const NAME: &'static str = "is_connected";
    type Args = ();
    type Output = bool;

    fn invoke(bridge: &dyn DataBridge, _: ()) -> Result<Self::Output, CallError> {
        bridge.is_connected()
    }

    fn empty() -> Self::Output {
        false
    }
}
