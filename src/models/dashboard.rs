use crate::bridge::{BridgeMode, ConnectionState};
use crate::models::records::{
    ActivityItem, ClientRecord, ClientStatus, DatabaseInfo, FileRecord, LogEntry, ServerStatus,
};

/// Presentation state of the dashboard.
///
/// Only tasks running on the UI loop mutate this, always through
/// [`StateManager`](crate::state::StateManager). Bridge results are applied
/// here after they have been marshalled back from the worker pool.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardState {
    // Bridge
    pub bridge_mode: BridgeMode,
    pub connection: ConnectionState,

    // Data
    pub clients: Vec<ClientRecord>,
    pub files: Vec<FileRecord>,
    pub logs: Vec<LogEntry>,
    pub database: DatabaseInfo,
    pub server: ServerStatus,
    pub activity: Vec<ActivityItem>,

    // Client search box
    pub client_filter: String,
    pub visible_clients: Vec<ClientRecord>,

    // Refresh bookkeeping
    pub is_refreshing: bool,
    pub refresh_count: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            bridge_mode: BridgeMode::Stub,
            connection: ConnectionState::Unknown,
            clients: Vec::new(),
            files: Vec::new(),
            logs: Vec::new(),
            database: DatabaseInfo::disconnected(),
            server: ServerStatus::stopped(),
            activity: Vec::new(),
            client_filter: String::new(),
            visible_clients: Vec::new(),
            is_refreshing: false,
            refresh_count: 0,
        }
    }
}

impl DashboardState {
    /// Replace the client list and recompute the filtered view.
    pub fn set_clients(&mut self, clients: Vec<ClientRecord>) {
        self.clients = clients;
        self.apply_client_filter();
    }

    /// Set the search text and recompute the filtered view.
    pub fn set_client_filter(&mut self, filter: &str) {
        self.client_filter = filter.trim().to_string();
        self.apply_client_filter();
    }

    fn apply_client_filter(&mut self) {
        let needle = self.client_filter.to_lowercase();
        self.visible_clients = if needle.is_empty() {
            self.clients.clone()
        } else {
            self.clients
                .iter()
                .filter(|c| {
                    c.id.to_lowercase().contains(&needle)
                        || c.address.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect()
        };
    }

    /// Number of clients per status, in (connected, registered, offline) order.
    pub fn client_counts(&self) -> (usize, usize, usize) {
        self.clients
            .iter()
            .fold((0, 0, 0), |(c, r, o), client| match client.status {
                ClientStatus::Connected => (c + 1, r, o),
                ClientStatus::Registered => (c, r + 1, o),
                ClientStatus::Offline => (c, r, o + 1),
            })
    }

    /// Total bytes across all listed files.
    pub fn total_file_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Drop every fetched record, keeping bridge information and the filter.
    pub fn clear_data(&mut self) {
        self.clients.clear();
        self.visible_clients.clear();
        self.files.clear();
        self.logs.clear();
        self.activity.clear();
        self.database = DatabaseInfo::disconnected();
        self.server = ServerStatus::stopped();
    }
}
