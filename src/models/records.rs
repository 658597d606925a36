use serde::{Deserialize, Serialize};

/// Records that carry a stable identifier.
///
/// Views use the identifier to reconcile a freshly fetched list against the
/// rows they already display.
pub trait Identified {
    fn record_id(&self) -> &str;
}

/// Connection status of a backup client as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientStatus {
    Connected,
    Registered,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub address: String,
    pub status: ClientStatus,
    pub connected_at: String,
    pub last_activity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub uploaded_at: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub status: DatabaseStatus,
    pub table_count: u64,
    pub record_count: u64,
    pub size_human: String,
}

impl DatabaseInfo {
    /// The value shown when the database cannot be queried.
    pub fn disconnected() -> Self {
        Self {
            status: DatabaseStatus::Disconnected,
            table_count: 0,
            record_count: 0,
            size_human: "0 B".to_string(),
        }
    }
}

impl Default for DatabaseInfo {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub component: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub running: bool,
    pub port: u16,
    pub uptime_human: String,
    pub total_transfers: u64,
    pub active_clients: u64,
    pub total_files: u64,
    pub storage_used_human: String,
}

impl ServerStatus {
    /// The value shown when the server cannot be reached.
    pub fn stopped() -> Self {
        Self {
            running: false,
            port: 0,
            uptime_human: "0s".to_string(),
            total_transfers: 0,
            active_clients: 0,
            total_files: 0,
            storage_used_human: "0 B".to_string(),
        }
    }
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self::stopped()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Success,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub time: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
}

impl Identified for ClientRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Identified for FileRecord {
    fn record_id(&self) -> &str {
        &self.id
    }
}

impl Identified for LogEntry {
    fn record_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_record_wire_format() {
        let json = r#"{
            "id": "c-1",
            "address": "10.0.0.4:51022",
            "status": "Registered",
            "connectedAt": "2024-05-01 10:00:00",
            "lastActivity": "2024-05-01 10:05:00"
        }"#;

        let record: ClientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.status, ClientStatus::Registered);
        assert_eq!(record.record_id(), "c-1");
    }

    #[test]
    fn test_activity_kind_uses_type_field() {
        let json = r#"{"time": "10:00", "text": "Backup finished", "type": "success"}"#;
        let item: ActivityItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, ActivityKind::Success);
    }

    #[test]
    fn test_empty_values() {
        let db = DatabaseInfo::default();
        assert_eq!(db.status, DatabaseStatus::Disconnected);
        assert_eq!(db.table_count, 0);

        let status = ServerStatus::default();
        assert!(!status.running);
        assert_eq!(status.active_clients, 0);
    }
}
