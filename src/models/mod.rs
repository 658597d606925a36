//! Data models for the server console.
//!
//! - [`records`]: Domain records returned by the backup server (clients, files, logs, status)
//! - [`config`]: Settings loaded from `console.yaml` and the environment
//! - [`DashboardState`]: Presentation state owned by the UI loop
//!
//! The bridge treats records as opaque payloads; it only relies on each
//! operation having a well-defined empty value (see [`DatabaseInfo::disconnected`]
//! and [`ServerStatus::stopped`]).

pub mod config;
pub mod dashboard;
pub mod records;

pub use config::{AppConfig, BridgeModeSetting, BridgeSettings, LoggingSettings};
pub use dashboard::DashboardState;
pub use records::{
    ActivityItem, ActivityKind, ClientRecord, ClientStatus, DatabaseInfo, DatabaseStatus,
    FileRecord, Identified, LogEntry, ServerStatus,
};
