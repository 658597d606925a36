// Server Console - Dashboard client for the backup server
//
// This is the library crate containing the data bridge, the worker dispatch
// and fetch layer, and the presentation state. The binary crate (main.rs)
// provides the console entry point.

pub mod bridge;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod ui;

// Re-export commonly used types for convenience
pub use bridge::{BridgeMode, ConnectionState, DataBridge, SharedBridge, select_bridge};
pub use config::ConfigManager;
pub use error::CallError;
pub use metrics::Metrics;
pub use models::{AppConfig, BridgeSettings, DashboardState};
pub use services::{CallResult, Debouncer, Fetcher, SafeCaller, WorkerDispatch};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
