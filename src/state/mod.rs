// State management module
//
// This module provides the StateManager which wraps DashboardState with
// thread-safe access using Arc<RwLock<T>> and emits change events for the view.

use crate::bridge::{BridgeMode, ConnectionState};
use crate::models::DashboardState;
use crate::models::records::{
    ActivityItem, ClientRecord, DatabaseInfo, DatabaseStatus, FileRecord, LogEntry, ServerStatus,
};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Severity of a user-facing notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Success => "success",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        }
    }
}

/// Change events emitted when state is modified
///
/// These events are emitted to notify interested parties (primarily the view)
/// about state changes without requiring them to poll the state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// The session's bridge implementation was chosen
    BridgeSelected {
        mode: BridgeMode,
    },

    /// The bridge's connection state moved
    ConnectionChanged {
        state: ConnectionState,
    },

    /// Client list replaced
    ClientsUpdated {
        total: usize,
        visible: usize,
    },

    FilesUpdated {
        count: usize,
        total_bytes: u64,
    },

    LogsUpdated {
        count: usize,
    },

    DatabaseUpdated {
        status: DatabaseStatus,
    },

    ServerStatusUpdated {
        running: bool,
    },

    ActivityUpdated {
        count: usize,
    },

    /// Client search text changed
    FilterChanged {
        filter: String,
        visible: usize,
    },

    /// A full refresh has started
    RefreshStarted,

    /// A full refresh has finished
    RefreshFinished {
        refresh_count: u64,
    },

    /// Message for the user (action outcomes, connectivity problems)
    Notification {
        level: NotificationLevel,
        message: String,
    },

    /// Dashboard data has been cleared
    StateReset,
}

/// Thread-safe state manager with event emission
///
/// This is the central state management component that:
/// - Provides thread-safe access to [`DashboardState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// # Usage
///
/// Always use `StateManager` instead of accessing [`DashboardState`] directly:
/// - [`read()`](Self::read) for reading individual fields
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
///
/// # Related Types
///
/// - [`crate::models::DashboardState`]: The underlying state structure
/// - [`StateChange`]: Event types emitted on state mutations
/// - [`crate::ui::controller::DashboardController`]: Applies bridge results here
/// - [`crate::ui::view::ConsoleView`]: Renders the emitted events
pub struct StateManager {
    /// The dashboard state protected by RwLock for thread-safe access
    state: Arc<RwLock<DashboardState>>,

    /// Broadcast channel for emitting state change events
    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with default state
    ///
    /// # Returns
    /// A new StateManager with a broadcast channel buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(DashboardState::default())),
            state_tx,
        }
    }

    /// Get a read-only snapshot of the current state
    ///
    /// This clones the entire state, so it's safe to use without holding locks.
    pub fn snapshot(&self) -> DashboardState {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let (connected, _, _) = state_manager.read(|state| state.client_counts());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&DashboardState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// This is the primary way to modify state. It:
    /// 1. Captures the old state
    /// 2. Applies the update function
    /// 3. Detects what changed
    /// 4. Emits appropriate events
    ///
    /// # Returns
    /// A vector of StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut DashboardState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = self.detect_changes(&old_state, &state);

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    ///
    /// Returns a receiver that will get notified of all future state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Detect what changed between two states and generate events
    fn detect_changes(&self, old: &DashboardState, new: &DashboardState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.bridge_mode != new.bridge_mode {
            changes.push(StateChange::BridgeSelected { mode: new.bridge_mode });
        }

        if old.connection != new.connection {
            changes.push(StateChange::ConnectionChanged { state: new.connection });
        }

        if old.is_refreshing != new.is_refreshing {
            if new.is_refreshing {
                changes.push(StateChange::RefreshStarted);
            } else {
                changes.push(StateChange::RefreshFinished {
                    refresh_count: new.refresh_count,
                });
            }
        }

        if old.clients != new.clients {
            changes.push(StateChange::ClientsUpdated {
                total: new.clients.len(),
                visible: new.visible_clients.len(),
            });
        }

        if old.client_filter != new.client_filter {
            changes.push(StateChange::FilterChanged {
                filter: new.client_filter.clone(),
                visible: new.visible_clients.len(),
            });
        }

        if old.files != new.files {
            changes.push(StateChange::FilesUpdated {
                count: new.files.len(),
                total_bytes: new.total_file_bytes(),
            });
        }

        if old.logs != new.logs {
            changes.push(StateChange::LogsUpdated { count: new.logs.len() });
        }

        if old.database != new.database {
            changes.push(StateChange::DatabaseUpdated {
                status: new.database.status,
            });
        }

        if old.server != new.server {
            changes.push(StateChange::ServerStatusUpdated {
                running: new.server.running,
            });
        }

        if old.activity != new.activity {
            changes.push(StateChange::ActivityUpdated {
                count: new.activity.len(),
            });
        }

        changes
    }

    // Convenience methods for common state updates

    /// Record the bridge chosen for this session
    pub fn set_bridge(&self, mode: BridgeMode, connection: ConnectionState) -> Vec<StateChange> {
        self.update(|state| {
            state.bridge_mode = mode;
            state.connection = connection;
        })
    }

    pub fn set_connection(&self, connection: ConnectionState) -> Vec<StateChange> {
        self.update(|state| state.connection = connection)
    }

    pub fn apply_clients(&self, clients: Vec<ClientRecord>) -> Vec<StateChange> {
        self.update(|state| state.set_clients(clients))
    }

    pub fn apply_files(&self, files: Vec<FileRecord>) -> Vec<StateChange> {
        self.update(|state| state.files = files)
    }

    pub fn apply_logs(&self, logs: Vec<LogEntry>) -> Vec<StateChange> {
        self.update(|state| state.logs = logs)
    }

    pub fn apply_database(&self, database: DatabaseInfo) -> Vec<StateChange> {
        self.update(|state| state.database = database)
    }

    pub fn apply_server_status(&self, server: ServerStatus) -> Vec<StateChange> {
        self.update(|state| state.server = server)
    }

    pub fn apply_activity(&self, activity: Vec<ActivityItem>) -> Vec<StateChange> {
        self.update(|state| state.activity = activity)
    }

    /// Set the client search text and recompute the visible clients
    pub fn set_client_filter(&self, filter: &str) -> Vec<StateChange> {
        self.update(|state| state.set_client_filter(filter))
    }

    /// Mark a full refresh as running
    pub fn start_refresh(&self) -> Vec<StateChange> {
        self.update(|state| state.is_refreshing = true)
    }

    /// Mark the running refresh as done
    pub fn finish_refresh(&self) -> Vec<StateChange> {
        self.update(|state| {
            state.is_refreshing = false;
            state.refresh_count += 1;
        })
    }

    /// Emit a notification for the user
    ///
    /// Notifications do not touch the state; they are only broadcast.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) -> StateChange {
        let event = StateChange::Notification {
            level,
            message: message.into(),
        };
        let _ = self.state_tx.send(event.clone());
        event
    }

    /// Drop all dashboard data, keeping the bridge selection
    pub fn reset_data(&self) -> Vec<StateChange> {
        let mut changes = self.update(|state| state.clear_data());

        // Emit a reset event
        let reset_event = StateChange::StateReset;
        let _ = self.state_tx.send(reset_event.clone());
        changes.push(reset_event);

        changes
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Make StateManager cloneable for sharing across threads
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
