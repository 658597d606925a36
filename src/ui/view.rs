// Console view
//
// Renders dashboard state changes as text lines. It lives on the UI loop and
// is only touched by loop tasks.

use crate::models::DashboardState;
use crate::state::{NotificationLevel, StateChange};
use std::collections::VecDeque;

/// Number of rendered lines kept for inspection
const HISTORY_LIMIT: usize = 200;

/// Number of notifications kept, oldest dropped first
const NOTIFICATION_LIMIT: usize = 50;

/// Text rendering of the dashboard
pub struct ConsoleView {
    history: VecDeque<String>,
    notifications: VecDeque<(NotificationLevel, String)>,
    echo: bool,
}

impl ConsoleView {
    /// `echo` prints every rendered line to stdout as well
    pub fn new(echo: bool) -> Self {
        Self {
            history: VecDeque::new(),
            notifications: VecDeque::new(),
            echo,
        }
    }

    /// Render one change against the state it produced
    pub fn apply(&mut self, change: &StateChange, state: &DashboardState) {
        let line = match change {
            StateChange::BridgeSelected { mode } => format!("Bridge: {:?}", mode),
            StateChange::ConnectionChanged { state } => format!("Connection: {}", state.label()),
            StateChange::ClientsUpdated { total, visible } => {
                let (connected, registered, offline) = state.client_counts();
                format!(
                    "Clients: {} ({} shown) - {} connected, {} registered, {} offline",
                    total, visible, connected, registered, offline
                )
            }
            StateChange::FilesUpdated { count, total_bytes } => {
                format!("Files: {} ({})", count, human_bytes(*total_bytes))
            }
            StateChange::LogsUpdated { count } => format!("Logs: {} entries", count),
            StateChange::DatabaseUpdated { .. } => format!(
                "Database: {:?}, {} tables, {} records, {}",
                state.database.status,
                state.database.table_count,
                state.database.record_count,
                state.database.size_human
            ),
            StateChange::ServerStatusUpdated { running } => {
                if *running {
                    format!(
                        "Server: running on port {} for {}, {} transfers, {} stored",
                        state.server.port,
                        state.server.uptime_human,
                        state.server.total_transfers,
                        state.server.storage_used_human
                    )
                } else {
                    "Server: stopped".to_string()
                }
            }
            StateChange::ActivityUpdated { count } => match state.activity.first() {
                Some(latest) => format!("Activity: {} items, latest {} {}", count, latest.time, latest.text),
                None => "Activity: none".to_string(),
            },
            StateChange::FilterChanged { filter, visible } => {
                if filter.is_empty() {
                    format!("Filter cleared ({} clients)", visible)
                } else {
                    format!("Filter '{}': {} clients", filter, visible)
                }
            }
            StateChange::RefreshStarted => "Refreshing...".to_string(),
            StateChange::RefreshFinished { refresh_count } => {
                format!("Refresh #{} done", refresh_count)
            }
            StateChange::Notification { level, message } => {
                if self.notifications.len() == NOTIFICATION_LIMIT {
                    self.notifications.pop_front();
                }
                self.notifications.push_back((*level, message.clone()));
                format!("[{}] {}", level.label(), message)
            }
            StateChange::StateReset => "Dashboard cleared".to_string(),
        };

        self.push_line(line);
    }

    /// One-paragraph summary of the whole dashboard
    pub fn summary(state: &DashboardState) -> String {
        let (connected, registered, offline) = state.client_counts();
        format!(
            "{:?} bridge ({}): {} clients ({}/{}/{}), {} files ({}), {} log entries, server {}",
            state.bridge_mode,
            state.connection.label(),
            state.clients.len(),
            connected,
            registered,
            offline,
            state.files.len(),
            human_bytes(state.total_file_bytes()),
            state.logs.len(),
            if state.server.running { "running" } else { "stopped" }
        )
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    pub fn last_line(&self) -> Option<&str> {
        self.history.back().map(String::as_str)
    }

    pub fn notifications(&self) -> &VecDeque<(NotificationLevel, String)> {
        &self.notifications
    }

    fn push_line(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ConnectionState;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0), "0 B");
        assert_eq!(human_bytes(1536), "1.5 KB");
        assert_eq!(human_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_notifications_are_kept() {
        let mut view = ConsoleView::new(false);
        let state = DashboardState::default();

        view.apply(
            &StateChange::Notification {
                level: NotificationLevel::Error,
                message: "Could not delete client abc".to_string(),
            },
            &state,
        );

        assert_eq!(view.notifications().len(), 1);
        assert_eq!(view.last_line(), Some("[error] Could not delete client abc"));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut view = ConsoleView::new(false);
        let state = DashboardState::default();

        for _ in 0..(HISTORY_LIMIT + 10) {
            view.apply(&StateChange::RefreshStarted, &state);
        }

        assert_eq!(view.history().count(), HISTORY_LIMIT);
    }

    #[test]
    fn test_notifications_are_bounded() {
        let mut view = ConsoleView::new(false);
        let state = DashboardState::default();

        for i in 0..(NOTIFICATION_LIMIT + 5) {
            view.apply(
                &StateChange::Notification {
                    level: NotificationLevel::Info,
                    message: format!("Refresh {} failed", i),
                },
                &state,
            );
        }

        assert_eq!(view.notifications().len(), NOTIFICATION_LIMIT);
        assert_eq!(view.notifications()[0].1, "Refresh 5 failed");
    }

    #[test]
    fn test_summary_mentions_connection() {
        let state = DashboardState {
            connection: ConnectionState::Degraded,
            ..DashboardState::default()
        };

        let summary = ConsoleView::summary(&state);
        assert!(summary.starts_with("Stub bridge (degraded)"));
        assert!(summary.contains("server stopped"));
    }
}
