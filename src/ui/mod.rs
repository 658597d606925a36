// UI module - dashboard logic and UI loop bridge
//
// This module contains:
// - EventLoopBridge: Coordinates between the worker runtime and the single-threaded UI loop
// - DashboardController: Wires the bridging layer to presentation state
// - ConsoleView: Text rendering of the dashboard

pub mod bridge;
pub mod controller;
pub mod view;

pub use bridge::{EventLoopBridge, EventLoopBridgeHandle, ViewRef};
pub use controller::{DashboardController, RefreshSummary};
pub use view::ConsoleView;
