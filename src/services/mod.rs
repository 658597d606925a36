//! Services module - the bridging layer between the UI loop and the data bridge.
//!
//! Everything here is framework-agnostic: no view code, only the machinery
//! that moves blocking bridge calls off the UI loop and turns their failures
//! into values.
//!
//! # Components
//!
//! - [`WorkerDispatch`]: runs blocking closures on the worker runtime's
//!   blocking pool with a bounded number of concurrent calls and a bounded
//!   wait queue.
//!
//! - [`SafeCaller`]: the single choke point for bridge calls. Applies the call
//!   timeout, catches panics and errors, returns a [`CallResult`] and records
//!   the outcome on the bridge's health tracker.
//!
//! - [`Fetcher`]: a reusable accessor for one operation with a fallback value
//!   fixed at construction. Never fails.
//!
//! - [`Debouncer`]: per-key debouncing and in-flight coalescing, usable
//!   directly or as combinators wrapping a fetcher.
//!
//! # Usage Example
//!
//! ```ignore
//! use server_console::bridge::operations::GetClients;
//!
//! let caller = SafeCaller::new(dispatch, settings.call_timeout(), metrics);
//! let clients = caller.make_default_fetcher::<GetClients>();
//!
//! let refresh = debouncer.debounced("clients", settings.refresh_debounce(), {
//!     let bridge = bridge.clone();
//!     move || {
//!         let clients = clients.clone();
//!         let bridge = bridge.clone();
//!         async move { clients.get(&bridge).await }
//!     }
//! });
//!
//! if let Some(list) = refresh().await.value() {
//!     // render list
//! }
//! ```

pub mod debounce;
pub mod dispatch;
pub mod fetch;
pub mod safe_call;

pub use debounce::{Debounced, Debouncer};
pub use dispatch::WorkerDispatch;
pub use fetch::{Fetched, Fetcher};
pub use safe_call::{CallResult, SafeCaller};
