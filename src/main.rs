//! Server Console - Dashboard client for the backup server
//!
//! Main entry point for the console application.
//!
//! # Overview
//!
//! This binary crate renders the backup server dashboard as text. It initializes:
//! - Configuration loading ([`ConfigManager`]) from `console.yaml` and `CONSOLE_*` variables
//! - Logging infrastructure (file rotation + console output)
//! - Tokio worker runtime whose blocking pool runs bridge calls ([`WorkerDispatch`])
//! - The data bridge, live or stub, chosen once at startup ([`select_bridge`])
//! - A current-thread UI loop owning the view ([`EventLoopBridge`])
//!
//! The application uses a hybrid threading model:
//! - **Main thread**: Runs the UI loop (current-thread runtime + `LocalSet`)
//! - **Tokio workers**: Run blocking bridge calls, bounded by `max_concurrent_calls`
//!
//! # Execution Flow
//!
//! 1. Load configuration from the config directory (first argument, default `config/`)
//! 2. Initialize logging → `logs/server-console.<date>`
//! 3. Create the worker runtime and dispatcher
//! 4. Select the bridge (probe the server when `mode: auto`)
//! 5. Create the controller and attach the console view
//! 6. Refresh every `refresh_interval_secs` until Ctrl+C
//! 7. Close the view, shut down the worker runtime with a 5s timeout

use anyhow::{Context, Result};
use server_console::bridge::{Endpoints, HttpTransport, Transport};
use server_console::ui::{ConsoleView, DashboardController, EventLoopBridge};
use server_console::{
    APP_NAME, ConfigManager, Metrics, SafeCaller, StateManager, VERSION, WorkerDispatch,
    select_bridge,
};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_CONFIG_DIR: &str = "config";

fn main() -> Result<()> {
    let config_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());

    let config_manager = ConfigManager::new(config_dir.as_str())?;
    let config = config_manager.load()?;

    // Must be held for the whole run to keep the file writer flushing
    let _log_guard = server_console::logging::init_from_settings(&config.logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    if !config_manager.has_config_file() {
        tracing::warn!(
            "Config file not found at {}, using defaults",
            config_manager.config_path()
        );
    }
    tracing::info!(
        "Loaded configuration: server={}, mode={:?}",
        config.bridge.server_url,
        config.bridge.mode
    );

    if config_manager.write_default_if_missing()? {
        tracing::info!("Wrote default configuration to {}", config_manager.config_path());
    }

    let settings = &config.bridge;

    // Worker runtime: its blocking pool executes bridge calls
    let worker_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(settings.worker_threads.max(1))
        .thread_name("console-worker")
        .build()
        .context("Failed to build worker runtime")?;

    tracing::info!(
        "Worker runtime initialized with {} worker threads",
        settings.worker_threads.max(1)
    );

    let metrics = Arc::new(Metrics::new());
    let dispatch = WorkerDispatch::new(
        worker_runtime.handle().clone(),
        settings.max_concurrent_calls,
        settings.max_queue_depth,
    )
    .with_metrics(Arc::clone(&metrics));

    // Kept alive until both runtimes are gone; the blocking client must not be
    // dropped on a runtime thread
    let endpoints = Endpoints::with_overrides(&settings.endpoints);
    let transport = Arc::new(HttpTransport::new(
        &settings.server_url,
        settings.request_timeout(),
        &endpoints,
    )?);
    let shared_transport: Arc<dyn Transport> = transport.clone();

    let bridge = worker_runtime.block_on(select_bridge(settings, shared_transport, &dispatch));
    let caller = SafeCaller::new(dispatch.clone(), settings.call_timeout(), Arc::clone(&metrics));

    // UI loop: current-thread runtime driving the view's LocalSet
    let ui_runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build UI runtime")?;

    let event_loop = EventLoopBridge::with_metrics(ConsoleView::new(true), Arc::clone(&metrics));
    let state = StateManager::new();
    let controller = DashboardController::new(&caller, bridge, state.clone(), settings);
    let _view_task = controller.attach_view(&event_loop);

    let refresh_interval = settings.refresh_interval();
    let refresher = controller.clone();
    event_loop.spawn_local(move |_view| async move {
        let mut ticker = tokio::time::interval(refresh_interval);
        loop {
            ticker.tick().await;
            match refresher.refresh_all().await.value() {
                Some(summary) if summary.failed > 0 => tracing::warn!(
                    "{} of {} reads failed, first error: {:?}",
                    summary.failed,
                    summary.requested,
                    summary.first_error
                ),
                Some(_) => {}
                None => tracing::debug!("Refresh skipped, previous refresh still settling"),
            }
            refresher.check_connection().await;
        }
    });

    tracing::info!(
        "Dashboard running against {} (refresh every {:?}), press Ctrl+C to exit",
        settings.server_url,
        settings.refresh_interval()
    );

    let signal = event_loop.block_on(&ui_runtime, tokio::signal::ctrl_c());
    if let Err(e) = signal {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }

    // Clean up after the view closes
    tracing::info!("Shutting down");

    if let Some(view) = event_loop.close_view() {
        println!("{}", ConsoleView::summary(&state.snapshot()));
        tracing::info!(
            "View closed with {} notifications",
            view.notifications().len()
        );
    }

    controller.close();
    metrics.log_summary();
    dispatch.close();

    drop(event_loop);
    drop(controller);
    drop(caller);
    ui_runtime.shutdown_timeout(Duration::from_secs(1));
    worker_runtime.shutdown_timeout(Duration::from_secs(5));

    drop(transport);
    tracing::info!("Application shutdown complete");

    Ok(())
}
