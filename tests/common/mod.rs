//! Shared fixtures for integration tests
//!
//! `FakeTransport` stands in for the backup server. It answers from a table
//! of canned JSON bodies and can be switched into a failing or slow mode at
//! any point during a test.

#![allow(dead_code)]

use serde_json::{Value, json};
use server_console::bridge::{
    Endpoints, HealthThresholds, LiveBridge, Request, SharedBridge, Transport,
};
use server_console::error::CallError;
use server_console::{Metrics, SafeCaller, WorkerDispatch};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeTransport {
    responses: Mutex<HashMap<&'static str, Value>>,
    requests: Mutex<Vec<Request>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
}

impl FakeTransport {
    /// A server with one connected client and one uploaded file
    pub fn healthy() -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            "get_clients",
            json!([
                {
                    "id": "abc",
                    "address": "10.0.0.2",
                    "status": "Connected",
                    "connectedAt": "2026-10-16 09:00:00",
                    "lastActivity": "2026-10-16 09:05:00"
                },
                {
                    "id": "def",
                    "address": "10.0.0.3",
                    "status": "Offline",
                    "connectedAt": "2026-10-15 18:00:00",
                    "lastActivity": "2026-10-15 18:30:00"
                }
            ]),
        );
        responses.insert(
            "get_files",
            json!([
                {
                    "id": "f1",
                    "filename": "photos.tar",
                    "sizeBytes": 2048,
                    "uploadedAt": "2026-10-16 09:04:00",
                    "clientId": "abc"
                }
            ]),
        );
        responses.insert(
            "get_database_info",
            json!({
                "status": "Connected",
                "tableCount": 4,
                "recordCount": 120,
                "sizeHuman": "1.2 MB"
            }),
        );
        responses.insert(
            "get_logs",
            json!([
                {
                    "id": "l1",
                    "timestamp": "2026-10-16 09:04:01",
                    "level": "INFO",
                    "component": "transfer",
                    "message": "photos.tar stored"
                }
            ]),
        );
        responses.insert(
            "get_server_status",
            json!({
                "running": true,
                "port": 1256,
                "uptimeHuman": "2h 5m",
                "totalTransfers": 17,
                "activeClients": 1,
                "totalFiles": 1,
                "storageUsedHuman": "2.0 KB"
            }),
        );
        responses.insert(
            "get_recent_activity",
            json!([
                { "time": "09:04", "text": "photos.tar uploaded", "type": "success" }
            ]),
        );
        responses.insert("disconnect_client", json!({ "success": true }));
        responses.insert("delete_client", json!({ "success": true }));
        responses.insert("is_connected", json!({ "connected": true }));

        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// A server that refuses every connection
    pub fn unreachable() -> Self {
        let transport = Self::healthy();
        transport.set_failing(true);
        transport
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn respond(&self, operation: &'static str, body: Value) {
        self.responses.lock().unwrap().insert(operation, body);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &Request) -> Result<Value, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(CallError::Transport("connection refused".to_string()));
        }

        self.responses
            .lock()
            .unwrap()
            .get(request.operation)
            .cloned()
            .ok_or_else(|| CallError::Protocol(format!("no response for {}", request.operation)))
    }

    fn probe(&self) -> Result<(), CallError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CallError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Live bridge over `transport` with the default 1/1 thresholds
pub fn live_bridge(transport: &Arc<FakeTransport>) -> SharedBridge {
    let transport: Arc<dyn Transport> = transport.clone();
    Arc::new(LiveBridge::new(
        transport,
        Endpoints::default(),
        HealthThresholds::default(),
    ))
}

/// SafeCaller on the current runtime's blocking pool
pub fn caller(call_timeout: Duration) -> (SafeCaller, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let dispatch = WorkerDispatch::new(tokio::runtime::Handle::current(), 4, 32)
        .with_metrics(Arc::clone(&metrics));
    (
        SafeCaller::new(dispatch, call_timeout, Arc::clone(&metrics)),
        metrics,
    )
}

/// Collects formatted log output in memory
///
/// Install with `tracing::subscriber::set_default(capture.subscriber())` to
/// record everything logged on the current thread at `WARN` and above.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish()
    }

    pub fn lines(&self) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
