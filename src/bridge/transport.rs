// Transport seam between the live bridge and the backup server
//
// Any transport that can answer the request table below is substitutable:
// the HTTP transport here, an in-process fake in tests, or a local IPC
// client. Transports are synchronous and may block; they are only ever
// invoked from worker threads via the SafeCaller.

use crate::error::CallError;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// A resolved request for one bridge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub operation: &'static str,
    pub method: Method,
    pub path: String,
}

/// Blocking transport used by [`LiveBridge`](super::LiveBridge)
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Execute a request and return the decoded JSON body.
    fn send(&self, request: &Request) -> Result<serde_json::Value, CallError>;

    /// Cheap reachability check used once when the bridge is selected.
    fn probe(&self) -> Result<(), CallError>;
}

/// Endpoint table keyed by operation name.
///
/// Paths may contain an `{id}` placeholder, replaced by the percent-encoded
/// client id.
#[derive(Debug, Clone)]
pub struct Endpoints {
    routes: IndexMap<&'static str, (Method, String)>,
}

impl Endpoints {
    /// Default routes, with path overrides from configuration applied.
    ///
    /// Overrides for unknown operation names are ignored with a warning.
    pub fn with_overrides(overrides: &IndexMap<String, String>) -> Self {
        let mut endpoints = Self::default();
        for (operation, path) in overrides {
            match endpoints.routes.get_mut(operation.as_str()) {
                Some(route) => route.1 = path.clone(),
                None => tracing::warn!("Ignoring endpoint override for unknown operation '{}'", operation),
            }
        }
        endpoints
    }

    /// Build the request for `operation`, filling in `id` where the path needs one.
    pub fn request(&self, operation: &'static str, id: Option<&str>) -> Result<Request, CallError> {
        let (method, template) = self
            .routes
            .get(operation)
            .ok_or_else(|| CallError::Protocol(format!("no endpoint for operation '{}'", operation)))?;

        let path = match id {
            Some(id) => template.replace("{id}", &urlencoding::encode(id)),
            None => template.clone(),
        };

        Ok(Request {
            operation,
            method: *method,
            path,
        })
    }

    pub fn path(&self, operation: &str) -> Option<&str> {
        self.routes.get(operation).map(|(_, path)| path.as_str())
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        let mut routes = IndexMap::new();
        routes.insert("get_clients", (Method::Get, "/api/clients".to_string()));
        routes.insert("get_files", (Method::Get, "/api/files".to_string()));
        routes.insert("get_database_info", (Method::Get, "/api/database".to_string()));
        routes.insert("get_logs", (Method::Get, "/api/logs".to_string()));
        routes.insert("get_server_status", (Method::Get, "/api/status".to_string()));
        routes.insert("get_recent_activity", (Method::Get, "/api/activity".to_string()));
        routes.insert(
            "disconnect_client",
            (Method::Post, "/api/clients/{id}/disconnect".to_string()),
        );
        routes.insert("delete_client", (Method::Delete, "/api/clients/{id}".to_string()));
        routes.insert("is_connected", (Method::Get, "/api/health".to_string()));
        Self { routes }
    }
}

/// HTTP transport backed by a blocking reqwest client.
///
/// The blocking client must not be dropped from inside an async context;
/// the binary keeps one handle alive until both runtimes have shut down.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: Url,
    timeout: Duration,
    probe_path: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration, endpoints: &Endpoints) -> Result<Self> {
        // Url::join replaces the last segment unless the base ends with '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url =
            Url::parse(&normalized).with_context(|| format!("Invalid server URL: {}", base_url))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            timeout,
            probe_path: endpoints.path("is_connected").unwrap_or("/api/health").to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url, CallError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CallError::Protocol(format!("invalid path '{}': {}", path, e)))
    }

    fn map_error(&self, err: reqwest::Error) -> CallError {
        if err.is_timeout() {
            CallError::Timeout(self.timeout)
        } else if err.is_decode() {
            CallError::Protocol(err.to_string())
        } else {
            CallError::Transport(err.to_string())
        }
    }

    fn execute(&self, method: Method, path: &str) -> Result<reqwest::blocking::Response, CallError> {
        let url = self.url_for(path)?;
        let builder = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };

        let response = builder.send().map_err(|e| self.map_error(e))?;
        let status = response.status();

        if status.is_server_error() {
            return Err(CallError::Transport(format!("server returned HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(CallError::Protocol(format!("unexpected HTTP {}", status)));
        }

        Ok(response)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<serde_json::Value, CallError> {
        tracing::debug!(operation = request.operation, path = %request.path, "HTTP request");

        let response = self.execute(request.method, &request.path)?;
        response
            .json::<serde_json::Value>()
            .map_err(|e| CallError::Protocol(e.to_string()))
    }

    fn probe(&self) -> Result<(), CallError> {
        self.execute(Method::Get, &self.probe_path).map(|_| ())
    }
}
