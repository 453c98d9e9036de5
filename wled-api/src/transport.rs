//! Thin HTTP request executor for a single device endpoint.
//!
//! The transport knows nothing about request semantics: it takes a base
//! address and a `RequestSpec`, performs exactly one HTTP call with a fixed
//! timeout, and normalizes failures into `TransportError`. Coalescing,
//! ordering and retries all live above this layer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, TransportError};

/// Fixed per-request timeout. WLED controllers either answer quickly or not
/// at all, so a short window keeps offline devices from stalling the queue.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP method for a request spec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Description of a single wire request against a device's base address.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestSpec {
    /// GET request for the given path
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// POST request with a JSON body
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Request executor seam.
///
/// The production implementation is `HttpTransport`; tests inject scripted
/// fakes to exercise the coordination layer without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one request against `base_address` ("host:port").
    ///
    /// # Errors
    ///
    /// `TransportError::Unreachable` for connect/timeout failures,
    /// `TransportError::MalformedResponse` for non-2xx statuses and bodies
    /// that are not valid JSON.
    async fn execute(&self, base_address: &str, spec: &RequestSpec) -> Result<Value>;
}

/// reqwest-backed transport with a fixed request timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default 5-second timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::ClientInit(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, base_address: &str, spec: &RequestSpec) -> Result<Value> {
        let url = format!("http://{}{}", base_address, spec.path);

        let request = match spec.method {
            Method::Get => self.client.get(&url),
            Method::Post => {
                let builder = self.client.post(&url);
                match &spec.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::MalformedResponse(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::MalformedResponse(format!("{}: {}", url, e)))
    }
}
