// HTTP transport abstraction
// The request layer only needs "send a request, get status/headers/body back"

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;

use crate::error::{NeutronError, Result, TransportError};

/// Outgoing HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set a header, rejecting values that cannot travel on the wire
    pub fn insert_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value)
            .map_err(|_| NeutronError::InvalidHeader(name.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Response as seen by the request layer
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Minimal transport contract used by the token manager and the executor
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production transport backed by a pooled reqwest client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a new transport
    pub fn new(connect_timeout: u64, request_timeout: u64, insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| NeutronError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| classify(e, &url))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| classify(e, &url))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest failure onto the transport error kinds
fn classify(e: reqwest::Error, url: &str) -> TransportError {
    let error_kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_body() || e.is_decode() {
        "body_error"
    } else {
        "unknown"
    };

    tracing::warn!(
        error_kind = error_kind,
        error = %e,
        url = %url,
        "HTTP request error"
    );

    match error_kind {
        "timeout" => TransportError::Timeout(e.to_string()),
        "connection_failed" => TransportError::Connect(e.to_string()),
        _ => TransportError::Other(e.to_string()),
    }
}
