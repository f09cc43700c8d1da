// Scripted transport for exercising the request layer without a network

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Replays queued responses in order and records every request it sees
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, status: u16, body: impl Into<String>) {
        let status = StatusCode::from_u16(status).expect("valid status code");
        self.enqueue(Ok(HttpResponse::new(status, body)));
    }

    pub fn push_with_header(&self, status: u16, name: &'static str, value: &str, body: impl Into<String>) {
        let status = StatusCode::from_u16(status).expect("valid status code");
        let mut response = HttpResponse::new(status, body);
        response.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).expect("valid header value"),
        );
        self.enqueue(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        self.enqueue(Err(error));
    }

    fn enqueue(&self, item: Result<HttpResponse, TransportError>) {
        self.responses
            .lock()
            .expect("transport lock poisoned")
            .push_back(item);
    }

    /// Every request sent so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("transport lock poisoned").clone()
    }

    /// Number of requests whose URL contains `needle`
    pub fn count_matching(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url.contains(needle))
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        self.requests
            .lock()
            .expect("transport lock poisoned")
            .push(request);
        self.responses
            .lock()
            .expect("transport lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other(format!("no scripted response for {}", url))))
    }
}
