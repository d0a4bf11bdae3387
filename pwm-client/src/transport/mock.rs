//! Mock transport for testing.
//!
//! Replies are queued per path and handed out in order. Every request is
//! recorded for later inspection.

use super::{Endpoint, HttpReply, Timeouts, Transport, TransportError};
use async_trait::async_trait;
use pwm_types::WireMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// `"GET"` or `"POST"`.
    pub method: &'static str,
    /// Target endpoint.
    pub endpoint: Endpoint,
    /// Server path.
    pub path: String,
    /// JSON body for POST requests.
    pub body: Option<Vec<u8>>,
    /// Timeouts the caller asked for.
    pub timeouts: Timeouts,
}

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one handle while the client owns
/// another.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    replies: HashMap<String, VecDeque<Result<HttpReply, TransportError>>>,
    requests: Vec<RecordedRequest>,
    fail_next: Option<TransportError>,
}

impl MockTransport {
    /// Create a new mock transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a raw reply for the next request to `path`.
    pub fn queue_reply(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.lock()
            .replies
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(HttpReply::new(status, body)));
    }

    /// Queue a 200 reply carrying an encoded wire message.
    pub fn queue_message<M: WireMessage>(&self, path: &str, message: &M) {
        let body = message.to_bytes().unwrap_or_default();
        self.queue_reply(path, 200, body);
    }

    /// Queue a transport error for the next request to `path`.
    pub fn queue_error(&self, path: &str, error: TransportError) {
        self.lock()
            .replies
            .entry(path.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Cause the next request, whatever its path, to fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.lock().fail_next = Some(error);
    }

    /// All requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Paths requested so far, oldest first.
    pub fn paths(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.path.clone()).collect()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Body of the last request to `path`, if any.
    pub fn last_body(&self, path: &str) -> Option<Vec<u8>> {
        self.lock()
            .requests
            .iter()
            .rev()
            .find(|r| r.path == path)
            .and_then(|r| r.body.clone())
    }

    /// Clear all state (queued replies and recorded requests).
    pub fn reset(&self) {
        *self.lock() = MockTransportInner::default();
    }

    fn respond(&self, request: RecordedRequest) -> Result<HttpReply, TransportError> {
        let mut inner = self.lock();
        let path = request.path.clone();
        inner.requests.push(request);

        // Check for forced failure
        if let Some(error) = inner.fail_next.take() {
            return Err(error);
        }

        inner
            .replies
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TransportError::ConnectionFailed(format!(
                    "no reply queued for {path}"
                )))
            })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        timeouts: Timeouts,
    ) -> Result<HttpReply, TransportError> {
        self.respond(RecordedRequest {
            method: "GET",
            endpoint: endpoint.clone(),
            path: path.to_string(),
            body: None,
            timeouts,
        })
    }

    async fn post_json(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: Vec<u8>,
        timeouts: Timeouts,
    ) -> Result<HttpReply, TransportError> {
        self.respond(RecordedRequest {
            method: "POST",
            endpoint: endpoint.clone(),
            path: path.to_string(),
            body: Some(body),
            timeouts,
        })
    }
}
