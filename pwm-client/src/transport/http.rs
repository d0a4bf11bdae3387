//! reqwest-based HTTP(S) transport.

use super::{Endpoint, HttpReply, Timeouts, Transport, TransportError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// HTTP transport backed by a shared `reqwest::Client` (rustls).
///
/// reqwest fixes the connect timeout per client, so the client is rebuilt
/// only when a request asks for a different connect timeout.
#[derive(Debug, Default)]
pub struct HttpTransport {
    client: Mutex<Option<(Duration, reqwest::Client)>>,
}

impl HttpTransport {
    /// Create a new transport. No connection is made until the first request.
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, connect_timeout: Duration) -> Result<reqwest::Client, TransportError> {
        let mut cached = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((timeout, client)) = cached.as_ref() {
            if *timeout == connect_timeout {
                return Ok(client.clone());
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        *cached = Some((connect_timeout, client.clone()));
        Ok(client)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<HttpReply, TransportError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Body(e.to_string())
            }
        })?;

        tracing::trace!(url = %url, status, bytes = body.len(), "http reply");
        Ok(HttpReply::new(status, body.to_vec()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        timeouts: Timeouts,
    ) -> Result<HttpReply, TransportError> {
        let url = parse_url(endpoint, path)?;
        let request = self
            .client(timeouts.connect)?
            .get(url.clone())
            .timeout(timeouts.request);
        self.execute(request, &url).await
    }

    async fn post_json(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: Vec<u8>,
        timeouts: Timeouts,
    ) -> Result<HttpReply, TransportError> {
        let url = parse_url(endpoint, path)?;
        let request = self
            .client(timeouts.connect)?
            .post(url.clone())
            .header(CONTENT_TYPE, pwm_types::CONTENT_TYPE)
            .body(body)
            .timeout(timeouts.request);
        self.execute(request, &url).await
    }
}

fn parse_url(endpoint: &Endpoint, path: &str) -> Result<Url, TransportError> {
    let raw = endpoint.url(path);
    let url = Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(TransportError::InvalidUrl(format!("{raw}: missing host")));
    }
    // A host containing '/', '?' or '#' silently shifts into the path.
    if url.path() != path || url.query().is_some() || url.fragment().is_some() {
        return Err(TransportError::InvalidUrl(format!("{raw}: malformed host")));
    }
    Ok(url)
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::ConnectionFailed(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidUrl(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}
