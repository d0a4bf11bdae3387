//! Transport abstraction for the sync protocol.
//!
//! The protocol needs exactly two request shapes against the configured
//! server:
//! - `get()` for `GET /ping`
//! - `post_json()` for `POST /sync` and `POST /confirm`
//!
//! Both return the raw status and body; interpreting them is the client's
//! job. Implementations: [`HttpTransport`] (reqwest) and [`MockTransport`]
//! (queued replies, for tests).

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::{MockTransport, RecordedRequest};

use async_trait::async_trait;
use pwm_types::SyncConfig;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint and path do not form a valid URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be built.
    #[error("client build failed: {0}")]
    Build(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect or read timeout.
    #[error("request timed out")]
    Timeout,

    /// Request failed after connecting.
    #[error("request failed: {0}")]
    Request(String),

    /// Reading the response body failed.
    #[error("reading body failed: {0}")]
    Body(String),
}

/// URL scheme for the sync server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scheme {
    /// TLS (the default).
    #[default]
    Https,
    /// Plain HTTP, for local servers and tests.
    Http,
}

impl Scheme {
    /// Scheme as it appears in a URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scheme {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "https" => Ok(Self::Https),
            "http" => Ok(Self::Http),
            other => Err(TransportError::InvalidUrl(format!("unsupported scheme {other:?}"))),
        }
    }
}

/// Where the sync server lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// URL scheme.
    pub scheme: Scheme,
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    /// Endpoint for a stored sync config.
    pub fn from_config(scheme: Scheme, config: &SyncConfig) -> Self {
        Self::new(scheme, config.server_host.clone(), config.server_port)
    }

    /// Full URL for a server path such as `/ping`.
    pub fn url(&self, path: &str) -> String {
        format!("{self}{path}")
    }

    /// The host as it appears in a URL; IPv6 literals get brackets.
    fn url_host(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.url_host(), self.port)
    }
}

/// Per-request time limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Limit for establishing the connection.
    pub connect: Duration,
    /// Limit for the whole request, including reading the body.
    pub request: Duration,
}

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpReply {
    /// Create a reply.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is exactly 200; the protocol accepts nothing else.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Transport trait for the sync protocol's HTTP round trips.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET {endpoint}{path}`.
    async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        timeouts: Timeouts,
    ) -> Result<HttpReply, TransportError>;

    /// `POST {endpoint}{path}` with a JSON body.
    async fn post_json(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: Vec<u8>,
        timeouts: Timeouts,
    ) -> Result<HttpReply, TransportError>;
}
