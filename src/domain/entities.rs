//! Domain Entities - Outbound request/response model
//!
//! These are the values that flow through the transport stack. Bodies are
//! fully buffered so every retry attempt re-sends identical bytes.

use crate::domain::errors::TransportError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use std::borrow::Cow;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

/// An outbound HTTP request.
///
/// `url` is optional so that a request without a target can be represented
/// and rejected by the transport with a descriptive error instead of a panic.
#[derive(Debug, Clone, Default)]
pub struct OutboundRequest {
    /// HTTP method
    pub method: Method,
    /// Target URL (absent means the request cannot be executed)
    pub url: Option<Url>,
    /// Request headers
    pub headers: HeaderMap,
    /// Query parameters appended to `url` at send time
    pub query: Vec<(String, String)>,
    /// Buffered request body
    pub body: Bytes,
    /// Per-call cancellation; cancelling short-circuits any retry loop
    pub cancellation: Option<CancellationToken>,
}

impl OutboundRequest {
    /// Create a request, parsing `url` eagerly.
    pub fn new(method: Method, url: &str) -> Result<Self, TransportError> {
        let parsed = Url::parse(url)
            .map_err(|e| TransportError::InvalidRequest(format!("invalid url {:?}: {}", url, e)))?;
        Ok(Self::from_url(method, parsed))
    }

    /// Create a request from an already parsed URL.
    pub fn from_url(method: Method, url: Url) -> Self {
        Self {
            method,
            url: Some(url),
            ..Self::default()
        }
    }

    pub fn get(url: &str) -> Result<Self, TransportError> {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self, TransportError> {
        Self::new(Method::POST, url)
    }

    pub fn put(url: &str) -> Result<Self, TransportError> {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: &str) -> Result<Self, TransportError> {
        Self::new(Method::DELETE, url)
    }

    /// Set a header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set a header from strings, validating both name and value.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, TransportError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("invalid value for header {}: {}", name, e)))?;
        Ok(self.header(name, value))
    }

    /// Set the `Authorization` header.
    pub fn authorization(self, value: &str) -> Result<Self, TransportError> {
        self.try_header(AUTHORIZATION.as_str(), value)
    }

    /// Apply the JSON defaults: `Accept: */*` and `Content-Type: application/json`.
    pub fn json_defaults(self) -> Self {
        self.header(ACCEPT, HeaderValue::from_static("*/*"))
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Replace the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a cancellation token for this call.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Whether the attached cancellation token (if any) has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// The final URL including query parameters.
    pub fn target(&self) -> Result<Url, TransportError> {
        let mut url = self.url.clone().ok_or(TransportError::MissingUrl)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Why a single attempt was considered failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The server answered with a retryable status
    Status(StatusCode),
    /// The transport failed before a response was received
    Transport(String),
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Status(status) => write!(f, "unexpected status {}", status),
            AttemptFailure::Transport(err) => write!(f, "{}", err),
        }
    }
}

/// One failed, non-final attempt inside a retry loop.
///
/// Created per iteration and handed to the retry observer; never stored.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-indexed attempt number
    pub number: u32,
    /// What went wrong
    pub failure: AttemptFailure,
    /// When the attempt finished
    pub at: SystemTime,
}

impl Attempt {
    pub fn new(number: u32, failure: AttemptFailure) -> Self {
        Self {
            number,
            failure,
            at: SystemTime::now(),
        }
    }
}
