//! Transport Traits
//!
//! The console only ever needs one primitive from the network: issue a
//! request with a method, path, query, headers and body, and get the complete
//! response back. Everything above this trait (exchanges, polling, logging)
//! is transport-agnostic, which is what lets tests script the server.

use async_trait::async_trait;
use thiserror::Error;

/// Content type sent with every console request
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Errors that can occur while exchanging a request with the server
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not reach the server
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request could not be sent
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The response body could not be read
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// The configured request timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as received
        body: String,
    },

    /// The HTTP client could not be constructed
    #[error("Client setup failed: {0}")]
    ClientSetup(String),

    /// The task driving an exchange ended without producing a response
    #[error("Exchange task failed: {0}")]
    TaskFailed(String),
}

/// HTTP method
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl HttpMethod {
    /// Method name as it appears on the wire
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A single request to the sandbox server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method
    pub method: HttpMethod,
    /// Absolute path on the server (e.g. `/getOutput`)
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query: Option<String>,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Option<String>,
}

impl HttpRequest {
    /// Create a request with no query, headers or body
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Set the raw query string
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Path followed by `?query` when a query is present
    #[must_use]
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Look up a header value (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A complete response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// A `200 OK` response with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response primitive used by every exchange
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Transport name for logging
    fn name(&self) -> &str;

    /// Issue a request and wait for the complete response.
    ///
    /// A non-success status is still a response; classifying it is up to
    /// the caller.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
