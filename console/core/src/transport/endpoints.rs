//! Sandbox Server Endpoints
//!
//! | Endpoint | Method | Path |
//! |---|---|---|
//! | Evaluate | POST | `/` |
//! | Output buffer | GET | `/getOutput` |
//! | Session log | GET | `/getLog` |
//! | New session | GET | `/js/tr_repy_user.js` |
//!
//! The session token is the whole query string (`/getLog?12345`), not a
//! key/value pair: the server compares the raw query against its sessions.

use super::exchange::ExchangeKind;
use super::traits::{HttpMethod, HttpRequest, FORM_CONTENT_TYPE};
use crate::session::SessionToken;

/// An endpoint of the sandbox server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// Run submitted code
    Evaluate,
    /// Read whatever output has buffered since the last read
    Output,
    /// Read the session's execution history
    Log,
    /// Create a sandbox and receive its token
    Session,
}

impl Endpoint {
    /// Request method
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Evaluate => HttpMethod::Post,
            Self::Output | Self::Log | Self::Session => HttpMethod::Get,
        }
    }

    /// Request path
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Evaluate => "/",
            Self::Output => "/getOutput",
            Self::Log => "/getLog",
            Self::Session => "/js/tr_repy_user.js",
        }
    }

    /// Exchange kind used when dispatching this endpoint
    #[must_use]
    pub fn kind(&self) -> ExchangeKind {
        match self {
            Self::Evaluate => ExchangeKind::Evaluate,
            Self::Output => ExchangeKind::Poll,
            Self::Log => ExchangeKind::Log,
            Self::Session => ExchangeKind::Session,
        }
    }

    /// Build a request for this endpoint
    #[must_use]
    pub fn request(&self, token: Option<&SessionToken>, body: Option<String>) -> HttpRequest {
        let mut request = HttpRequest::new(self.method(), self.path())
            .with_header("Content-Type", FORM_CONTENT_TYPE);
        if let Some(token) = token {
            request = request.with_query(token.as_str());
        }
        if let Some(body) = body {
            request = request.with_body(body);
        }
        request
    }
}
