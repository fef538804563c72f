//! Console Errors
//!
//! Each layer has its own error type (`TransportError`, `LogDecodeError`,
//! `ConfigError`, `InsertError`); [`ConsoleError`] is what the public
//! operations return.

use thiserror::Error;

use crate::config::ConfigError;
use crate::insert::InsertError;
use crate::log::LogDecodeError;
use crate::transport::TransportError;

/// Errors returned by console operations
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// A submission was requested while another evaluation is in flight
    #[error("A submission is already in flight")]
    SubmissionInFlight,

    /// An exchange with the sandbox server failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session log could not be decoded
    #[error(transparent)]
    LogDecode(#[from] LogDecodeError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A local file could not be inserted
    #[error(transparent)]
    Insert(#[from] InsertError),

    /// The server did not hand out a usable session
    #[error("Session acquisition failed: {0}")]
    SessionAcquisition(String),

    /// A session token contains characters that cannot travel in a query string
    #[error("Invalid session token {0:?}")]
    InvalidToken(String),
}
