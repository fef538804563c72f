//! Console Session
//!
//! A [`ConsoleSession`] is the explicitly constructed context for one page's
//! worth of console: the session token, the transport, the collaborators and
//! the components built on them (key bindings, submission controller, log
//! fetcher). Components receive what they need from it at construction and
//! share nothing else.
//!
//! The token either comes from configuration or is acquired from the server
//! with [`acquire_session`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::bindings::KeyBindingManager;
use crate::config::ConsoleConfig;
use crate::controller::{Submission, SubmissionController, SubmissionOutcome};
use crate::error::ConsoleError;
use crate::events::ConsoleEvent;
use crate::insert::{insert_files, DelimiterMode, InsertPosition, InsertReport};
use crate::log::{LogFetcher, LogView};
use crate::poller::OutputPoller;
use crate::surface::{DisplaySurface, EditorWidget, SubmitControl};
use crate::transport::{Endpoint, Exchange, HttpTransport};

// =============================================================================
// Session Token
// =============================================================================

/// Opaque identifier of the user's sandbox, sent as the query string
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Validate a token
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError::InvalidToken` for an empty token or one with
    /// anything but ASCII letters, digits and `-._~`. Those are the only
    /// characters a client sends in a query string without escaping them.
    pub fn new(token: impl Into<String>) -> Result<Self, ConsoleError> {
        let token = token.into();
        let unreserved = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~');
        if token.is_empty() || !token.chars().all(unreserved) {
            return Err(ConsoleError::InvalidToken(token));
        }
        Ok(Self(token))
    }

    /// Token text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the token from the session script (`var g_user_id = 123;`)
///
/// # Errors
///
/// Returns `ConsoleError::SessionAcquisition` unless the body is exactly
/// that assignment with a decimal identifier.
pub fn parse_session_script(body: &str) -> Result<SessionToken, ConsoleError> {
    let malformed = || ConsoleError::SessionAcquisition(format!("unexpected session script {body:?}"));

    let rest = body.trim().strip_prefix("var").ok_or_else(malformed)?;
    if !rest.starts_with(char::is_whitespace) {
        return Err(malformed());
    }
    let rest = rest
        .trim_start()
        .strip_prefix("g_user_id")
        .ok_or_else(malformed)?
        .trim_start()
        .strip_prefix('=')
        .ok_or_else(malformed)?;
    let rest = rest.trim_end();
    let id = rest.strip_suffix(';').unwrap_or(rest).trim();

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    SessionToken::new(id)
}

/// Ask the server for a new sandbox and return its token
///
/// # Errors
///
/// Returns the transport failure, or `SessionAcquisition` if the reply is
/// not a session script.
pub async fn acquire_session(transport: Arc<dyn HttpTransport>) -> Result<SessionToken, ConsoleError> {
    let exchange = Exchange::dispatch(
        transport,
        Endpoint::Session.kind(),
        Endpoint::Session.request(None, None),
    );
    let body = exchange.complete().await?;
    let token = parse_session_script(&body)?;
    tracing::info!(session = %token, "Acquired session");
    Ok(token)
}

// =============================================================================
// Session Context
// =============================================================================

/// The collaborators a session drives
#[derive(Clone)]
pub struct SessionCollaborators {
    /// Code editor
    pub editor: Arc<dyn EditorWidget>,
    /// Submit button and call-arguments field
    pub control: Arc<dyn SubmitControl>,
    /// Output panel
    pub output: Arc<dyn DisplaySurface>,
    /// Log panel
    pub log: Arc<dyn DisplaySurface>,
}

/// Everything one console instance works with
pub struct ConsoleSession {
    token: SessionToken,
    collaborators: SessionCollaborators,
    controller: SubmissionController,
    log_fetcher: LogFetcher,
}

impl ConsoleSession {
    /// Build the session's components and perform the initial key bind
    pub fn new(
        token: SessionToken,
        transport: Arc<dyn HttpTransport>,
        collaborators: SessionCollaborators,
        config: &ConsoleConfig,
        events: mpsc::Sender<ConsoleEvent>,
    ) -> Self {
        let bindings = Arc::new(KeyBindingManager::new(
            Arc::clone(&collaborators.editor),
            Arc::clone(&collaborators.control),
            events,
        ));
        let poller = OutputPoller::new(
            Arc::clone(&transport),
            token.clone(),
            Arc::clone(&collaborators.output),
            config.poller.clone(),
        );
        let controller = SubmissionController::new(
            Arc::clone(&transport),
            token.clone(),
            Arc::clone(&collaborators.output),
            bindings,
            poller,
            config.ordering,
        );
        let log_fetcher = LogFetcher::new(transport, token.clone(), Arc::clone(&collaborators.log));

        tracing::debug!(session = %token, ordering = ?config.ordering, "Console session created");

        Self {
            token,
            collaborators,
            controller,
            log_fetcher,
        }
    }

    /// Session token
    #[must_use]
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Whether a submission would be accepted now
    #[must_use]
    pub fn is_submit_enabled(&self) -> bool {
        self.controller.is_submit_enabled()
    }

    /// Snapshot the editor text and call arguments
    #[must_use]
    pub fn capture_submission(&self) -> Submission {
        Submission::new(
            self.collaborators.editor.current_text(),
            self.collaborators.control.call_args(),
        )
    }

    /// Submit whatever is in the editor now
    ///
    /// # Errors
    ///
    /// Returns `SubmissionInFlight` if an evaluation is already running.
    pub async fn submit_current(&self) -> Result<SubmissionOutcome, ConsoleError> {
        self.controller.submit(self.capture_submission()).await
    }

    /// Fetch and render the session log
    ///
    /// # Errors
    ///
    /// See [`LogFetcher::fetch_log`].
    pub async fn fetch_log(&self) -> Result<LogView, ConsoleError> {
        self.log_fetcher.fetch_log().await
    }

    /// Insert a snippet at the editor cursor
    pub fn insert_snippet(&self, text: &str) {
        self.collaborators.editor.insert_text(text, None);
    }

    /// Insert local files into the editor
    pub async fn insert_files(
        &self,
        paths: &[PathBuf],
        position: InsertPosition,
        mode: DelimiterMode,
    ) -> InsertReport {
        insert_files(self.collaborators.editor.as_ref(), paths, position, mode).await
    }
}
