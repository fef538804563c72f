//! Exchanges
//!
//! An [`Exchange`] is one request/response pair in flight. Dispatching it
//! spawns exactly one task on the runtime; the handle is owned by whoever
//! dispatched it and is consumed by [`Exchange::complete`], so every
//! exchange reports its outcome exactly once.
//!
//! Other parties may watch an exchange through an [`ExchangeObserver`],
//! which can read the completion state but never change it. This is how the
//! output poller learns that the evaluation it is tailing has finished.
//!
//! There is no cancellation: dropping the handle detaches the task, it does
//! not abort the request.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::traits::{HttpRequest, HttpTransport, TransportError};

/// Identifier of a dispatched exchange, unique within the process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl ExchangeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xchg-{}", self.0)
    }
}

/// What an exchange is for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Run a submission
    Evaluate,
    /// Fetch buffered output of the running evaluation
    Poll,
    /// Fetch the session log
    Log,
    /// Acquire a new session
    Session,
}

impl ExchangeKind {
    /// Short label for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Poll => "poll",
            Self::Log => "log",
            Self::Session => "session",
        }
    }
}

/// Completion state of an exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExchangeState {
    /// Request sent, no response yet
    Pending,
    /// A success response arrived
    Completed,
    /// The exchange failed and will never complete
    Failed(TransportError),
}

impl ExchangeState {
    /// Whether no terminal state has been reached
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A single request/response pair in flight
pub struct Exchange {
    id: ExchangeId,
    kind: ExchangeKind,
    state_rx: watch::Receiver<ExchangeState>,
    task: JoinHandle<Result<String, TransportError>>,
}

impl Exchange {
    /// Send `request` through `transport` on a new task.
    ///
    /// A non-success status is turned into `TransportError::Status` so that
    /// every transport reports failures the same way.
    pub fn dispatch(
        transport: Arc<dyn HttpTransport>,
        kind: ExchangeKind,
        request: HttpRequest,
    ) -> Self {
        let id = ExchangeId::next();
        let (state_tx, state_rx) = watch::channel(ExchangeState::Pending);

        tracing::debug!(
            exchange_id = %id,
            kind = kind.label(),
            method = request.method.as_str(),
            path = %request.path,
            transport = transport.name(),
            "Dispatching exchange"
        );

        let task = tokio::spawn(async move {
            let result = match transport.execute(request).await {
                Ok(response) if response.is_success() => Ok(response.body),
                Ok(response) => Err(TransportError::Status {
                    status: response.status,
                    body: response.body,
                }),
                Err(e) => Err(e),
            };

            let terminal = match &result {
                Ok(_) => ExchangeState::Completed,
                Err(e) => ExchangeState::Failed(e.clone()),
            };
            // The state flips before the result is handed back, so anyone
            // holding the result also sees a terminal state.
            state_tx.send_replace(terminal);

            result
        });

        Self {
            id,
            kind,
            state_rx,
            task,
        }
    }

    /// Exchange identifier
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Exchange kind
    #[must_use]
    pub fn kind(&self) -> ExchangeKind {
        self.kind
    }

    /// Read-only view of this exchange's completion state
    #[must_use]
    pub fn observer(&self) -> ExchangeObserver {
        ExchangeObserver {
            id: self.id,
            rx: self.state_rx.clone(),
        }
    }

    /// Wait for the response and return its body
    ///
    /// # Errors
    ///
    /// Returns the transport failure, a `Status` error for non-success
    /// responses, or `TaskFailed` if the driving task died.
    pub async fn complete(self) -> Result<String, TransportError> {
        let result = match self.task.await {
            Ok(result) => result,
            Err(e) => Err(TransportError::TaskFailed(e.to_string())),
        };

        match &result {
            Ok(body) => tracing::debug!(
                exchange_id = %self.id,
                kind = self.kind.label(),
                bytes = body.len(),
                "Exchange completed"
            ),
            Err(e) => tracing::debug!(
                exchange_id = %self.id,
                kind = self.kind.label(),
                error = %e,
                "Exchange failed"
            ),
        }

        result
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

/// Read-only view of an exchange's completion state
#[derive(Clone, Debug)]
pub struct ExchangeObserver {
    id: ExchangeId,
    rx: watch::Receiver<ExchangeState>,
}

impl ExchangeObserver {
    /// Identifier of the observed exchange
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ExchangeState {
        self.rx.borrow().clone()
    }

    /// Whether the exchange is still waiting for its response.
    ///
    /// A task that died without reporting closes the channel; that counts as
    /// finished so nobody waits on it forever.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.rx.borrow().is_pending() && self.rx.has_changed().is_ok()
    }

    /// Resolve once the exchange is no longer pending
    pub async fn wait_terminal(&mut self) {
        while self.is_pending() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
