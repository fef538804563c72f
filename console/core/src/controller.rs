//! Submission Controller
//!
//! Runs one submission end to end:
//!
//! ```text
//! try_begin_submission ──► clear output ──► dispatch Evaluate ─┬─► await result
//!                                                              └─► OutputPoller
//!                          rebind ◄── append result ◄── join poller
//! ```
//!
//! The Submit-Enabled gate lives in [`KeyBindingManager`]; the controller
//! takes it with a single atomic check, so a stray duplicate call is
//! rejected without touching the display or the network.
//!
//! Submission is re-enabled only after the poller for this submission has
//! stopped, so two poll sequences never overlap.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bindings::KeyBindingManager;
use crate::codec::{decode_remote_text, escape_html, form_body};
use crate::error::ConsoleError;
use crate::poller::{OutputPoller, PollSummary};
use crate::session::SessionToken;
use crate::surface::DisplaySurface;
use crate::transport::{Endpoint, Exchange, HttpTransport, TransportError};

/// Code and call arguments captured when the user submits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    code: String,
    call_args: String,
}

impl Submission {
    /// Capture a submission
    pub fn new(code: impl Into<String>, call_args: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            call_args: call_args.into(),
        }
    }

    /// Submitted code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Submitted call arguments
    #[must_use]
    pub fn call_args(&self) -> &str {
        &self.call_args
    }

    /// Form body for the evaluate endpoint
    #[must_use]
    pub fn encode_body(&self) -> String {
        form_body(&[("user_code", &self.code), ("user_callargs", &self.call_args)])
    }
}

/// Where the evaluation result lands relative to polled chunks
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputOrdering {
    /// After every polled chunk of the submission
    #[default]
    ResultLast,
    /// Whenever the evaluation response arrives
    Arrival,
}

impl FromStr for OutputOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "result-last" | "result_last" => Ok(Self::ResultLast),
            "arrival" => Ok(Self::Arrival),
            other => Err(format!(
                "unknown output ordering {other:?} (expected \"result-last\" or \"arrival\")"
            )),
        }
    }
}

/// Terminal state of a submission's evaluation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// The server answered; `result` is the escaped text that was displayed
    Completed {
        /// Decoded and escaped result
        result: String,
    },
    /// The evaluation exchange failed
    Failed {
        /// Transport failure
        error: TransportError,
    },
}

/// Everything one submission produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// How the evaluation ended
    pub status: SubmissionStatus,
    /// What the poller did meanwhile
    pub poll: PollSummary,
}

impl SubmissionOutcome {
    /// Whether the evaluation completed
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, SubmissionStatus::Completed { .. })
    }
}

/// Issues evaluations and coordinates their output poller
pub struct SubmissionController {
    transport: Arc<dyn HttpTransport>,
    token: SessionToken,
    output: Arc<dyn DisplaySurface>,
    bindings: Arc<KeyBindingManager>,
    poller: OutputPoller,
    ordering: OutputOrdering,
}

impl SubmissionController {
    /// Create a controller
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        token: SessionToken,
        output: Arc<dyn DisplaySurface>,
        bindings: Arc<KeyBindingManager>,
        poller: OutputPoller,
        ordering: OutputOrdering,
    ) -> Self {
        Self {
            transport,
            token,
            output,
            bindings,
            poller,
            ordering,
        }
    }

    /// Whether a new submission would be accepted
    #[must_use]
    pub fn is_submit_enabled(&self) -> bool {
        self.bindings.is_enabled()
    }

    /// Run a submission to completion.
    ///
    /// A transport failure is not an error here: it is reported on the
    /// output panel and in the returned outcome, and submission is enabled
    /// again.
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError::SubmissionInFlight` if another evaluation has
    /// not finished yet. Nothing else happens in that case.
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionOutcome, ConsoleError> {
        if !self.bindings.try_begin_submission() {
            tracing::warn!("Submit rejected, an evaluation is in flight");
            return Err(ConsoleError::SubmissionInFlight);
        }

        self.output.clear();
        self.output.set_visible(true);

        let exchange = Exchange::dispatch(
            Arc::clone(&self.transport),
            Endpoint::Evaluate.kind(),
            Endpoint::Evaluate.request(Some(&self.token), Some(submission.encode_body())),
        );
        let evaluation_id = exchange.id();
        tracing::info!(
            exchange_id = %evaluation_id,
            session = %self.token,
            code_bytes = submission.code().len(),
            "Submission started"
        );

        let poll_task = tokio::spawn(self.poller.clone().run(exchange.observer()));

        let (status, rendered) = match exchange.complete().await {
            Ok(body) => {
                let result = decode_remote_text(&body);
                (
                    SubmissionStatus::Completed {
                        result: result.clone(),
                    },
                    result,
                )
            }
            Err(error) => {
                tracing::warn!(exchange_id = %evaluation_id, error = %error, "Evaluation failed");
                let rendered = escape_html(&format!("[evaluation failed: {error}]")).into_owned();
                (SubmissionStatus::Failed { error }, rendered)
            }
        };

        if self.ordering == OutputOrdering::Arrival {
            self.append(&rendered);
        }

        let poll = match poll_task.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(exchange_id = %evaluation_id, error = %e, "Output poller task failed");
                PollSummary::default()
            }
        };

        if self.ordering == OutputOrdering::ResultLast {
            self.append(&rendered);
        }

        self.bindings.bind_submit_shortcut();

        tracing::info!(
            exchange_id = %evaluation_id,
            poll_cycles = poll.cycles,
            poll_chunks = poll.chunks,
            success = matches!(status, SubmissionStatus::Completed { .. }),
            "Submission finished"
        );

        Ok(SubmissionOutcome { status, poll })
    }

    fn append(&self, text: &str) {
        if !text.is_empty() {
            self.output.append_text(text);
        }
    }
}
