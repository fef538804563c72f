//! Console Messages
//!
//! Notifications from the console event loop back to whoever drives it.
//! Panels already show results as they arrive; these messages exist for
//! drivers that need to know when an operation is over (the terminal
//! surface exits after its submission finishes, tests assert on them).

use crate::controller::SubmissionOutcome;

/// Messages from the console to its driver
#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleMessage {
    /// A submission ran to a terminal state
    SubmissionFinished(SubmissionOutcome),

    /// A submit request arrived while another evaluation was in flight
    SubmissionRejected,

    /// The session log was fetched and rendered
    LogRendered {
        /// Number of log entries shown
        entries: usize,
    },

    /// An operation failed before producing a result
    OperationFailed {
        /// Which operation
        operation: &'static str,
        /// Error description
        error: String,
    },
}
