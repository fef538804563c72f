//! Output Poller
//!
//! While an evaluation runs, the server buffers whatever the sandboxed
//! program prints. The poller drains that buffer into the output panel, one
//! poll exchange at a time, until the evaluation it is tailing finishes.
//!
//! Each cycle dispatches a fresh exchange and waits for it, so at most one
//! poll is ever in flight. The stop condition is checked after every cycle:
//! once the evaluation is no longer pending, no further cycle starts.
//!
//! The server holds an empty poll for a few seconds before answering, so the
//! loop does not pause between successful cycles. Failed polls back off
//! exponentially, and enough failures in a row end the sequence early.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::decode_remote_text;
use crate::session::SessionToken;
use crate::surface::DisplaySurface;
use crate::transport::{Endpoint, Exchange, ExchangeObserver, HttpTransport};

/// Poller tuning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollerConfig {
    /// Failed polls in a row before giving up on the sequence
    pub max_consecutive_failures: u32,
    /// Delay after the first failed poll
    pub retry_base_delay: Duration,
    /// Upper bound on the delay between failed polls
    pub retry_max_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_millis(4000),
        }
    }
}

/// What one poll sequence did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Poll exchanges dispatched
    pub cycles: u32,
    /// Non-empty chunks appended to the display
    pub chunks: u32,
    /// Poll exchanges that failed
    pub failures: u32,
    /// Whether the sequence gave up while the evaluation was still pending
    pub stopped_early: bool,
}

/// Drains buffered output for one evaluation
#[derive(Clone)]
pub struct OutputPoller {
    transport: Arc<dyn HttpTransport>,
    token: SessionToken,
    output: Arc<dyn DisplaySurface>,
    config: PollerConfig,
}

impl OutputPoller {
    /// Create a poller appending to `output`
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        token: SessionToken,
        output: Arc<dyn DisplaySurface>,
        config: PollerConfig,
    ) -> Self {
        Self {
            transport,
            token,
            output,
            config,
        }
    }

    /// Poll until `evaluation` is no longer pending.
    ///
    /// Always runs at least one cycle.
    pub async fn run(self, mut evaluation: ExchangeObserver) -> PollSummary {
        let mut summary = PollSummary::default();
        let mut consecutive_failures: u32 = 0;

        tracing::debug!(evaluation = %evaluation.id(), "Output poller started");

        loop {
            summary.cycles += 1;
            let exchange = Exchange::dispatch(
                Arc::clone(&self.transport),
                Endpoint::Output.kind(),
                Endpoint::Output.request(Some(&self.token), None),
            );

            match exchange.complete().await {
                Ok(body) => {
                    consecutive_failures = 0;
                    let chunk = decode_remote_text(&body);
                    tracing::trace!(cycle = summary.cycles, bytes = chunk.len(), "Poll cycle");
                    if !chunk.is_empty() {
                        self.output.append_text(&chunk);
                        summary.chunks += 1;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    summary.failures += 1;
                    tracing::warn!(
                        cycle = summary.cycles,
                        attempt = consecutive_failures,
                        error = %e,
                        "Poll failed"
                    );

                    if consecutive_failures >= self.config.max_consecutive_failures {
                        summary.stopped_early = evaluation.is_pending();
                        break;
                    }

                    // Retry backoff doubles per failed attempt up to the cap,
                    // and ends as soon as the evaluation finishes.
                    let exponent = (consecutive_failures - 1).min(16);
                    let backoff = self
                        .config
                        .retry_base_delay
                        .saturating_mul(1u32 << exponent)
                        .min(self.config.retry_max_delay);
                    tokio::select! {
                        () = tokio::time::sleep(backoff) => {}
                        () = evaluation.wait_terminal() => {}
                    }
                }
            }

            if !evaluation.is_pending() {
                break;
            }
        }

        if summary.stopped_early {
            tracing::warn!(
                evaluation = %evaluation.id(),
                failures = summary.failures,
                "Output poller gave up"
            );
        } else {
            tracing::debug!(
                evaluation = %evaluation.id(),
                cycles = summary.cycles,
                chunks = summary.chunks,
                "Output poller stopped"
            );
        }

        summary
    }
}
