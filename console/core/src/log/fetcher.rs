//! Log fetching

use std::sync::Arc;

use super::{decode_log, LogView};
use crate::codec::escape_html;
use crate::error::ConsoleError;
use crate::session::SessionToken;
use crate::surface::DisplaySurface;
use crate::transport::{Endpoint, Exchange, HttpTransport};

/// Fetches the session log and renders it on the log panel
pub struct LogFetcher {
    transport: Arc<dyn HttpTransport>,
    token: SessionToken,
    log: Arc<dyn DisplaySurface>,
}

impl LogFetcher {
    /// Create a fetcher rendering onto `log`
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        token: SessionToken,
        log: Arc<dyn DisplaySurface>,
    ) -> Self {
        Self {
            transport,
            token,
            log,
        }
    }

    /// Fetch and render the log.
    ///
    /// Independent of submissions: it may run while an evaluation is pending.
    ///
    /// # Errors
    ///
    /// Returns the transport or decode failure after writing an escaped
    /// description of it to the log panel.
    pub async fn fetch_log(&self) -> Result<LogView, ConsoleError> {
        self.log.clear();
        self.log.set_visible(true);

        let exchange = Exchange::dispatch(
            Arc::clone(&self.transport),
            Endpoint::Log.kind(),
            Endpoint::Log.request(Some(&self.token), None),
        );

        let decoded = match exchange.complete().await {
            Ok(body) => decode_log(&body).map_err(ConsoleError::from),
            Err(e) => Err(ConsoleError::from(e)),
        };

        match decoded {
            Ok(view) => {
                for line in view.render() {
                    self.log.append_text(&line);
                }
                tracing::debug!(entries = view.entry_count(), "Log rendered");
                Ok(view)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Log fetch failed");
                self.log
                    .append_text(&escape_html(&format!("[log unavailable: {e}]")));
                Err(e)
            }
        }
    }
}
