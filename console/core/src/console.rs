//! Console Event Loop
//!
//! [`Console`] drains [`ConsoleEvent`]s from the collaborators and runs the
//! matching operation. Submissions and log fetches run as tasks, so a log
//! fetch can proceed while an evaluation is pending; the Submit-Enabled gate
//! in the controller rejects overlapping submissions.
//!
//! When an operation finishes, a [`ConsoleMessage`] goes back to the driver.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::events::ConsoleEvent;
use crate::messages::ConsoleMessage;
use crate::session::{ConsoleSession, SessionCollaborators, SessionToken};
use crate::transport::HttpTransport;

/// Capacity of the event and message channels
pub const CHANNEL_CAPACITY: usize = 32;

/// A console session plus the loop that drives it
pub struct Console {
    session: Arc<ConsoleSession>,
    events_tx: mpsc::Sender<ConsoleEvent>,
    events_rx: mpsc::Receiver<ConsoleEvent>,
    messages: mpsc::Sender<ConsoleMessage>,
}

impl Console {
    /// Build a console. Returns the receiver for its messages.
    pub fn new(
        token: SessionToken,
        transport: Arc<dyn HttpTransport>,
        collaborators: SessionCollaborators,
        config: &ConsoleConfig,
    ) -> (Self, mpsc::Receiver<ConsoleMessage>) {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (messages, messages_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let session = Arc::new(ConsoleSession::new(
            token,
            transport,
            collaborators,
            config,
            events_tx.clone(),
        ));

        let console = Self {
            session,
            events_tx,
            events_rx,
            messages,
        };
        (console, messages_rx)
    }

    /// Sender for collaborator events
    #[must_use]
    pub fn events(&self) -> mpsc::Sender<ConsoleEvent> {
        self.events_tx.clone()
    }

    /// The session this console drives
    #[must_use]
    pub fn session(&self) -> Arc<ConsoleSession> {
        Arc::clone(&self.session)
    }

    /// Process events until `Shutdown`.
    ///
    /// Operations still running at shutdown are aborted.
    pub async fn run(mut self) {
        let mut tasks = JoinSet::new();
        tracing::debug!(session = %self.session.token(), "Console loop started");

        loop {
            tokio::select! {
                event = self.events_rx.recv() => match event {
                    Some(ConsoleEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event, &mut tasks),
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::warn!(error = %e, "Console task failed");
                    }
                }
            }
        }

        tasks.shutdown().await;
        tracing::debug!("Console loop stopped");
    }

    fn handle_event(&self, event: ConsoleEvent, tasks: &mut JoinSet<()>) {
        tracing::trace!(?event, "Console event");
        match event {
            ConsoleEvent::SubmitRequested => {
                let session = Arc::clone(&self.session);
                let messages = self.messages.clone();
                tasks.spawn(async move {
                    let message = match session.submit_current().await {
                        Ok(outcome) => ConsoleMessage::SubmissionFinished(outcome),
                        Err(ConsoleError::SubmissionInFlight) => ConsoleMessage::SubmissionRejected,
                        Err(e) => ConsoleMessage::OperationFailed {
                            operation: "submit",
                            error: e.to_string(),
                        },
                    };
                    notify(&messages, message).await;
                });
            }
            ConsoleEvent::FetchLogRequested => {
                let session = Arc::clone(&self.session);
                let messages = self.messages.clone();
                tasks.spawn(async move {
                    let message = match session.fetch_log().await {
                        Ok(view) => ConsoleMessage::LogRendered {
                            entries: view.entry_count(),
                        },
                        Err(e) => ConsoleMessage::OperationFailed {
                            operation: "log",
                            error: e.to_string(),
                        },
                    };
                    notify(&messages, message).await;
                });
            }
            ConsoleEvent::InsertSnippet { text } => self.session.insert_snippet(&text),
            ConsoleEvent::Shutdown => {}
        }
    }
}

async fn notify(messages: &mpsc::Sender<ConsoleMessage>, message: ConsoleMessage) {
    if messages.send(message).await.is_err() {
        tracing::debug!("Console message dropped, driver is gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::SUBMIT_COMMAND;
    use crate::controller::SubmissionStatus;
    use crate::surface::{EditorWidget, MemoryControl, MemoryDisplay, MemoryEditor};
    use crate::transport::mock::MockTransport;
    use crate::transport::HttpResponse;
    use pretty_assertions::assert_eq;

    struct Setup {
        console: Console,
        messages: mpsc::Receiver<ConsoleMessage>,
        transport: Arc<MockTransport>,
        editor: Arc<MemoryEditor>,
        output: Arc<MemoryDisplay>,
        log: Arc<MemoryDisplay>,
    }

    fn setup() -> Setup {
        let transport = MockTransport::new();
        let editor = Arc::new(MemoryEditor::new("print(1)"));
        let output = Arc::new(MemoryDisplay::new());
        let log = Arc::new(MemoryDisplay::new());
        let (console, messages) = Console::new(
            SessionToken::new("8").unwrap(),
            transport.clone(),
            SessionCollaborators {
                editor: editor.clone(),
                control: Arc::new(MemoryControl::default()),
                output: output.clone(),
                log: log.clone(),
            },
            &ConsoleConfig::default(),
        );
        Setup {
            console,
            messages,
            transport,
            editor,
            output,
            log,
        }
    }

    #[tokio::test]
    async fn test_shortcut_runs_a_submission() {
        let mut s = setup();
        s.transport.respond("/", HttpResponse::ok("1%0A"));
        s.transport.respond_always("/getOutput", HttpResponse::ok(""));
        let events = s.console.events();
        let loop_task = tokio::spawn(s.console.run());

        assert!(s.editor.trigger(SUBMIT_COMMAND));

        match s.messages.recv().await {
            Some(ConsoleMessage::SubmissionFinished(outcome)) => assert_eq!(
                outcome.status,
                SubmissionStatus::Completed {
                    result: "1\n".to_string()
                }
            ),
            other => panic!("unexpected message {other:?}"),
        }
        assert_eq!(s.output.contents(), "1\n");

        events.send(ConsoleEvent::Shutdown).await.unwrap();
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_log_fetch_runs_during_evaluation() {
        let mut s = setup();
        let gate = s.transport.hold("/");
        s.transport.respond("/", HttpResponse::ok("done"));
        s.transport.respond_always("/getOutput", HttpResponse::ok(""));
        s.transport
            .respond("/getLog", HttpResponse::ok("{'entire_log' : [  ] }"));
        let events = s.console.events();
        let loop_task = tokio::spawn(s.console.run());

        events.send(ConsoleEvent::SubmitRequested).await.unwrap();
        s.transport.wait_for("/", 1).await;
        events.send(ConsoleEvent::FetchLogRequested).await.unwrap();

        assert_eq!(
            s.messages.recv().await,
            Some(ConsoleMessage::LogRendered { entries: 0 })
        );
        assert_eq!(s.log.contents(), "(nothing logged yet)");

        // A second submit while the first is pending is rejected
        events.send(ConsoleEvent::SubmitRequested).await.unwrap();
        assert_eq!(
            s.messages.recv().await,
            Some(ConsoleMessage::SubmissionRejected)
        );

        gate.notify_one();
        assert!(matches!(
            s.messages.recv().await,
            Some(ConsoleMessage::SubmissionFinished(_))
        ));

        events.send(ConsoleEvent::Shutdown).await.unwrap();
        loop_task.await.unwrap();
        assert_eq!(s.transport.count("/"), 1);
    }

    #[tokio::test]
    async fn test_snippet_event_inserts_at_cursor() {
        let s = setup();
        s.editor.set_cursor(5);
        let events = s.console.events();
        let loop_task = tokio::spawn(s.console.run());

        events
            .send(ConsoleEvent::InsertSnippet {
                text: "\"".to_string(),
            })
            .await
            .unwrap();
        events.send(ConsoleEvent::Shutdown).await.unwrap();
        loop_task.await.unwrap();

        assert_eq!(s.editor.current_text(), "print\"(1)");
    }
}
