//! Submit Key Binding
//!
//! [`KeyBindingManager`] owns the Submit-Enabled flag. The flag, the editor's
//! key command, the submit control and the editor's read-only state always
//! move together:
//!
//! | State | Key command | Submit control | Editor |
//! |---|---|---|---|
//! | `Enabled` | bound | enabled | writable |
//! | `Disabled` | unbound | disabled | read-only |
//!
//! The only transitions are submission start (`Enabled -> Disabled`) and
//! evaluation completion (`Disabled -> Enabled`). Requests for the transition
//! the manager is already past are logged and ignored, so the collaborator
//! calls always alternate.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::events::ConsoleEvent;
use crate::surface::{EditorWidget, KeyCombo, SubmitControl};

/// Name of the editor key command that submits the current code
pub const SUBMIT_COMMAND: &str = "submitCodeKey";

/// Submit-Enabled flag
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitState {
    /// No evaluation in flight; submitting is allowed
    Enabled,
    /// An evaluation is in flight
    Disabled,
}

/// Couples the submit shortcut and control to the Submit-Enabled flag
pub struct KeyBindingManager {
    editor: Arc<dyn EditorWidget>,
    control: Arc<dyn SubmitControl>,
    events: mpsc::Sender<ConsoleEvent>,
    state: Mutex<SubmitState>,
}

impl KeyBindingManager {
    /// Create the manager and perform the initial bind
    pub fn new(
        editor: Arc<dyn EditorWidget>,
        control: Arc<dyn SubmitControl>,
        events: mpsc::Sender<ConsoleEvent>,
    ) -> Self {
        let manager = Self {
            editor,
            control,
            events,
            state: Mutex::new(SubmitState::Disabled),
        };
        manager.bind_submit_shortcut();
        manager
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SubmitState {
        *self.state.lock()
    }

    /// Whether submitting is currently allowed
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state() == SubmitState::Enabled
    }

    /// Bind the shortcut, enable the control, make the editor writable
    pub fn bind_submit_shortcut(&self) {
        let mut state = self.state.lock();
        if *state == SubmitState::Enabled {
            tracing::debug!("Submit shortcut already bound");
            return;
        }

        let events = self.events.clone();
        self.editor.bind_key(
            SUBMIT_COMMAND,
            KeyCombo::submit(),
            Arc::new(move || {
                if let Err(e) = events.try_send(ConsoleEvent::SubmitRequested) {
                    tracing::warn!(error = %e, "Dropped submit request");
                }
            }),
        );
        self.control.set_enabled(true);
        self.editor.set_read_only(false);
        *state = SubmitState::Enabled;

        tracing::debug!("Submission enabled");
    }

    /// Disable the control, make the editor read-only, unbind the shortcut
    pub fn unbind_submit_shortcut(&self) {
        let mut state = self.state.lock();
        if *state == SubmitState::Disabled {
            tracing::debug!("Submit shortcut already unbound");
            return;
        }
        self.disable(&mut state);
    }

    /// Move to `Disabled` if currently `Enabled`.
    ///
    /// Returns `false`, touching nothing, when a submission is already in
    /// flight. The check and the transition happen under one lock.
    pub fn try_begin_submission(&self) -> bool {
        let mut state = self.state.lock();
        if *state == SubmitState::Disabled {
            return false;
        }
        self.disable(&mut state);
        true
    }

    fn disable(&self, state: &mut SubmitState) {
        self.control.set_enabled(false);
        self.editor.set_read_only(true);
        self.editor.unbind_key(SUBMIT_COMMAND);
        *state = SubmitState::Disabled;

        tracing::debug!("Submission disabled");
    }
}

impl std::fmt::Debug for KeyBindingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBindingManager")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
