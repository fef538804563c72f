//! Console Events
//!
//! Intents reported by the collaborators (editor, buttons, panels) to the
//! console. Collaborator callbacks only enqueue an event; the console's
//! event loop decides what to run. This keeps key handlers trivial and
//! keeps all network work on the runtime.

/// Events from collaborators to the console
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// The submit shortcut fired or the submit button was pressed
    SubmitRequested,

    /// The log panel was opened
    FetchLogRequested,

    /// A snippet (special character, code template) was clicked
    InsertSnippet {
        /// Text to insert at the cursor
        text: String,
    },

    /// The page is going away; stop processing
    Shutdown,
}
