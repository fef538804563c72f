//! Console Core - Headless Submission and Streaming for a Sandbox Console
//!
//! This crate holds the orchestration logic of a code console that submits
//! snippets to a remote sandbox and streams their output back while they
//! run. It is independent of any UI: a browser page, a terminal or a test
//! harness supplies the editor and panels through the traits in [`surface`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Collaborators                            │
//! │   ┌──────────┐   ┌──────────────┐   ┌─────────┐   ┌──────────┐   │
//! │   │  Editor  │   │ Submit ctrl  │   │ Output  │   │   Log    │   │
//! │   └────┬─────┘   └──────┬───────┘   └────▲────┘   └────▲─────┘   │
//! │        │  ConsoleEvent (up)   ConsoleMessage (down)    │         │
//! └────────┼────────────────┼─────────────────┼────────────┼─────────┘
//!          │                │                 │            │
//! ┌────────┼────────────────┼─────────────────┼────────────┼─────────┐
//! │        ▼                ▼   CONSOLE CORE  │            │         │
//! │  ┌────────────────────────────┐           │            │         │
//! │  │ KeyBindingManager          │           │            │         │
//! │  │ (Submit-Enabled flag)      │           │            │         │
//! │  └─────────────┬──────────────┘           │            │         │
//! │  ┌─────────────▼──────────────┐  ┌────────┴─────┐ ┌────┴───────┐ │
//! │  │ SubmissionController       ├─►│ OutputPoller │ │ LogFetcher │ │
//! │  └─────────────┬──────────────┘  └──────┬───────┘ └────┬───────┘ │
//! │  ┌─────────────▼────────────────────────▼──────────────▼───────┐ │
//! │  │ Exchange (one spawned request each) over HttpTransport      │ │
//! │  └─────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Console`]: event loop over a [`ConsoleSession`]
//! - [`ConsoleSession`]: token, transport, collaborators and components
//! - [`SubmissionController`]: runs one submission and its poller
//! - [`OutputPoller`]: drains buffered output while an evaluation runs
//! - [`LogFetcher`]: renders the session's execution history
//! - [`KeyBindingManager`]: the Submit-Enabled state machine
//! - [`Exchange`]: one request/response pair in flight
//!
//! # Module Overview
//!
//! - [`bindings`]: submit shortcut and Submit-Enabled flag
//! - [`codec`]: percent encoding and HTML escaping of remote text
//! - [`config`]: TOML file, environment and CLI configuration
//! - [`console`]: event loop
//! - [`controller`]: submission controller
//! - [`events`]: events from collaborators to the console
//! - [`insert`]: local file insertion into the editor
//! - [`log`]: log decoding, rendering and fetching
//! - [`messages`]: messages from the console to its driver
//! - [`poller`]: output poller
//! - [`session`]: session token and session context
//! - [`surface`]: collaborator traits and in-memory implementations
//! - [`transport`]: HTTP transport, endpoints and exchanges

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bindings;
pub mod codec;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod events;
pub mod insert;
pub mod log;
pub mod messages;
pub mod poller;
pub mod session;
pub mod surface;
pub mod transport;

// Re-exports for convenience
pub use bindings::{KeyBindingManager, SubmitState, SUBMIT_COMMAND};
pub use config::{load_config, load_config_from_path, ConfigOverrides, ConsoleConfig, ServerConfig};
pub use console::Console;
pub use controller::{
    OutputOrdering, Submission, SubmissionController, SubmissionOutcome, SubmissionStatus,
};
pub use error::ConsoleError;
pub use events::ConsoleEvent;
pub use insert::{DelimiterMode, InsertPosition, InsertReport};
pub use log::{decode_log, LogEntry, LogFetcher, LogView};
pub use messages::ConsoleMessage;
pub use poller::{OutputPoller, PollSummary, PollerConfig};
pub use session::{acquire_session, ConsoleSession, SessionCollaborators, SessionToken};
pub use surface::{
    DisplaySurface, EditorWidget, KeyCombo, MemoryControl, MemoryDisplay, MemoryEditor,
    SubmitControl,
};
pub use transport::{
    Endpoint, Exchange, HttpTransport, ReqwestTransport, TransportError,
};
