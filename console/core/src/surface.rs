//! Collaborator Surfaces
//!
//! The console core never touches a concrete UI. It talks to three
//! collaborators through these traits:
//!
//! - [`EditorWidget`]: the code editor (text, read-only flag, key commands)
//! - [`DisplaySurface`]: an output or log panel that receives escaped text
//! - [`SubmitControl`]: the submit button and the call-arguments field
//!
//! Methods take `&self`; implementations own their interior mutability
//! because the same collaborator is shared by several concurrent tasks.
//!
//! The `Memory*` implementations keep everything in memory. The terminal
//! surface uses [`MemoryEditor`] as its editing buffer, and tests use all
//! three to observe what the core did.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked when a bound key command fires
pub type KeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Platform key combinations for a command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    /// Combination on Windows/Linux
    pub win: String,
    /// Combination on macOS
    pub mac: String,
}

impl KeyCombo {
    /// Create a key combination
    pub fn new(win: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            win: win.into(),
            mac: mac.into(),
        }
    }

    /// The submit shortcut
    #[must_use]
    pub fn submit() -> Self {
        Self::new("Ctrl-Return", "Command-Return")
    }
}

/// The code editor
pub trait EditorWidget: Send + Sync {
    /// Entire current text
    fn current_text(&self) -> String;

    /// Insert text at a character position, or at the cursor when `None`
    fn insert_text(&self, text: &str, at: Option<usize>);

    /// Allow or forbid user edits
    fn set_read_only(&self, read_only: bool);

    /// Register a named key command scoped to the editor
    fn bind_key(&self, name: &str, combo: KeyCombo, callback: KeyCallback);

    /// Remove a named key command
    fn unbind_key(&self, name: &str);
}

/// A panel that shows escaped remote text
pub trait DisplaySurface: Send + Sync {
    /// Append already-escaped text
    fn append_text(&self, html: &str);

    /// Remove everything shown
    fn clear(&self);

    /// Show or hide the panel
    fn set_visible(&self, visible: bool);
}

/// The submit button and its call-arguments field
pub trait SubmitControl: Send + Sync {
    /// Enable or disable the button
    fn set_enabled(&self, enabled: bool);

    /// Current call-arguments text
    fn call_args(&self) -> String;
}

// =============================================================================
// In-memory editor
// =============================================================================

struct EditorState {
    text: String,
    /// Cursor as a character offset
    cursor: usize,
    read_only: bool,
    commands: HashMap<String, (KeyCombo, KeyCallback)>,
}

/// Editor buffer kept in memory
pub struct MemoryEditor {
    state: Mutex<EditorState>,
}

impl MemoryEditor {
    /// Create an editor holding `text`, cursor at the end
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self {
            state: Mutex::new(EditorState {
                text,
                cursor,
                read_only: false,
                commands: HashMap::new(),
            }),
        }
    }

    /// Move the cursor (clamped to the text length)
    pub fn set_cursor(&self, position: usize) {
        let mut state = self.state.lock();
        state.cursor = position.min(state.text.chars().count());
    }

    /// Cursor position as a character offset
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    /// Whether user edits are currently forbidden
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.state.lock().read_only
    }

    /// Whether a command with this name is bound
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.state.lock().commands.contains_key(name)
    }

    /// Key combination bound to a command
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<KeyCombo> {
        self.state
            .lock()
            .commands
            .get(name)
            .map(|(combo, _)| combo.clone())
    }

    /// Fire a bound command as if its keys were pressed.
    ///
    /// Returns `false` when nothing is bound under that name.
    pub fn trigger(&self, name: &str) -> bool {
        // Run the callback outside the lock; it may call back into the editor.
        let callback = self
            .state
            .lock()
            .commands
            .get(name)
            .map(|(_, callback)| Arc::clone(callback));
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryEditor {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl EditorWidget for MemoryEditor {
    fn current_text(&self) -> String {
        self.state.lock().text.clone()
    }

    fn insert_text(&self, text: &str, at: Option<usize>) {
        let mut state = self.state.lock();
        let len = state.text.chars().count();
        let position = at.unwrap_or(state.cursor).min(len);
        let byte_offset = state
            .text
            .char_indices()
            .nth(position)
            .map_or(state.text.len(), |(offset, _)| offset);
        state.text.insert_str(byte_offset, text);
        state.cursor = position + text.chars().count();
    }

    fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    fn bind_key(&self, name: &str, combo: KeyCombo, callback: KeyCallback) {
        self.state
            .lock()
            .commands
            .insert(name.to_string(), (combo, callback));
    }

    fn unbind_key(&self, name: &str) {
        self.state.lock().commands.remove(name);
    }
}

// =============================================================================
// In-memory display
// =============================================================================

#[derive(Default)]
struct DisplayState {
    chunks: Vec<String>,
    visible: bool,
}

/// Display panel kept in memory
#[derive(Default)]
pub struct MemoryDisplay {
    state: Mutex<DisplayState>,
    clears: AtomicUsize,
}

impl MemoryDisplay {
    /// Create an empty, hidden panel
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut DisplayState) -> R) -> R {
        f(&mut self.state.lock())
    }

    /// Everything appended since the last clear, concatenated
    #[must_use]
    pub fn contents(&self) -> String {
        self.with_state(|s| s.chunks.concat())
    }

    /// Each append since the last clear, in order
    #[must_use]
    pub fn chunks(&self) -> Vec<String> {
        self.with_state(|s| s.chunks.clone())
    }

    /// Number of times the panel was cleared
    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    /// Whether the panel is shown
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.with_state(|s| s.visible)
    }
}

impl DisplaySurface for MemoryDisplay {
    fn append_text(&self, html: &str) {
        self.with_state(|s| s.chunks.push(html.to_string()));
    }

    fn clear(&self) {
        self.with_state(|s| s.chunks.clear());
        self.clears.fetch_add(1, Ordering::SeqCst);
    }

    fn set_visible(&self, visible: bool) {
        self.with_state(|s| s.visible = visible);
    }
}

// =============================================================================
// In-memory submit control
// =============================================================================

/// Submit button and call-arguments field kept in memory
pub struct MemoryControl {
    enabled: AtomicBool,
    call_args: Mutex<String>,
}

impl MemoryControl {
    /// Create a disabled control with the given call arguments
    pub fn new(call_args: impl Into<String>) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            call_args: Mutex::new(call_args.into()),
        }
    }

    /// Whether the button is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Replace the call-arguments text
    pub fn set_call_args(&self, call_args: impl Into<String>) {
        *self.call_args.lock() = call_args.into();
    }
}

impl Default for MemoryControl {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl SubmitControl for MemoryControl {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn call_args(&self) -> String {
        self.call_args.lock().clone()
    }
}
