//! Terminal Surface
//!
//! The core hands panels escaped HTML fragments. A terminal shows plain
//! text, so [`TerminalDisplay`] strips the few tags the core emits and turns
//! entities back into characters before writing.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use console_core::DisplaySurface;
use parking_lot::Mutex;

/// Convert a panel fragment to terminal text
pub fn html_to_text(html: &str) -> String {
    html.replace("<br/>", "")
        .replace("<pre>", "")
        .replace("</pre>", "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}

/// A panel written to a terminal stream
pub struct TerminalDisplay {
    out: Mutex<Box<dyn Write + Send>>,
    title: Option<String>,
    /// Whether every append is its own line
    line_per_append: bool,
    visible: AtomicBool,
}

impl TerminalDisplay {
    /// Stream output as it arrives, without adding line breaks
    pub fn stream(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            title: None,
            line_per_append: false,
            visible: AtomicBool::new(false),
        }
    }

    /// One line per append, with a title printed when the panel is shown
    pub fn lines(out: Box<dyn Write + Send>, title: impl Into<String>) -> Self {
        Self {
            out: Mutex::new(out),
            title: Some(title.into()),
            line_per_append: true,
            visible: AtomicBool::new(false),
        }
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            tracing::warn!(error = %e, "Terminal write failed");
        }
    }
}

impl DisplaySurface for TerminalDisplay {
    fn append_text(&self, html: &str) {
        let mut text = html_to_text(html);
        if self.line_per_append {
            text.push('\n');
        }
        self.write(&text);
    }

    fn clear(&self) {
        // Printed output cannot be taken back
    }

    fn set_visible(&self, visible: bool) {
        let was_visible = self.visible.swap(visible, Ordering::SeqCst);
        if visible && !was_visible {
            if let Some(title) = &self.title {
                self.write(&format!("== {title} ==\n"));
            }
        }
    }
}
