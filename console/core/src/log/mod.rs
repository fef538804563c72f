//! Session Log
//!
//! The log endpoint returns the session's execution history. Three shapes
//! are possible and each renders differently:
//!
//! | Body | View | Rendered |
//! |---|---|---|
//! | empty | [`LogView::NoSandbox`] | [`NO_SANDBOX_MESSAGE`] |
//! | `{'entire_log' : [  ] }` | [`LogView::Empty`] | [`EMPTY_LOG_MESSAGE`] |
//! | entries | [`LogView::Entries`] | four lines per entry |
//!
//! The body is decoded with [`parse_literal`] into a value and then into
//! the declared [`LogDocument`] schema. Code and output fields are
//! percent-encoded by the server and go through `decode_remote_text`.

mod fetcher;
mod literal;

pub use fetcher::LogFetcher;
pub use literal::parse_literal;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::codec::{decode_remote_text, escape_html};

/// Shown when the server has no sandbox for this session
pub const NO_SANDBOX_MESSAGE: &str = "You currently have no sandbox. Reload website!";

/// Shown when the session has not run anything yet
pub const EMPTY_LOG_MESSAGE: &str = "(nothing logged yet)";

/// First line of every rendered entry
pub const ENTRY_SEPARATOR: &str = "-----------------------------------<br/>";

/// Errors decoding a log document
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LogDecodeError {
    /// The document ended inside a value
    #[error("Log document ended unexpectedly")]
    UnexpectedEnd,

    /// A character outside the literal grammar
    #[error("Unexpected {found:?} at byte {offset}")]
    UnexpectedChar {
        /// Offending character
        found: char,
        /// Byte offset in the body
        offset: usize,
    },

    /// An unknown or malformed backslash escape
    #[error("Invalid escape at byte {offset}")]
    InvalidEscape {
        /// Byte offset of the backslash
        offset: usize,
    },

    /// A number that does not parse
    #[error("Invalid number {text:?} at byte {offset}")]
    InvalidNumber {
        /// Number text as written
        text: String,
        /// Byte offset in the body
        offset: usize,
    },

    /// A bare word other than the literal keywords
    #[error("Unknown keyword {word:?} at byte {offset}")]
    UnknownKeyword {
        /// The word
        word: String,
        /// Byte offset in the body
        offset: usize,
    },

    /// Dicts and lists nested deeper than the parser allows
    #[error("Nesting too deep at byte {offset}")]
    TooDeep {
        /// Byte offset of the opening bracket past the limit
        offset: usize,
    },

    /// Content after the document
    #[error("Trailing content at byte {offset}")]
    TrailingContent {
        /// Byte offset where the extra content starts
        offset: usize,
    },

    /// Well-formed literal that does not match the log schema
    #[error("Log document does not match schema: {0}")]
    Schema(String),
}

/// One executed submission
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LogEntry {
    /// When it ran, as the server printed it
    #[serde(deserialize_with = "string_or_number")]
    pub logtime: String,
    /// Submitted code, percent-encoded
    pub repycode: String,
    /// Produced output, percent-encoded
    pub output: String,
}

/// The log endpoint's document
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct LogDocument {
    /// Entries in server order
    pub entire_log: Vec<LogEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// A decoded log response
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogView {
    /// Empty body: the session has no sandbox
    NoSandbox,
    /// The session has not run anything
    Empty,
    /// Entries in server order
    Entries(Vec<LogEntry>),
}

impl LogView {
    /// Number of entries
    #[must_use]
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Entries(entries) => entries.len(),
            Self::NoSandbox | Self::Empty => 0,
        }
    }

    /// Lines for the log panel, already escaped
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        match self {
            Self::NoSandbox => vec![NO_SANDBOX_MESSAGE.to_string()],
            Self::Empty => vec![EMPTY_LOG_MESSAGE.to_string()],
            Self::Entries(entries) => entries
                .iter()
                .flat_map(|entry| {
                    [
                        ENTRY_SEPARATOR.to_string(),
                        format!("Logtime: <pre>{}</pre>", escape_html(&entry.logtime)),
                        format!("Repycode: <pre>{}</pre>", decode_remote_text(&entry.repycode)),
                        format!("Output: <pre>{}</pre>", decode_remote_text(&entry.output)),
                    ]
                })
                .collect(),
        }
    }
}

/// Decode a log response body
///
/// # Errors
///
/// Returns a [`LogDecodeError`] if the body is neither empty nor a literal
/// matching [`LogDocument`].
pub fn decode_log(body: &str) -> Result<LogView, LogDecodeError> {
    if body.trim().is_empty() {
        return Ok(LogView::NoSandbox);
    }

    let value = parse_literal(body)?;
    let document: LogDocument =
        serde_json::from_value(value).map_err(|e| LogDecodeError::Schema(e.to_string()))?;

    if document.entire_log.is_empty() {
        Ok(LogView::Empty)
    } else {
        Ok(LogView::Entries(document.entire_log))
    }
}
