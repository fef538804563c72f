//! File Insertion
//!
//! Local files can be pasted into the editor wrapped in include markers, so
//! a submission can bundle helper code. Three delimiter styles exist:
//!
//! ```text
//! Lines                          Line                       None
//!
//! ####...####   (x4)             # begin include 'f.r2py'   <file>
//! # begin include 'f.r2py'       <file>
//! <file>                         # end include f.r2py'
//! # end include f.r2py'
//! ```
//!
//! Every style surrounds the block with blank lines. Insertion happens at
//! the top of the buffer or at the cursor.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::surface::EditorWidget;

/// Errors inserting a file
#[derive(Debug, Error)]
pub enum InsertError {
    /// The file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The file has no content
    #[error("{path} is empty")]
    Empty {
        /// File path
        path: PathBuf,
    },

    /// The file is not valid UTF-8 text
    #[error("{path} is not UTF-8 text")]
    NotUtf8 {
        /// File path
        path: PathBuf,
    },

    /// Unrecognized delimiter mode name
    #[error("Unknown delimiter mode {0:?} (expected lines, line or none)")]
    UnknownDelimiter(String),

    /// Unrecognized insert position name
    #[error("Unknown insert position {0:?} (expected begin or cursor)")]
    UnknownPosition(String),
}

/// How an inserted file is marked
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DelimiterMode {
    /// Banner of four `#` rules plus begin/end comments
    #[default]
    Lines,
    /// Begin/end comments only
    Line,
    /// Blank lines only
    None,
}

impl FromStr for DelimiterMode {
    type Err = InsertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lines" => Ok(Self::Lines),
            "line" => Ok(Self::Line),
            "none" => Ok(Self::None),
            other => Err(InsertError::UnknownDelimiter(other.to_string())),
        }
    }
}

/// Where an inserted file goes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertPosition {
    /// Top of the buffer
    Begin,
    /// At the cursor
    #[default]
    Cursor,
}

impl FromStr for InsertPosition {
    type Err = InsertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "begin" => Ok(Self::Begin),
            "cursor" => Ok(Self::Cursor),
            other => Err(InsertError::UnknownPosition(other.to_string())),
        }
    }
}

const RULE_WIDTH: usize = 55;
const RULE_COUNT: usize = 4;

/// Text placed before and after a file's content
#[must_use]
pub fn delimiters(file_name: &str, mode: DelimiterMode) -> (String, String) {
    let end = format!("\n\n# end include {file_name}'\n\n");
    match mode {
        DelimiterMode::Lines => {
            let rule = format!("{}\n", "#".repeat(RULE_WIDTH));
            let top = format!(
                "\n\n{}# begin include '{file_name}'\n",
                rule.repeat(RULE_COUNT)
            );
            (top, end)
        }
        DelimiterMode::Line => (format!("\n\n# begin include '{file_name}'\n"), end),
        DelimiterMode::None => ("\n\n".to_string(), "\n\n".to_string()),
    }
}

/// A file's content wrapped in its delimiters
#[must_use]
pub fn wrap_file(file_name: &str, content: &str, mode: DelimiterMode) -> String {
    let (top, bottom) = delimiters(file_name, mode);
    format!("{top}{content}{bottom}")
}

/// Insert one file's content into the editor
pub fn insert_file(
    editor: &dyn EditorWidget,
    file_name: &str,
    content: &str,
    position: InsertPosition,
    mode: DelimiterMode,
) {
    let at = match position {
        InsertPosition::Begin => Some(0),
        InsertPosition::Cursor => None,
    };
    editor.insert_text(&wrap_file(file_name, content, mode), at);
}

/// Result of a batch insertion
#[derive(Debug, Default)]
pub struct InsertReport {
    /// Files inserted, in argument order
    pub inserted: Vec<PathBuf>,
    /// Files skipped and why
    pub skipped: Vec<InsertError>,
}

async fn read_text(path: &Path) -> Result<String, InsertError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| InsertError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(InsertError::Empty {
            path: path.to_path_buf(),
        });
    }
    String::from_utf8(bytes).map_err(|_| InsertError::NotUtf8 {
        path: path.to_path_buf(),
    })
}

/// Read and insert several files.
///
/// A file that cannot be used is skipped and reported once; the rest of the
/// batch still goes in. With [`InsertPosition::Begin`] the files end up at
/// the top in argument order.
pub async fn insert_files(
    editor: &dyn EditorWidget,
    paths: &[PathBuf],
    position: InsertPosition,
    mode: DelimiterMode,
) -> InsertReport {
    let mut report = InsertReport::default();
    let mut readable = Vec::with_capacity(paths.len());

    for path in paths {
        match read_text(path).await {
            Ok(content) => readable.push((path, content)),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping file");
                report.skipped.push(e);
            }
        }
    }

    // Each Begin insert lands above the previous one
    if position == InsertPosition::Begin {
        readable.reverse();
    }
    for (path, content) in &readable {
        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy());
        insert_file(editor, &name, content, position, mode);
        tracing::debug!(path = %path.display(), bytes = content.len(), "Inserted file");
    }
    if position == InsertPosition::Begin {
        readable.reverse();
    }

    report.inserted = readable.into_iter().map(|(path, _)| path.clone()).collect();
    report
}
