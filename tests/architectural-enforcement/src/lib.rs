//! Architectural Enforcement
//!
//! Source scanning helpers shared by the integration tests in `tests/`.
//! The tests enforce rules that the compiler cannot:
//! - No sleep() calls in production code, except retry backoff
//!
//! Only production code is scanned. Everything from the first
//! `#[cfg(test)]` line of a file onward is treated as test code.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["console/core/src", "console/cli/src"];

/// A Rust source file with its test section removed
#[derive(Debug)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// Lines before the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Keep the lines of `content` that precede its test module
    pub fn from_content(path: impl Into<PathBuf>, content: &str) -> Self {
        let lines = content
            .lines()
            .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
            .map(str::to_string)
            .collect();
        Self {
            path: path.into(),
            lines,
        }
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Load every `.rs` file under `dir` (relative to the workspace root)
pub fn production_sources(dir: &str) -> Vec<SourceFile> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|entry| {
            let content = fs::read_to_string(entry.path()).ok()?;
            Some(SourceFile::from_content(entry.path(), &content))
        })
        .collect()
}

/// Strip a trailing `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether the line calls a sleep function
pub fn is_sleep_call(line: &str) -> bool {
    let code = code_part(line);
    code.contains("::sleep(") || code.contains(".sleep(")
}

/// Whether the sleep at `idx` is exponential retry backoff.
///
/// Needs both a doubling calculation and retry wording within the
/// fifteen lines before it (or five after).
pub fn is_backoff_context(lines: &[String], idx: usize) -> bool {
    let range = idx.saturating_sub(15)..std::cmp::min(idx + 5, lines.len());

    let mut has_backoff_calc = false;
    let mut has_retry_context = false;
    for line in &lines[range] {
        let line = line.to_lowercase();
        if line.contains("<<") || line.contains("pow") || line.contains("* 2") {
            has_backoff_calc = true;
        }
        if line.contains("retry") || line.contains("backoff") || line.contains("attempt") {
            has_retry_context = true;
        }
    }

    has_backoff_calc && has_retry_context
}

/// Sleep calls outside retry backoff, as `path:line - code`
pub fn sleep_violations(file: &SourceFile) -> Vec<String> {
    file.lines
        .iter()
        .enumerate()
        .filter(|(idx, line)| is_sleep_call(line) && !is_backoff_context(&file.lines, *idx))
        .map(|(idx, line)| format!("{}:{} - {}", file.path.display(), idx + 1, line.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(lines: &[&str]) -> SourceFile {
        SourceFile::from_content("sample.rs", &lines.join("\n"))
    }

    #[test]
    fn test_plain_sleep_is_a_violation() {
        let file = source(&[
            "async fn poll() {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ]);

        assert_eq!(sleep_violations(&file).len(), 1);
    }

    #[test]
    fn test_backoff_sleep_is_allowed() {
        let file = source(&[
            "async fn reconnect(attempt: u32) {",
            "    let delay = base_delay * (1 << attempt);",
            "    tokio::time::sleep(delay).await;",
            "}",
        ]);

        assert!(sleep_violations(&file).is_empty());
    }

    #[test]
    fn test_retry_words_alone_are_not_backoff() {
        let file = source(&[
            "// retry until it works",
            "tokio::time::sleep(delay).await;",
        ]);

        assert_eq!(sleep_violations(&file).len(), 1);
    }

    #[test]
    fn test_test_module_is_not_scanned() {
        let file = source(&[
            "fn production() {}",
            "#[cfg(test)]",
            "mod tests {",
            "    tokio::time::sleep(Duration::from_millis(10)).await;",
            "}",
        ]);

        assert_eq!(file.lines.len(), 1);
        assert!(sleep_violations(&file).is_empty());
    }

    #[test]
    fn test_commented_sleep_is_ignored() {
        assert!(!is_sleep_call("let x = 1; // std::thread::sleep(d)"));
        assert!(is_sleep_call("std::thread::sleep(d);"));
    }
}
