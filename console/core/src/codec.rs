//! Wire Text Codec
//!
//! Everything the sandbox server sends back is percent-encoded, and
//! everything the console sends is a form-encoded body. Remote text is
//! untrusted: it can contain anything the evaluated program printed, so it
//! is always escaped before it reaches a display surface.
//!
//! [`decode_remote_text`] is the only path from a response body to a surface.

use std::borrow::Cow;

/// Percent-encode a single form component.
///
/// Only ASCII alphanumerics and `-_.~` are left as-is. Spaces become `%20`,
/// never `+`, because the server unquotes without plus handling.
#[must_use]
pub fn encode_component(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build an `application/x-www-form-urlencoded` body from key/value pairs
#[must_use]
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode `%XX` escapes. Malformed escapes are kept literally and invalid
/// UTF-8 is replaced rather than rejected.
#[must_use]
pub fn percent_decode(text: &str) -> String {
    let bytes = urlencoding::decode_binary(text.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Escape the characters that would otherwise be interpreted as markup.
///
/// Returns the input unchanged (borrowed) when nothing needs escaping.
#[must_use]
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(|c: char| matches!(c, '&' | '<' | '>' | '"')) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Percent-decode then escape one unit of remote text for display
#[must_use]
pub fn decode_remote_text(text: &str) -> String {
    let decoded = percent_decode(text);
    escape_html(&decoded).into_owned()
}
