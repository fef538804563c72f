//! Literal Parser
//!
//! The log endpoint prints its document as a Python literal rather than
//! JSON: single-quoted strings, `True`/`None` keywords and trailing commas.
//! This parser accepts exactly that data-literal subset (and therefore
//! plain JSON too) and produces a `serde_json::Value`. Nothing in the input
//! is ever evaluated; anything outside the grammar is an error carrying its
//! byte offset.
//!
//! ```text
//! value   := dict | list | string | number | keyword
//! dict    := '{' (string ':' value (',' string ':' value)* ','?)? '}'
//! list    := '[' (value (',' value)* ','?)? ']'
//! string  := '\'' chars '\'' | '"' chars '"'
//! keyword := True | False | None | true | false | null
//! ```

use serde_json::{Map, Number, Value};

use super::LogDecodeError;

/// Deepest dict/list nesting accepted
pub const MAX_DEPTH: usize = 128;

/// Parse one literal value spanning all of `input` (surrounding whitespace allowed)
///
/// # Errors
///
/// Returns a [`LogDecodeError`] pointing at the first byte outside the grammar.
pub fn parse_literal(input: &str) -> Result<Value, LogDecodeError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(LogDecodeError::TrailingContent { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self) -> LogDecodeError {
        match self.peek() {
            Some(found) => LogDecodeError::UnexpectedChar {
                found,
                offset: self.pos,
            },
            None => LogDecodeError::UnexpectedEnd,
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), LogDecodeError> {
        if self.peek() == Some(wanted) {
            self.pos += wanted.len_utf8();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn value(&mut self) -> Result<Value, LogDecodeError> {
        match self.peek() {
            Some('{') => self.nested(Self::dict),
            Some('[') => self.nested(Self::list),
            Some('\'' | '"') => self.string().map(Value::String),
            Some(c) if c == '-' || c == '+' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            _ => Err(self.unexpected()),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, LogDecodeError>,
    ) -> Result<Value, LogDecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(LogDecodeError::TooDeep { offset: self.pos });
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn dict(&mut self) -> Result<Value, LogDecodeError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            if !matches!(self.peek(), Some('\'' | '"')) {
                return Err(self.unexpected());
            }
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(':')?;
            self.skip_whitespace();
            let value = self.value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn list(&mut self) -> Result<Value, LogDecodeError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {}
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn string(&mut self) -> Result<String, LogDecodeError> {
        let quote = self.bump().ok_or(LogDecodeError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            let start = self.pos;
            match self.bump() {
                None => return Err(LogDecodeError::UnexpectedEnd),
                Some(c) if c == quote => return Ok(out),
                Some(c @ ('\n' | '\r')) => {
                    return Err(LogDecodeError::UnexpectedChar {
                        found: c,
                        offset: start,
                    })
                }
                Some('\\') => out.push(self.escape(start)?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, offset: usize) -> Result<char, LogDecodeError> {
        let invalid = LogDecodeError::InvalidEscape { offset };
        let c = match self.bump().ok_or(LogDecodeError::UnexpectedEnd)? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            '/' => '/',
            'x' => self.hex_char(2).ok_or(invalid)?,
            'u' => self.hex_char(4).ok_or(invalid)?,
            _ => return Err(invalid),
        };
        Ok(c)
    }

    fn hex_char(&mut self, digits: usize) -> Option<char> {
        let hex = self.input.get(self.pos..self.pos + digits)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.pos += digits;
        char::from_u32(code)
    }

    fn number(&mut self) -> Result<Value, LogDecodeError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        let invalid = || LogDecodeError::InvalidNumber {
            text: text.to_string(),
            offset: start,
        };

        if text.contains(['.', 'e', 'E']) {
            let float: f64 = text.parse().map_err(|_| invalid())?;
            Number::from_f64(float).map(Value::Number).ok_or_else(invalid)
        } else {
            let int: i64 = text.parse().map_err(|_| invalid())?;
            Ok(Value::Number(int.into()))
        }
    }

    fn keyword(&mut self) -> Result<Value, LogDecodeError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        match &self.input[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            word => Err(LogDecodeError::UnknownKeyword {
                word: word.to_string(),
                offset: start,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_server_log_document() {
        let body = "{'entire_log' : [ {'logtime':'1300000000.5', 'repycode':'print%281%29', \
                    'output':'1%0A'}, ] }";
        assert_eq!(
            parse_literal(body).unwrap(),
            json!({
                "entire_log": [
                    {"logtime": "1300000000.5", "repycode": "print%281%29", "output": "1%0A"}
                ]
            })
        );
    }

    #[test]
    fn test_empty_log_document() {
        assert_eq!(
            parse_literal("{'entire_log' : [  ] }").unwrap(),
            json!({"entire_log": []})
        );
    }

    #[test]
    fn test_plain_json_is_accepted() {
        assert_eq!(
            parse_literal(r#"{"a": [1, -2.5, true, null, "x\"y"]}"#).unwrap(),
            json!({"a": [1, -2.5, true, null, "x\"y"]})
        );
    }

    #[test]
    fn test_python_keywords_and_escapes() {
        assert_eq!(
            parse_literal(r"['it\'s', '\x41é\n', True, False, None]").unwrap(),
            json!(["it's", "Aé\n", true, false, null])
        );
    }

    #[test]
    fn test_rejects_code() {
        assert_eq!(
            parse_literal("__import__('os')"),
            Err(LogDecodeError::UnexpectedChar {
                found: '_',
                offset: 0
            })
        );
        assert_eq!(
            parse_literal("{'a': open('x')}"),
            Err(LogDecodeError::UnknownKeyword {
                word: "open".to_string(),
                offset: 6
            })
        );
    }

    #[test]
    fn test_error_offsets() {
        assert_eq!(
            parse_literal("{'a' 1}"),
            Err(LogDecodeError::UnexpectedChar {
                found: '1',
                offset: 5
            })
        );
        assert_eq!(
            parse_literal("[1] [2]"),
            Err(LogDecodeError::TrailingContent { offset: 4 })
        );
        assert_eq!(parse_literal("['open"), Err(LogDecodeError::UnexpectedEnd));
        assert_eq!(
            parse_literal(r"'\q'"),
            Err(LogDecodeError::InvalidEscape { offset: 1 })
        );
        assert_eq!(
            parse_literal("1.2.3"),
            Err(LogDecodeError::InvalidNumber {
                text: "1.2.3".to_string(),
                offset: 0
            })
        );
    }

    #[test]
    fn test_nesting_limit() {
        assert_eq!(
            parse_literal(&"[".repeat(200_000)),
            Err(LogDecodeError::TooDeep { offset: MAX_DEPTH })
        );
        assert_eq!(
            parse_literal(&"{'a':".repeat(MAX_DEPTH + 1)),
            Err(LogDecodeError::TooDeep {
                offset: MAX_DEPTH * 5
            })
        );

        let deepest = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_literal(&deepest).is_ok());
    }
}
