//! Host-literal text codec.
//!
//! The device console evaluates and prints Python-style literals, not
//! strict JSON:
//!
//! ```text
//! device prints : [{'method': 'debug', 'value': {'value': True}, 'success': True}]
//! normalized    : [{"method": "debug", "value": {"value": true}, "success": true}]
//! ```
//!
//! [`to_literal`] is the only way call text embeds argument values, so
//! quoting is structural rather than string interpolation.  [`normalize`]
//! rewrites quotes and `True`/`False`/`None` tokens outside of strings
//! before the text reaches `serde_json`; string contents are never
//! touched, so an apostrophe inside a value survives the round trip.

use core::fmt::Write as _;

use serde_json::Value;

use super::record::ResultRecord;

// ── Encoding ──────────────────────────────────────────────────

/// Render a value in host-literal syntax.
pub fn to_literal(value: &Value) -> String {
    let mut out = String::new();
    write_literal(&mut out, value);
    out
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("None"),
        Value::Bool(true) => out.push_str("True"),
        Value::Bool(false) => out.push_str("False"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_str(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_literal(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_str(out, k);
                out.push_str(": ");
                write_literal(out, v);
            }
            out.push('}');
        }
    }
}

/// Single-quoted string with backslash escapes.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    write_str(&mut out, s);
    out
}

fn write_str(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
}

// ── Normalization ─────────────────────────────────────────────

/// Rewrite host-literal text into JSON text.
///
/// Single-quoted strings become double-quoted, `\xNN` escapes become
/// `\u00NN`, tuples become lists, and the bare tokens `True`, `False` and
/// `None` become `true`, `false` and `null`.  Anything else is copied as
/// is and left for the JSON parser to accept or reject.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => copy_string(&mut out, &mut chars, c),
            '(' => out.push('['),
            ')' => out.push(']'),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    out
}

fn copy_string(
    out: &mut String,
    chars: &mut core::iter::Peekable<core::str::Chars<'_>>,
    delim: char,
) {
    out.push('"');
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let _ = write!(out, "\\u00{hex}");
                }
                Some(n) => {
                    out.push('\\');
                    out.push(n);
                }
                None => out.push('\\'),
            },
            '"' if delim == '\'' => out.push_str("\\\""),
            c if c == delim => break,
            c => out.push(c),
        }
    }
    out.push('"');
}

// ── Decoding ──────────────────────────────────────────────────

/// Parse a host-literal value.
pub fn decode(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(&normalize(text.trim()))
}

/// Parse the printed output of a `ret(...)` / `peek(...)` call.
///
/// Empty output means "nothing printed" and decodes to an empty list.
pub fn decode_records(text: &str) -> Result<Vec<ResultRecord>, serde_json::Error> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_value(decode(text)?)
}

// ── Call-text helpers ─────────────────────────────────────────

/// Split `text` on `sep` characters that sit outside strings and brackets.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
