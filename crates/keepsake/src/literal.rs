//! Literal formatting: numbers, strings, identifiers
//!
//! Everything here is independent of the graph traversal, so the textual
//! round trip can be tested on its own.

use std::fmt::{self, Write};

/// Reserved words that can never be used as bare names or `.field` keys.
pub const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Check if `s` can be written as a bare name.
pub fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_') && !KEYWORDS.contains(&s)
}

/// Lossless text for a float.
///
/// Finite values use the shortest representation that parses back to the
/// same bits, always with a `.` or exponent so they stay floats.
/// Non-finite values use the division forms `1/0`, `-1/0` and `0/0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "0/0".to_string()
    } else if n == f64::INFINITY {
        "1/0".to_string()
    } else if n == f64::NEG_INFINITY {
        "-1/0".to_string()
    } else {
        format!("{:?}", n)
    }
}

/// Write `bytes` as a quoted string literal.
///
/// - `\` and `"` are backslash-escaped, newline becomes `\n`
/// - bytes outside printable ASCII become decimal escapes (`\0`, `\200`)
/// - a digit directly after a decimal escape is escaped too, so `\1` + `2`
///   never reads back as `\12`
pub fn write_escaped<W: Write>(out: &mut W, bytes: &[u8]) -> fmt::Result {
    out.write_char('"')?;
    let mut after_decimal = false;
    for &b in bytes {
        let decimal = match b {
            b'\\' => {
                out.write_str("\\\\")?;
                false
            }
            b'"' => {
                out.write_str("\\\"")?;
                false
            }
            b'\n' => {
                out.write_str("\\n")?;
                false
            }
            b'0'..=b'9' if after_decimal => {
                write!(out, "\\{}", b)?;
                true
            }
            0x20..=0x7e => {
                out.write_char(b as char)?;
                false
            }
            _ => {
                write!(out, "\\{}", b)?;
                true
            }
        };
        after_decimal = decimal;
    }
    out.write_char('"')
}

/// Quote and escape `bytes` into a new string.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    // Writing to a String cannot fail
    let _ = write_escaped(&mut out, bytes);
    out
}

/// Decode the body of a string literal (without the surrounding quotes).
///
/// Accepts everything [`write_escaped`] produces plus the usual single-letter
/// escapes (`\t`, `\r`, `\a`, `\b`, `\f`, `\v`, `\'`).
pub fn unescape(body: &str) -> Result<Vec<u8>, String> {
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        let Some(&next) = bytes.get(i + 1) else {
            return Err("unfinished escape at end of string".to_string());
        };
        i += 2;
        let decoded = match next {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'v' => 0x0b,
            b'\\' => b'\\',
            b'"' => b'"',
            b'\'' => b'\'',
            b'0'..=b'9' => {
                let mut value = u32::from(next - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match bytes.get(i) {
                        Some(d @ b'0'..=b'9') => {
                            value = value * 10 + u32::from(d - b'0');
                            digits += 1;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                u8::try_from(value).map_err(|_| format!("decimal escape \\{} too large", value))?
            }
            other => return Err(format!("invalid escape \\{}", other as char)),
        };
        out.push(decoded);
    }
    Ok(out)
}
