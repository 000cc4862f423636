//! String payloads and escape processing
//!
//! `str` is immutable UTF-8 text that caches its byte length, codepoint
//! length, and hash at construction. Escape processing happens when the
//! bytecode compiler materializes a string constant, so a bad escape
//! surfaces as a syntax error with source context.

use crate::ucd;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Immutable string payload with cached lengths and hash.
pub struct StrData {
    pub text: String,
    /// Codepoint count (byte length lives on `text` itself).
    pub chars: usize,
    pub hash: u64,
}

impl StrData {
    pub fn new(text: String) -> StrData {
        let chars = text.chars().count();
        let hash = str_hash(&text);
        StrData { text, chars, hash }
    }
}

/// Compiled regex payload.
pub struct RegexData {
    pub source: String,
    pub re: regex::Regex,
}

/// Hash of string content. Shared by `str` payloads and the string-keyed
/// attribute-mapping helpers.
pub fn str_hash(text: &str) -> u64 {
    let mut h = DefaultHasher::new();
    text.hash(&mut h);
    h.finish()
}

/// Hash of a byte sequence.
pub fn bytes_hash(data: &[u8]) -> u64 {
    let mut h = DefaultHasher::new();
    data.hash(&mut h);
    h.finish()
}

/// Process the standard escape set in a string literal body.
///
/// Supported: `\\`, `\'`, `\"`, `` \` ``, `\a`, `\b`, `\f`, `\n`, `\r`,
/// `\t`, `\v`, `\xHH`, `\uHHHH`, `\UHHHHHHHH`, and `\N[NAME]` which looks
/// the codepoint up by Unicode name. Errors return a message plus the
/// byte offset of the offending escape within `raw`.
pub fn unescape(raw: &str) -> Result<String, (String, usize)> {
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i..].chars().next().expect("in-bounds char");
        if c != '\\' {
            out.push(c);
            i += c.len_utf8();
            continue;
        }
        let esc_at = i;
        i += 1;
        let e = match raw[i..].chars().next() {
            Some(e) => e,
            None => return Err(("Dangling escape at end of string".to_string(), esc_at)),
        };
        i += e.len_utf8();
        match e {
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            '`' => out.push('`'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{b}'),
            'x' | 'u' | 'U' => {
                let want = match e {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                if i + want > raw.len() || !bytes[i..i + want].iter().all(u8::is_ascii_hexdigit) {
                    return Err((
                        format!("Escape '\\{e}' requires {want} hex digits"),
                        esc_at,
                    ));
                }
                let v = u32::from_str_radix(&raw[i..i + want], 16).expect("hex digits");
                i += want;
                match char::from_u32(v) {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err((format!("Invalid codepoint U+{v:04X}"), esc_at));
                    }
                }
            }
            'N' => {
                if bytes.get(i) != Some(&b'[') {
                    return Err(("Escape '\\N' requires a '[NAME]'".to_string(), esc_at));
                }
                i += 1;
                let close = match raw[i..].find(']') {
                    Some(off) => i + off,
                    None => {
                        return Err(("Unterminated '\\N[' escape".to_string(), esc_at));
                    }
                };
                let name = &raw[i..close];
                i = close + 1;
                match ucd::codepoint_by_name(name) {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err((format!("Unknown character name '{name}'"), esc_at));
                    }
                }
            }
            other => {
                return Err((format!("Unknown escape '\\{other}'"), esc_at));
            }
        }
    }
    Ok(out)
}

/// Quote `text` the way `repr` renders strings: single quotes with the
/// standard escapes applied.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_lengths() {
        let s = StrData::new("héllo".to_string());
        assert_eq!(s.text.len(), 6);
        assert_eq!(s.chars, 5);
        assert_eq!(s.hash, str_hash("héllo"));
    }

    #[test]
    fn test_simple_escapes() {
        assert_eq!(unescape("a\\nb").unwrap(), "a\nb");
        assert_eq!(unescape("\\t\\\\").unwrap(), "\t\\");
        assert_eq!(unescape("\\'").unwrap(), "'");
    }

    #[test]
    fn test_hex_and_unicode_escapes() {
        assert_eq!(unescape("\\x41").unwrap(), "A");
        assert_eq!(unescape("\\u00e9").unwrap(), "é");
        assert_eq!(unescape("\\U0001F600").unwrap(), "\u{1f600}");
    }

    #[test]
    fn test_name_escape() {
        assert_eq!(unescape("\\N[LATIN CAPITAL LETTER A]").unwrap(), "A");
        assert_eq!(unescape("\\N[GREEK SMALL LETTER PI]").unwrap(), "\u{3c0}");
        assert!(unescape("\\N[NO SUCH NAME HOPEFULLY]").is_err());
    }

    #[test]
    fn test_bad_escapes_report_offset() {
        let (_, off) = unescape("ab\\q").unwrap_err();
        assert_eq!(off, 2);
        assert!(unescape("\\x4").is_err());
        assert!(unescape("\\N[unclosed").is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a'b"), "'a\\'b'");
        assert_eq!(quote("x\ny"), "'x\\ny'");
        assert_eq!(quote("\u{1}"), "'\\x01'");
    }
}
