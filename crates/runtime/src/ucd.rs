//! Unicode character database lookups
//!
//! The name ↔ codepoint mapping consumed by `\N[NAME]` escapes and
//! exposed to programs as the builtin `ucd` module. Coverage is a compact
//! internal table: algorithmic names for Latin letters and digits, the
//! Greek alphabet, ASCII punctuation, and a handful of common symbols.
//! Unknown names simply miss; callers decide how to report that.

/// Greek letter names in alphabet order with capital/small codepoints.
const GREEK: &[(&str, u32, u32)] = &[
    ("ALPHA", 0x0391, 0x03B1),
    ("BETA", 0x0392, 0x03B2),
    ("GAMMA", 0x0393, 0x03B3),
    ("DELTA", 0x0394, 0x03B4),
    ("EPSILON", 0x0395, 0x03B5),
    ("ZETA", 0x0396, 0x03B6),
    ("ETA", 0x0397, 0x03B7),
    ("THETA", 0x0398, 0x03B8),
    ("IOTA", 0x0399, 0x03B9),
    ("KAPPA", 0x039A, 0x03BA),
    ("LAMDA", 0x039B, 0x03BB),
    ("MU", 0x039C, 0x03BC),
    ("NU", 0x039D, 0x03BD),
    ("XI", 0x039E, 0x03BE),
    ("OMICRON", 0x039F, 0x03BF),
    ("PI", 0x03A0, 0x03C0),
    ("RHO", 0x03A1, 0x03C1),
    ("SIGMA", 0x03A3, 0x03C3),
    ("TAU", 0x03A4, 0x03C4),
    ("UPSILON", 0x03A5, 0x03C5),
    ("PHI", 0x03A6, 0x03C6),
    ("CHI", 0x03A7, 0x03C7),
    ("PSI", 0x03A8, 0x03C8),
    ("OMEGA", 0x03A9, 0x03C9),
];

/// Fixed names for ASCII punctuation and common symbols.
const NAMED: &[(&str, char)] = &[
    ("SPACE", ' '),
    ("EXCLAMATION MARK", '!'),
    ("QUOTATION MARK", '"'),
    ("NUMBER SIGN", '#'),
    ("DOLLAR SIGN", '$'),
    ("PERCENT SIGN", '%'),
    ("AMPERSAND", '&'),
    ("APOSTROPHE", '\''),
    ("LEFT PARENTHESIS", '('),
    ("RIGHT PARENTHESIS", ')'),
    ("ASTERISK", '*'),
    ("PLUS SIGN", '+'),
    ("COMMA", ','),
    ("HYPHEN-MINUS", '-'),
    ("FULL STOP", '.'),
    ("SOLIDUS", '/'),
    ("COLON", ':'),
    ("SEMICOLON", ';'),
    ("LESS-THAN SIGN", '<'),
    ("EQUALS SIGN", '='),
    ("GREATER-THAN SIGN", '>'),
    ("QUESTION MARK", '?'),
    ("COMMERCIAL AT", '@'),
    ("LEFT SQUARE BRACKET", '['),
    ("REVERSE SOLIDUS", '\\'),
    ("RIGHT SQUARE BRACKET", ']'),
    ("CIRCUMFLEX ACCENT", '^'),
    ("LOW LINE", '_'),
    ("GRAVE ACCENT", '`'),
    ("LEFT CURLY BRACKET", '{'),
    ("VERTICAL LINE", '|'),
    ("RIGHT CURLY BRACKET", '}'),
    ("TILDE", '~'),
    ("NO-BREAK SPACE", '\u{a0}'),
    ("GREEK SMALL LETTER FINAL SIGMA", '\u{3c2}'),
    ("EM DASH", '\u{2014}'),
    ("BULLET", '\u{2022}'),
    ("HORIZONTAL ELLIPSIS", '\u{2026}'),
    ("RIGHTWARDS ARROW", '\u{2192}'),
    ("FOR ALL", '\u{2200}'),
    ("ELEMENT OF", '\u{2208}'),
    ("INFINITY", '\u{221e}'),
    ("LOGICAL AND", '\u{2227}'),
    ("LOGICAL OR", '\u{2228}'),
    ("LATIN SMALL LETTER E WITH ACUTE", '\u{e9}'),
    ("LATIN CAPITAL LETTER E WITH ACUTE", '\u{c9}'),
];

const DIGITS: &[&str] = &[
    "ZERO", "ONE", "TWO", "THREE", "FOUR", "FIVE", "SIX", "SEVEN", "EIGHT", "NINE",
];

/// Resolve a Unicode character name to its codepoint.
pub fn codepoint_by_name(name: &str) -> Option<char> {
    if let Some(rest) = name.strip_prefix("LATIN CAPITAL LETTER ") {
        let mut cs = rest.chars();
        if let (Some(c), None) = (cs.next(), cs.next()) {
            if c.is_ascii_uppercase() {
                return Some(c);
            }
        }
    }
    if let Some(rest) = name.strip_prefix("LATIN SMALL LETTER ") {
        let mut cs = rest.chars();
        if let (Some(c), None) = (cs.next(), cs.next()) {
            if c.is_ascii_uppercase() {
                return Some(c.to_ascii_lowercase());
            }
        }
    }
    if let Some(rest) = name.strip_prefix("DIGIT ") {
        if let Some(d) = DIGITS.iter().position(|n| *n == rest) {
            return char::from_u32('0' as u32 + d as u32);
        }
    }
    if let Some(rest) = name.strip_prefix("GREEK CAPITAL LETTER ") {
        if let Some((_, cap, _)) = GREEK.iter().find(|(n, _, _)| *n == rest) {
            return char::from_u32(*cap);
        }
    }
    if let Some(rest) = name.strip_prefix("GREEK SMALL LETTER ") {
        if let Some((_, _, small)) = GREEK.iter().find(|(n, _, _)| *n == rest) {
            return char::from_u32(*small);
        }
    }
    NAMED.iter().find(|(n, _)| *n == name).map(|(_, c)| *c)
}

/// Name of a codepoint, when the table covers it.
pub fn name_of(c: char) -> Option<String> {
    if c.is_ascii_uppercase() {
        return Some(format!("LATIN CAPITAL LETTER {c}"));
    }
    if c.is_ascii_lowercase() {
        return Some(format!("LATIN SMALL LETTER {}", c.to_ascii_uppercase()));
    }
    if c.is_ascii_digit() {
        let d = (c as usize) - ('0' as usize);
        return Some(format!("DIGIT {}", DIGITS[d]));
    }
    let cp = c as u32;
    if let Some((n, _, _)) = GREEK.iter().find(|(_, cap, _)| *cap == cp) {
        return Some(format!("GREEK CAPITAL LETTER {n}"));
    }
    if let Some((n, _, _)) = GREEK.iter().find(|(_, _, small)| *small == cp) {
        return Some(format!("GREEK SMALL LETTER {n}"));
    }
    NAMED
        .iter()
        .find(|(_, ch)| *ch == c)
        .map(|(n, _)| n.to_string())
}

/// Rough general category of a codepoint.
pub fn category(c: char) -> &'static str {
    if c.is_uppercase() {
        "Lu"
    } else if c.is_lowercase() {
        "Ll"
    } else if c.is_alphabetic() {
        "Lo"
    } else if c.is_numeric() {
        "Nd"
    } else if c.is_whitespace() {
        "Zs"
    } else if c.is_control() {
        "Cc"
    } else if c.is_ascii_punctuation() {
        "Po"
    } else {
        "So"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin_names() {
        assert_eq!(codepoint_by_name("LATIN CAPITAL LETTER A"), Some('A'));
        assert_eq!(codepoint_by_name("LATIN SMALL LETTER Z"), Some('z'));
        assert_eq!(codepoint_by_name("LATIN CAPITAL LETTER AA"), None);
    }

    #[test]
    fn test_digits() {
        assert_eq!(codepoint_by_name("DIGIT ZERO"), Some('0'));
        assert_eq!(codepoint_by_name("DIGIT NINE"), Some('9'));
    }

    #[test]
    fn test_greek() {
        assert_eq!(codepoint_by_name("GREEK SMALL LETTER PI"), Some('\u{3c0}'));
        assert_eq!(
            codepoint_by_name("GREEK CAPITAL LETTER OMEGA"),
            Some('\u{3a9}')
        );
    }

    #[test]
    fn test_round_trip() {
        for name in [
            "LATIN CAPITAL LETTER Q",
            "DIGIT FOUR",
            "GREEK SMALL LETTER SIGMA",
            "COMMERCIAL AT",
            "INFINITY",
        ] {
            let c = codepoint_by_name(name).expect(name);
            assert_eq!(name_of(c).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_category() {
        assert_eq!(category('A'), "Lu");
        assert_eq!(category('a'), "Ll");
        assert_eq!(category('3'), "Nd");
        assert_eq!(category(' '), "Zs");
    }
}
