//! Source-context diagnostics
//!
//! Any token-bearing error renders an excerpt of the offending line with a
//! caret/underline beneath the span, followed by an `@ Line L, Col C in
//! <file>` footer. Lines and columns are stored zero-based and displayed
//! one-based.

use crate::token::Token;

/// A syntax error carrying a rendered source excerpt.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    /// Short description of what went wrong.
    pub message: String,
    /// Rendered excerpt: source line, caret/underline, location footer.
    pub excerpt: String,
    /// File the error came from.
    pub file: String,
    /// Line (0-indexed).
    pub line: usize,
    /// Column (0-indexed).
    pub col: usize,
}

impl SyntaxError {
    /// Build a syntax error for `tok` within `src`, rendering the excerpt.
    pub fn new(file: &str, src: &str, tok: Token, message: impl Into<String>) -> Self {
        SyntaxError {
            message: message.into(),
            excerpt: render_excerpt(file, src, tok),
            file: file.to_string(),
            line: tok.sline,
            col: tok.scol,
        }
    }
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.message, self.excerpt)
    }
}

impl std::error::Error for SyntaxError {}

/// Render the line containing `tok` with a `^~~~` underline and footer.
///
/// A span that crosses lines is underlined to the end of its first line
/// and marked as continuing.
pub fn render_excerpt(file: &str, src: &str, tok: Token) -> String {
    if src.is_empty() {
        return format!("@ <EOF> in {file}");
    }
    let spos = tok.spos.min(src.len());

    // Find the line boundaries around the start of the span.
    let line_start = src[..spos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = src[spos..]
        .find('\n')
        .map(|i| spos + i)
        .unwrap_or(src.len());

    let line = &src[line_start..line_end];
    let multi = tok.sline != tok.eline;

    // Width of the underline, in characters of the spanned text.
    let span_end = if multi { line_end } else { tok.epos.min(line_end) };
    let span_chars = src[spos..span_end.max(spos)].chars().count();
    let lead_chars = src[line_start..spos].chars().count();

    let mut out = String::new();
    out.push_str(line);
    out.push('\n');
    for _ in 0..lead_chars {
        out.push(' ');
    }
    out.push('^');
    for _ in 1..span_chars.max(1) {
        out.push('~');
    }
    if multi {
        out.push_str(" (continued on next line)");
    }
    out.push('\n');
    out.push_str(&format!(
        "@ Line {}, Col {} in {}",
        tok.sline + 1,
        tok.scol + 1,
        file
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;

    fn tok(spos: usize, epos: usize, sline: usize, scol: usize) -> Token {
        Token {
            kind: TokenKind::Many,
            spos,
            epos,
            sline,
            scol,
            eline: sline,
            ecol: scol + (epos - spos),
        }
    }

    #[test]
    fn test_excerpt_underlines_span() {
        let src = "x = 1 +* 2";
        let e = SyntaxError::new("test.ks", src, tok(7, 8, 0, 7), "Unexpected character");
        assert!(e.excerpt.contains("x = 1 +* 2"));
        assert!(e.excerpt.contains("       ^"));
        assert!(e.excerpt.contains("@ Line 1, Col 8 in test.ks"));
    }

    #[test]
    fn test_excerpt_second_line() {
        let src = "a = 1\nb = $\n";
        let e = SyntaxError::new("t.ks", src, tok(10, 11, 1, 4), "Unexpected character");
        assert!(e.excerpt.contains("b = $"));
        assert!(!e.excerpt.contains("a = 1"));
        assert!(e.excerpt.contains("@ Line 2, Col 5 in t.ks"));
    }

    #[test]
    fn test_display_includes_message() {
        let src = "oops";
        let e = SyntaxError::new("t.ks", src, tok(0, 4, 0, 0), "No end to string");
        let s = format!("{e}");
        assert!(s.starts_with("No end to string\n"));
        assert!(s.contains("^~~~"));
    }
}
