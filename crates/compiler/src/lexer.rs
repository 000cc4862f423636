//! Lexer for Kestrel source
//!
//! A hand-coded scanner: UTF-8 source text in, flat token array out. The
//! token array always ends with an `Eof` token. Unterminated strings and
//! unrecognized characters are syntax errors carrying the offending span.

use crate::diag::SyntaxError;
use crate::token::{Token, TokenKind};
use unicode_xid::UnicodeXID;

/// Keyword table, checked after an identifier has been scanned.
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("in", TokenKind::In),
    ("as", TokenKind::As),
    ("import", TokenKind::Import),
    ("from", TokenKind::From),
    ("assert", TokenKind::Assert),
    ("throw", TokenKind::Throw),
    ("ret", TokenKind::Ret),
    ("break", TokenKind::Break),
    ("cont", TokenKind::Cont),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("elif", TokenKind::Elif),
    ("while", TokenKind::While),
    ("for", TokenKind::For),
    ("try", TokenKind::Try),
    ("catch", TokenKind::Catch),
    ("finally", TokenKind::Finally),
];

/// Unicode math symbols that alias ASCII operators or keywords.
const UNICODE_OPS: &[(&str, TokenKind)] = &[
    ("\u{2208}", TokenKind::In),     // ∈
    ("\u{221e}", TokenKind::Name),   // ∞ (an identifier)
    ("\u{2200}", TokenKind::For),    // ∀
    ("\u{2227}", TokenKind::AndAnd), // ∧
    ("\u{2228}", TokenKind::OrOr),   // ∨
    ("\u{2192}", TokenKind::Rarrow), // →
];

/// Operator/punctuator table. Symbols that contain other symbols must
/// come before them.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("...", TokenKind::DotDotDot),
    ("<<=", TokenKind::ALsh),
    (">>=", TokenKind::ARsh),
    ("**=", TokenKind::APow),
    ("//=", TokenKind::AFloordiv),
    ("===", TokenKind::Eeq),
    ("<-", TokenKind::Larrow),
    ("->", TokenKind::Rarrow),
    ("+=", TokenKind::AAdd),
    ("-=", TokenKind::ASub),
    ("*=", TokenKind::AMul),
    ("/=", TokenKind::ADiv),
    ("%=", TokenKind::AMod),
    ("|=", TokenKind::AIor),
    ("^=", TokenKind::AXor),
    ("&=", TokenKind::AAnd),
    ("==", TokenKind::Eq),
    ("!=", TokenKind::Ne),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
    ("<<", TokenKind::Lsh),
    (">>", TokenKind::Rsh),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("??", TokenKind::QuesQues),
    ("++", TokenKind::AddAdd),
    ("--", TokenKind::SubSub),
    ("**", TokenKind::Pow),
    ("//", TokenKind::Floordiv),
    (".", TokenKind::Dot),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (";", TokenKind::Semi),
    ("(", TokenKind::Lpar),
    (")", TokenKind::Rpar),
    ("[", TokenKind::Lbrk),
    ("]", TokenKind::Rbrk),
    ("{", TokenKind::Lbrc),
    ("}", TokenKind::Rbrc),
    ("=", TokenKind::Assign),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("|", TokenKind::Ior),
    ("^", TokenKind::Xor),
    ("&", TokenKind::And),
    ("+", TokenKind::Add),
    ("-", TokenKind::Sub),
    ("*", TokenKind::Mul),
    ("/", TokenKind::Div),
    ("%", TokenKind::Mod),
    ("!", TokenKind::Not),
    ("~", TokenKind::Sqig),
    ("?", TokenKind::Ques),
];

/// Whether `c` is a valid digit in base `b` (2, 8, 10, or 16).
fn is_digit(c: char, b: u32) -> bool {
    match b {
        2 => ('0'..='1').contains(&c),
        8 => ('0'..='7').contains(&c),
        10 => c.is_ascii_digit(),
        16 => c.is_ascii_hexdigit(),
        _ => false,
    }
}

/// Whether `c` can start an identifier.
fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_xid_start())
}

/// Whether `c` can continue an identifier.
fn is_name_continue(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || (!c.is_ascii() && c.is_xid_continue())
}

struct Lexer<'s> {
    fname: &'s str,
    src: &'s str,
    pos: usize,
    line: usize,
    col: usize,
    // Start of the token currently being scanned.
    spos: usize,
    sline: usize,
    scol: usize,
    toks: Vec<Token>,
}

impl<'s> Lexer<'s> {
    fn cur(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, off: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(off)
    }

    fn next_is(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn adv(&mut self) {
        if let Some(c) = self.cur() {
            self.pos += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
    }

    fn mark(&mut self) {
        self.spos = self.pos;
        self.sline = self.line;
        self.scol = self.col;
    }

    fn make(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            spos: self.spos,
            epos: self.pos,
            sline: self.sline,
            scol: self.scol,
            eline: self.line,
            ecol: self.col,
        }
    }

    fn emit(&mut self, kind: TokenKind) {
        let t = self.make(kind);
        self.toks.push(t);
    }

    fn error(&self, msg: &str) -> SyntaxError {
        SyntaxError::new(self.fname, self.src, self.make(TokenKind::Many), msg)
    }

    /// Scan a numeric literal. Assumes the current character starts one.
    fn scan_number(&mut self) {
        let mut base = 0u32;
        if self.cur() == Some('0') {
            self.adv();
            match self.cur() {
                Some('d') | Some('D') => base = 10,
                Some('b') | Some('B') => base = 2,
                Some('o') | Some('O') => base = 8,
                Some('x') | Some('X') => base = 16,
                _ => {}
            }
            if base != 0 {
                self.adv();
            }
        }
        if base == 0 {
            base = 10;
        }

        while self.cur().map(|c| is_digit(c, base)).unwrap_or(false) {
            self.adv();
        }
        let mut is_flt = self.cur() == Some('.');
        if is_flt {
            self.adv();
            while self.cur().map(|c| is_digit(c, base)).unwrap_or(false) {
                self.adv();
            }
        }
        // Exponent. In base 16 any 'e' was already consumed as a digit.
        if matches!(self.cur(), Some('e') | Some('E')) {
            is_flt = true;
            self.adv();
            if matches!(self.cur(), Some('+') | Some('-')) {
                self.adv();
            }
            while self.cur().map(|c| is_digit(c, 10)).unwrap_or(false) {
                self.adv();
            }
        }
        // Imaginary suffix.
        if matches!(self.cur(), Some('i') | Some('I')) {
            is_flt = true;
            self.adv();
        }

        self.emit(if is_flt { TokenKind::Float } else { TokenKind::Int });
    }

    /// Scan a quoted literal delimited by `q` (string or regex body).
    fn scan_quoted(&mut self, q: char, kind: TokenKind) -> Result<(), SyntaxError> {
        let triple: String = std::iter::repeat(q).take(3).collect();
        let single = q.to_string();
        let is_triple = self.next_is(&triple);
        let delim: &str = if is_triple { &triple } else { &single };

        for _ in 0..delim.len() {
            self.adv();
        }
        while self.pos < self.src.len() && !self.next_is(delim) {
            if self.cur() == Some('\\') {
                self.adv();
            }
            self.adv();
        }
        if !self.next_is(delim) {
            return Err(self.error("No end to string"));
        }
        for _ in 0..delim.len() {
            self.adv();
        }
        self.emit(kind);
        Ok(())
    }
}

/// Tokenize `src`, returning the token array (terminated by `Eof`) or a
/// syntax error with source context.
pub fn lex(fname: &str, src: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lx = Lexer {
        fname,
        src,
        pos: 0,
        line: 0,
        col: 0,
        spos: 0,
        sline: 0,
        scol: 0,
        toks: Vec::new(),
    };

    // Strip a byte-order mark if present.
    if src.starts_with('\u{feff}') {
        lx.pos = '\u{feff}'.len_utf8();
    }

    'outer: while lx.pos < src.len() {
        // Strip whitespace (but not newlines, which are tokens).
        while matches!(
            lx.cur(),
            Some(' ') | Some('\t') | Some('\u{b}') | Some('\u{c}') | Some('\r')
        ) {
            lx.adv();
        }
        if lx.pos >= src.len() {
            break;
        }

        lx.mark();
        let c = match lx.cur() {
            Some(c) => c,
            None => break,
        };

        if c == '\n' {
            lx.adv();
            lx.emit(TokenKind::Newline);
            continue;
        }
        if lx.next_is("\\\n") {
            // Line continuation.
            lx.adv();
            lx.adv();
            continue;
        }
        if c == '#' {
            // Comment to end of line, honoring `\` continuation.
            lx.adv();
            while lx.pos < src.len() {
                if lx.next_is("\\\n") {
                    lx.adv();
                    lx.adv();
                } else if lx.cur() == Some('\n') {
                    break;
                } else {
                    lx.adv();
                }
            }
            continue;
        }
        if is_digit(c, 10) || (c == '.' && lx.peek_at(1).map(|n| is_digit(n, 10)).unwrap_or(false))
        {
            lx.scan_number();
            continue;
        }
        if is_name_start(c) {
            lx.adv();
            while lx.cur().map(is_name_continue).unwrap_or(false) {
                lx.adv();
            }
            let text = &src[lx.spos..lx.pos];
            let kind = KEYWORDS
                .iter()
                .find(|(kw, _)| *kw == text)
                .map(|(_, k)| *k)
                .unwrap_or(TokenKind::Name);
            lx.emit(kind);
            continue;
        }
        if c == '"' || c == '\'' {
            lx.scan_quoted(c, TokenKind::Str)?;
            continue;
        }
        if c == '`' {
            lx.scan_quoted(c, TokenKind::Regex)?;
            continue;
        }

        for (text, kind) in UNICODE_OPS {
            if lx.next_is(text) {
                lx.adv();
                lx.emit(*kind);
                continue 'outer;
            }
        }
        for (text, kind) in OPERATORS {
            if lx.next_is(text) {
                for _ in 0..text.chars().count() {
                    lx.adv();
                }
                lx.emit(*kind);
                continue 'outer;
            }
        }

        // Unrecognized character.
        lx.adv();
        return Err(lx.error("Unexpected character"));
    }

    lx.mark();
    lx.emit(TokenKind::Eof);
    Ok(lx.toks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex("<test>", src)
            .expect("lex failed")
            .iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_expression() {
        assert_eq!(
            kinds("1 + 2 * 3"),
            vec![
                TokenKind::Int,
                TokenKind::Add,
                TokenKind::Int,
                TokenKind::Mul,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords_and_names() {
        assert_eq!(
            kinds("for x in xs"),
            vec![
                TokenKind::For,
                TokenKind::Name,
                TokenKind::In,
                TokenKind::Name,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_base_prefixes() {
        for src in ["0b1010", "0o777", "0d123", "0xFF", "0Xff"] {
            assert_eq!(kinds(src), vec![TokenKind::Int, TokenKind::Eof], "{src}");
        }
    }

    #[test]
    fn test_float_forms() {
        for src in ["1.5", ".5", "1.", "1e10", "1.5e-3", "2i", "3.0I"] {
            assert_eq!(kinds(src), vec![TokenKind::Float, TokenKind::Eof], "{src}");
        }
    }

    #[test]
    fn test_triple_punctuators() {
        assert_eq!(
            kinds("a **= b"),
            vec![
                TokenKind::Name,
                TokenKind::APow,
                TokenKind::Name,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("a <<= b >>= c"),
            vec![
                TokenKind::Name,
                TokenKind::ALsh,
                TokenKind::Name,
                TokenKind::ARsh,
                TokenKind::Name,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("a === b"),
            vec![
                TokenKind::Name,
                TokenKind::Eeq,
                TokenKind::Name,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("..."), vec![TokenKind::DotDotDot, TokenKind::Eof]);
    }

    #[test]
    fn test_strings() {
        assert_eq!(kinds("'abc'"), vec![TokenKind::Str, TokenKind::Eof]);
        assert_eq!(kinds("\"a\\\"b\""), vec![TokenKind::Str, TokenKind::Eof]);
        assert_eq!(
            kinds("'''multi\nline'''"),
            vec![TokenKind::Str, TokenKind::Eof]
        );
        assert_eq!(kinds("`a+`"), vec![TokenKind::Regex, TokenKind::Eof]);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = lex("<test>", "'abc").unwrap_err();
        assert_eq!(err.message, "No end to string");
    }

    #[test]
    fn test_unexpected_character_is_error() {
        let err = lex("<test>", "a $ b").unwrap_err();
        assert_eq!(err.message, "Unexpected character");
        assert_eq!(err.line, 0);
        assert_eq!(err.col, 2);
    }

    #[test]
    fn test_comment_and_continuation() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
        // Comment continued across a line via backslash.
        assert_eq!(
            kinds("1 # comment \\\nstill comment\n2"),
            vec![
                TokenKind::Int,
                TokenKind::Newline,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
        // Line continuation outside a comment.
        assert_eq!(
            kinds("1 + \\\n2"),
            vec![
                TokenKind::Int,
                TokenKind::Add,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_unicode_operators() {
        assert_eq!(
            kinds("x \u{2208} xs"),
            vec![
                TokenKind::Name,
                TokenKind::In,
                TokenKind::Name,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("a \u{2227} b \u{2228} c"),
            vec![
                TokenKind::Name,
                TokenKind::AndAnd,
                TokenKind::Name,
                TokenKind::OrOr,
                TokenKind::Name,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("\u{221e}"), vec![TokenKind::Name, TokenKind::Eof]);
    }

    #[test]
    fn test_bom_is_stripped() {
        assert_eq!(kinds("\u{feff}1"), vec![TokenKind::Int, TokenKind::Eof]);
    }

    #[test]
    fn test_positions_are_zero_based() {
        let toks = lex("<test>", "ab\ncd").expect("lex failed");
        assert_eq!(toks[0].sline, 0);
        assert_eq!(toks[0].scol, 0);
        // Newline token, then `cd` on line 1.
        assert_eq!(toks[2].sline, 1);
        assert_eq!(toks[2].scol, 0);
        assert_eq!(toks[2].spos, 3);
    }
}
