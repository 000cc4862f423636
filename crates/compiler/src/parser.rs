//! Recursive-descent parser for Kestrel
//!
//! Consumes the token array produced by the lexer and builds an AST.
//! Operator precedence follows the usual C-like layering: assignment
//! (right-associative) below null-coalesce, then logical or/and,
//! membership, comparison chains, bitwise or/xor/and, shifts, additive,
//! multiplicative, unary, power (right-associative), then postfix.

use crate::ast::{Ast, AstKind, BinOp, CatchClause, CmpOp, Lit, Param, UnOp};
use crate::diag::SyntaxError;
use crate::token::{Token, TokenKind};
use num_bigint::BigInt;

pub struct Parser<'s> {
    fname: &'s str,
    src: &'s str,
    toks: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, SyntaxError>;

impl<'s> Parser<'s> {
    pub fn new(fname: &'s str, src: &'s str, toks: Vec<Token>) -> Self {
        Parser {
            fname,
            src,
            toks,
            pos: 0,
        }
    }

    /// Parse a whole program: statements until end of input.
    pub fn parse_prog(&mut self) -> PResult<Ast> {
        let start = self.cur();
        let mut stmts = Vec::new();
        loop {
            self.skip_seps();
            if self.at(TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_stmt()?);
            self.expect_stmt_end()?;
        }
        let tok = match (stmts.first(), stmts.last()) {
            (Some(f), Some(l)) => Token::combine(f.tok, l.tok),
            _ => start,
        };
        Ok(Ast::new(AstKind::Block, stmts, tok))
    }

    /// Parse a single expression spanning the whole input.
    pub fn parse_expr_only(&mut self) -> PResult<Ast> {
        self.skip_seps();
        let e = self.parse_expr()?;
        self.skip_seps();
        if !self.at(TokenKind::Eof) {
            return Err(self.err(self.cur(), "Unexpected token after expression"));
        }
        Ok(e)
    }

    // ---- token helpers ----

    fn cur(&self) -> Token {
        self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn at(&self, k: TokenKind) -> bool {
        self.kind() == k
    }

    fn advance(&mut self) -> Token {
        let t = self.cur();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, k: TokenKind) -> bool {
        if self.at(k) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, k: TokenKind, what: &str) -> PResult<Token> {
        if self.at(k) {
            Ok(self.advance())
        } else {
            Err(self.err(self.cur(), &format!("Expected {what}")))
        }
    }

    fn err(&self, tok: Token, msg: &str) -> SyntaxError {
        SyntaxError::new(self.fname, self.src, tok, msg)
    }

    fn text(&self, tok: Token) -> &'s str {
        tok.text(self.src)
    }

    /// Skip newline tokens.
    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip statement separators (newlines and semicolons).
    fn skip_seps(&mut self) {
        while matches!(self.kind(), TokenKind::Newline | TokenKind::Semi) {
            self.advance();
        }
    }

    /// A statement must be followed by a separator, `}`, or end of input.
    fn expect_stmt_end(&mut self) -> PResult<()> {
        match self.kind() {
            TokenKind::Newline | TokenKind::Semi | TokenKind::Eof | TokenKind::Rbrc => Ok(()),
            _ => Err(self.err(self.cur(), "Expected end of statement")),
        }
    }

    /// Peek past newlines for `k`; restore position if it is not there.
    fn eat_through_newlines(&mut self, k: TokenKind) -> bool {
        let save = self.pos;
        self.skip_newlines();
        if self.eat(k) {
            true
        } else {
            self.pos = save;
            false
        }
    }

    // ---- statements ----

    fn parse_stmt(&mut self) -> PResult<Ast> {
        let tok = self.cur();
        match self.kind() {
            TokenKind::Import => self.parse_import(),
            TokenKind::Ret => {
                self.advance();
                let args = if matches!(
                    self.kind(),
                    TokenKind::Newline | TokenKind::Semi | TokenKind::Eof | TokenKind::Rbrc
                ) {
                    vec![]
                } else {
                    vec![self.parse_expr()?]
                };
                Ok(Ast::new(AstKind::Ret, args, tok))
            }
            TokenKind::Throw => {
                self.advance();
                let e = self.parse_expr()?;
                Ok(Ast::new(AstKind::Throw, vec![e], tok))
            }
            TokenKind::Assert => {
                self.advance();
                let e = self.parse_expr()?;
                Ok(Ast::new(AstKind::Assert, vec![e], tok))
            }
            TokenKind::Break => {
                self.advance();
                Ok(Ast::new(AstKind::Break, vec![], tok))
            }
            TokenKind::Cont => {
                self.advance();
                Ok(Ast::new(AstKind::Cont, vec![], tok))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Lbrc => self.parse_block(),
            TokenKind::From => Err(self.err(tok, "'from' imports are not supported")),
            TokenKind::Name => {
                let text = self.text(tok);
                if text == "func" && self.peek_is_funcdef() {
                    return self.parse_funcdef(false);
                }
                if text == "type" && self.peek_is_typedef() {
                    return self.parse_typedef();
                }
                if text == "del"
                    && matches!(
                        self.toks.get(self.pos + 1).map(|t| t.kind),
                        Some(TokenKind::Name) | Some(TokenKind::Lpar)
                    )
                {
                    return self.parse_del();
                }
                let e = self.parse_expr()?;
                Ok(e)
            }
            _ => self.parse_expr(),
        }
    }

    /// `func` starts a definition when followed by `name (` or `(`.
    fn peek_is_funcdef(&self) -> bool {
        match self.toks.get(self.pos + 1).map(|t| t.kind) {
            Some(TokenKind::Name) => {
                matches!(
                    self.toks.get(self.pos + 2).map(|t| t.kind),
                    Some(TokenKind::Lpar)
                )
            }
            Some(TokenKind::Lpar) => true,
            _ => false,
        }
    }

    /// `type` starts a definition when followed by `Name {` or
    /// `Name extends`.
    fn peek_is_typedef(&self) -> bool {
        match self.toks.get(self.pos + 1) {
            Some(t) if t.kind == TokenKind::Name => {}
            _ => return false,
        }
        match self.toks.get(self.pos + 2) {
            Some(t) if t.kind == TokenKind::Lbrc => true,
            Some(t) if t.kind == TokenKind::Name => self.text(*t) == "extends",
            _ => false,
        }
    }

    /// `del d[k]`: element deletion. Only element targets are deletable.
    fn parse_del(&mut self) -> PResult<Ast> {
        let tok = self.advance(); // `del`
        let target = self.parse_expr()?;
        match target.kind {
            AstKind::Elem => Ok(Ast::new(AstKind::Del, target.args, tok)),
            _ => Err(self.err(target.tok, "'del' requires an element target like d[k]")),
        }
    }

    fn parse_import(&mut self) -> PResult<Ast> {
        let tok = self.advance();
        let mut name = String::new();
        let first = self.expect(TokenKind::Name, "module name after 'import'")?;
        name.push_str(self.text(first));
        while self.eat(TokenKind::Dot) {
            let part = self.expect(TokenKind::Name, "name after '.'")?;
            name.push('.');
            name.push_str(self.text(part));
        }
        let alias = if self.eat(TokenKind::As) {
            let a = self.expect(TokenKind::Name, "name after 'as'")?;
            Some(self.text(a).to_string())
        } else {
            None
        };
        Ok(Ast::new(AstKind::Import { name, alias }, vec![], tok))
    }

    fn parse_block(&mut self) -> PResult<Ast> {
        let tok = self.expect(TokenKind::Lbrc, "'{'")?;
        let mut stmts = Vec::new();
        loop {
            self.skip_seps();
            if self.at(TokenKind::Rbrc) {
                break;
            }
            if self.at(TokenKind::Eof) {
                return Err(self.err(tok, "Unclosed block"));
            }
            stmts.push(self.parse_stmt()?);
            self.expect_stmt_end()?;
        }
        let end = self.advance();
        Ok(Ast::new(AstKind::Block, stmts, Token::combine(tok, end)))
    }

    fn parse_if(&mut self) -> PResult<Ast> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let then = self.parse_block()?;
        let mut args = vec![cond, then];

        let save = self.pos;
        self.skip_newlines();
        if self.at(TokenKind::Elif) {
            // `elif` folds into a nested `if` in the else branch.
            args.push(self.parse_if()?);
        } else if self.at(TokenKind::Else) {
            self.advance();
            if self.at(TokenKind::If) {
                args.push(self.parse_if()?);
            } else {
                args.push(self.parse_block()?);
            }
        } else {
            self.pos = save;
        }
        Ok(Ast::new(AstKind::If, args, tok))
    }

    fn parse_while(&mut self) -> PResult<Ast> {
        let tok = self.advance();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        let mut args = vec![cond, body];
        if self.eat_through_newlines(TokenKind::Else) {
            args.push(self.parse_block()?);
        }
        Ok(Ast::new(AstKind::While, args, tok))
    }

    fn parse_for(&mut self) -> PResult<Ast> {
        let tok = self.advance();
        let var_tok = self.expect(TokenKind::Name, "loop variable after 'for'")?;
        let var = self.text(var_tok).to_string();
        self.expect(TokenKind::In, "'in' in for loop")?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        let mut args = vec![iter, body];
        if self.eat_through_newlines(TokenKind::Else) {
            args.push(self.parse_block()?);
        }
        Ok(Ast::new(AstKind::For { var }, args, tok))
    }

    fn parse_try(&mut self) -> PResult<Ast> {
        let tok = self.advance();
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.eat_through_newlines(TokenKind::Catch) {
            catches.push(self.parse_catch_clause()?);
        }
        let finally = if self.eat_through_newlines(TokenKind::Finally) {
            Some(Box::new(self.parse_block()?))
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            return Err(self.err(tok, "'try' needs at least one 'catch' or 'finally'"));
        }
        Ok(Ast::new(
            AstKind::Try { catches, finally },
            vec![body],
            tok,
        ))
    }

    fn parse_catch_clause(&mut self) -> PResult<CatchClause> {
        if self.at(TokenKind::Lbrc) {
            // `catch { .. }`: catch everything, no binding.
            let body = self.parse_block()?;
            return Ok(CatchClause {
                ty: None,
                name: None,
                body,
            });
        }
        // A bare name directly before the block binds the exception;
        // naming a type by itself needs parentheses or an `as` binding.
        if self.at(TokenKind::Name)
            && self.toks.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::Lbrc)
        {
            let name_tok = self.advance();
            let name = self.text(name_tok).to_string();
            let body = self.parse_block()?;
            return Ok(CatchClause {
                ty: None,
                name: Some(name),
                body,
            });
        }
        let expr = self.parse_expr()?;
        let name = if self.eat(TokenKind::As) {
            let name_tok = self.expect(TokenKind::Name, "name after 'as'")?;
            Some(self.text(name_tok).to_string())
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(CatchClause {
            ty: Some(expr),
            name,
            body,
        })
    }

    /// Parse `func name(params) { body }`. With `in_expr`, the name may be
    /// omitted for an anonymous function.
    fn parse_funcdef(&mut self, in_expr: bool) -> PResult<Ast> {
        let tok = self.advance(); // `func`
        let name = if self.at(TokenKind::Name) {
            let t = self.advance();
            self.text(t).to_string()
        } else if in_expr {
            String::new()
        } else {
            return Err(self.err(self.cur(), "Expected function name"));
        };

        self.expect(TokenKind::Lpar, "'(' after function name")?;
        let mut params: Vec<Param> = Vec::new();
        let mut seen_variadic = false;
        loop {
            self.skip_newlines();
            if self.eat(TokenKind::Rpar) {
                break;
            }
            let variadic = self.eat(TokenKind::Mul);
            let p_tok = self.expect(TokenKind::Name, "parameter name")?;
            let p_name = self.text(p_tok).to_string();
            if seen_variadic {
                return Err(self.err(p_tok, "No parameters may follow a variadic parameter"));
            }
            let default = if !variadic && self.eat(TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            if variadic {
                seen_variadic = true;
            }
            params.push(Param {
                name: p_name,
                default,
                variadic,
            });
            self.skip_newlines();
            if !self.eat(TokenKind::Comma) {
                self.skip_newlines();
                self.expect(TokenKind::Rpar, "')' after parameters")?;
                break;
            }
        }

        let body = self.parse_block()?;
        Ok(Ast::new(AstKind::FuncDef { name, params }, vec![body], tok))
    }

    fn parse_typedef(&mut self) -> PResult<Ast> {
        let tok = self.advance(); // `type`
        let name_tok = self.expect(TokenKind::Name, "type name after 'type'")?;
        let name = self.text(name_tok).to_string();

        let base = if self.at(TokenKind::Name) && self.text(self.cur()) == "extends" {
            self.advance();
            self.parse_expr()?
        } else {
            Ast::new(AstKind::Name("object".to_string()), vec![], name_tok)
        };

        let body = self.parse_block()?;
        Ok(Ast::new(AstKind::TypeDef { name }, vec![base, body], tok))
    }

    // ---- expressions ----

    pub fn parse_expr(&mut self) -> PResult<Ast> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> PResult<Ast> {
        let lhs = self.parse_ternary()?;
        let op = match self.kind() {
            TokenKind::Assign => BinOp::Assign,
            TokenKind::AIor => BinOp::AIor,
            TokenKind::AXor => BinOp::AXor,
            TokenKind::AAnd => BinOp::AAnd,
            TokenKind::ALsh => BinOp::ALsh,
            TokenKind::ARsh => BinOp::ARsh,
            TokenKind::AAdd => BinOp::AAdd,
            TokenKind::ASub => BinOp::ASub,
            TokenKind::AMul => BinOp::AMul,
            TokenKind::ADiv => BinOp::ADiv,
            TokenKind::AFloordiv => BinOp::AFloordiv,
            TokenKind::AMod => BinOp::AMod,
            TokenKind::APow => BinOp::APow,
            _ => return Ok(lhs),
        };
        let op_tok = self.advance();
        if !matches!(
            lhs.kind,
            AstKind::Name(_) | AstKind::Attr(_) | AstKind::Elem
        ) {
            return Err(self.err(lhs.tok, "Invalid assignment target"));
        }
        self.skip_newlines();
        let rhs = self.parse_assign()?;
        let tok = Token::combine(lhs.tok, op_tok);
        Ok(Ast::new(AstKind::Binary(op), vec![lhs, rhs], tok))
    }

    fn parse_ternary(&mut self) -> PResult<Ast> {
        let val = self.parse_coalesce()?;
        if self.at(TokenKind::If) {
            let tok = self.advance();
            let cond = self.parse_coalesce()?;
            self.expect(TokenKind::Else, "'else' in conditional expression")?;
            self.skip_newlines();
            let other = self.parse_ternary()?;
            return Ok(Ast::new(AstKind::Cond, vec![cond, val, other], tok));
        }
        Ok(val)
    }

    /// Left-associative binary level driven by a token→op table.
    fn parse_binary_level(
        &mut self,
        table: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> PResult<Ast>,
    ) -> PResult<Ast> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tk, op) in table {
                if self.at(*tk) {
                    let op_tok = self.advance();
                    self.skip_newlines();
                    let rhs = next(self)?;
                    let tok = Token::combine(lhs.tok, op_tok);
                    lhs = Ast::new(AstKind::Binary(*op), vec![lhs, rhs], tok);
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_coalesce(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::QuesQues, BinOp::Coalesce)], Self::parse_or)
    }

    fn parse_or(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::OrOr, BinOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::AndAnd, BinOp::And)], Self::parse_in)
    }

    fn parse_in(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::In, BinOp::In)], Self::parse_cmp)
    }

    /// Comparison chain: `a < b <= c` becomes one rich-comparison node
    /// carrying the operator sequence.
    fn parse_cmp(&mut self) -> PResult<Ast> {
        let first = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut operands = vec![first];
        loop {
            let op = match self.kind() {
                TokenKind::Eeq => CmpOp::Eeq,
                TokenKind::Eq => CmpOp::Eq,
                TokenKind::Ne => CmpOp::Ne,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            ops.push(op);
            operands.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Ok(operands.pop().expect("one operand"));
        }
        let tok = Token::combine(operands[0].tok, operands[operands.len() - 1].tok);
        Ok(Ast::new(AstKind::RichCmp(ops), operands, tok))
    }

    fn parse_bitor(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::Ior, BinOp::Ior)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::Xor, BinOp::Xor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> PResult<Ast> {
        self.parse_binary_level(&[(TokenKind::And, BinOp::Band)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> PResult<Ast> {
        self.parse_binary_level(
            &[(TokenKind::Lsh, BinOp::Lsh), (TokenKind::Rsh, BinOp::Rsh)],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> PResult<Ast> {
        self.parse_binary_level(
            &[(TokenKind::Add, BinOp::Add), (TokenKind::Sub, BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> PResult<Ast> {
        self.parse_binary_level(
            &[
                (TokenKind::Mul, BinOp::Mul),
                (TokenKind::Div, BinOp::Div),
                (TokenKind::Floordiv, BinOp::Floordiv),
                (TokenKind::Mod, BinOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> PResult<Ast> {
        let op = match self.kind() {
            TokenKind::Add => Some(UnOp::Pos),
            TokenKind::Sub => Some(UnOp::Neg),
            TokenKind::Sqig => Some(UnOp::Sqig),
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::AddAdd => Some(UnOp::PreInc),
            TokenKind::SubSub => Some(UnOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            let tok = self.advance();
            let operand = self.parse_unary()?;
            if matches!(op, UnOp::PreInc | UnOp::PreDec)
                && !matches!(operand.kind, AstKind::Name(_))
            {
                return Err(self.err(tok, "'++'/'--' requires a name"));
            }
            return Ok(Ast::new(AstKind::Unary(op), vec![operand], tok));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> PResult<Ast> {
        let base = self.parse_postfix()?;
        if self.at(TokenKind::Pow) {
            let tok = self.advance();
            self.skip_newlines();
            // Right-associative; the right side re-enters at unary so that
            // `2 ** -3` and `2 ** 3 ** 2` parse naturally.
            let rhs = self.parse_unary()?;
            return Ok(Ast::new(AstKind::Binary(BinOp::Pow), vec![base, rhs], tok));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> PResult<Ast> {
        let mut e = self.parse_atom()?;
        loop {
            match self.kind() {
                TokenKind::Lpar => {
                    let tok = self.advance();
                    let mut args = vec![e];
                    loop {
                        self.skip_newlines();
                        if self.eat(TokenKind::Rpar) {
                            break;
                        }
                        args.push(self.parse_expr()?);
                        self.skip_newlines();
                        if !self.eat(TokenKind::Comma) {
                            self.expect(TokenKind::Rpar, "')' after call arguments")?;
                            break;
                        }
                    }
                    let span = Token::combine(args_tok(&args), tok);
                    e = Ast::new(AstKind::Call, args, span);
                }
                TokenKind::Lbrk => {
                    let tok = self.advance();
                    let mut args = vec![e];
                    loop {
                        self.skip_newlines();
                        if self.eat(TokenKind::Rbrk) {
                            break;
                        }
                        args.push(self.parse_subscript()?);
                        self.skip_newlines();
                        if !self.eat(TokenKind::Comma) {
                            self.expect(TokenKind::Rbrk, "']' after index")?;
                            break;
                        }
                    }
                    if args.len() == 1 {
                        return Err(self.err(tok, "Empty index"));
                    }
                    let span = Token::combine(args_tok(&args), tok);
                    e = Ast::new(AstKind::Elem, args, span);
                }
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect(TokenKind::Name, "attribute name after '.'")?;
                    let name = self.text(name_tok).to_string();
                    let tok = Token::combine(e.tok, name_tok);
                    e = Ast::new(AstKind::Attr(name), vec![e], tok);
                }
                TokenKind::AddAdd => {
                    let tok = self.advance();
                    if !matches!(e.kind, AstKind::Name(_)) {
                        return Err(self.err(tok, "'++'/'--' requires a name"));
                    }
                    e = Ast::new(AstKind::Unary(UnOp::PostInc), vec![e], tok);
                }
                TokenKind::SubSub => {
                    let tok = self.advance();
                    if !matches!(e.kind, AstKind::Name(_)) {
                        return Err(self.err(tok, "'++'/'--' requires a name"));
                    }
                    e = Ast::new(AstKind::Unary(UnOp::PostDec), vec![e], tok);
                }
                _ => return Ok(e),
            }
        }
    }

    /// One subscript element: an expression, or a `start:end:step` slice
    /// with any part omitted.
    fn parse_subscript(&mut self) -> PResult<Ast> {
        let tok = self.cur();
        let none = |t: Token| Ast::new(AstKind::Name("none".to_string()), vec![], t);

        let start = if self.at(TokenKind::Colon) {
            none(tok)
        } else {
            self.parse_expr()?
        };
        if !self.at(TokenKind::Colon) {
            return Ok(start);
        }
        self.advance();
        let end = if matches!(self.kind(), TokenKind::Colon | TokenKind::Comma | TokenKind::Rbrk)
        {
            none(tok)
        } else {
            self.parse_expr()?
        };
        let step = if self.eat(TokenKind::Colon) {
            if matches!(self.kind(), TokenKind::Comma | TokenKind::Rbrk) {
                none(tok)
            } else {
                self.parse_expr()?
            }
        } else {
            none(tok)
        };
        Ok(Ast::new(AstKind::SliceDisplay, vec![start, end, step], tok))
    }

    fn parse_atom(&mut self) -> PResult<Ast> {
        let tok = self.cur();
        match self.kind() {
            TokenKind::Int => {
                self.advance();
                let lit = self.parse_int_lit(tok)?;
                Ok(Ast::new(AstKind::Const(lit), vec![], tok))
            }
            TokenKind::Float => {
                self.advance();
                let lit = self.parse_float_lit(tok)?;
                Ok(Ast::new(AstKind::Const(lit), vec![], tok))
            }
            TokenKind::Str => {
                self.advance();
                let raw = strip_quotes(self.text(tok));
                Ok(Ast::new(
                    AstKind::Const(Lit::Str {
                        raw: raw.to_string(),
                    }),
                    vec![],
                    tok,
                ))
            }
            TokenKind::Regex => {
                self.advance();
                let raw = strip_quotes(self.text(tok));
                Ok(Ast::new(
                    AstKind::Const(Lit::Regex {
                        raw: raw.to_string(),
                    }),
                    vec![],
                    tok,
                ))
            }
            TokenKind::Name => {
                if self.text(tok) == "func" && self.peek_is_funcdef() {
                    return self.parse_funcdef(true);
                }
                self.advance();
                Ok(Ast::new(
                    AstKind::Name(self.text(tok).to_string()),
                    vec![],
                    tok,
                ))
            }
            TokenKind::Lpar => {
                self.advance();
                self.skip_newlines();
                if self.at(TokenKind::Rpar) {
                    let end = self.advance();
                    return Ok(Ast::new(
                        AstKind::TupleDisplay,
                        vec![],
                        Token::combine(tok, end),
                    ));
                }
                let first = self.parse_expr()?;
                self.skip_newlines();
                if self.eat(TokenKind::Comma) {
                    let mut elems = vec![first];
                    loop {
                        self.skip_newlines();
                        if self.at(TokenKind::Rpar) {
                            break;
                        }
                        elems.push(self.parse_expr()?);
                        self.skip_newlines();
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::Rpar, "')' after tuple")?;
                    return Ok(Ast::new(
                        AstKind::TupleDisplay,
                        elems,
                        Token::combine(tok, end),
                    ));
                }
                self.expect(TokenKind::Rpar, "')'")?;
                Ok(first)
            }
            TokenKind::Lbrk => {
                self.advance();
                let mut elems = Vec::new();
                loop {
                    self.skip_newlines();
                    if self.at(TokenKind::Rbrk) {
                        break;
                    }
                    elems.push(self.parse_expr()?);
                    self.skip_newlines();
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(TokenKind::Rbrk, "']' after list")?;
                Ok(Ast::new(
                    AstKind::ListDisplay,
                    elems,
                    Token::combine(tok, end),
                ))
            }
            TokenKind::Lbrc => {
                self.advance();
                self.skip_newlines();
                if self.at(TokenKind::Rbrc) {
                    let end = self.advance();
                    return Ok(Ast::new(
                        AstKind::DictDisplay,
                        vec![],
                        Token::combine(tok, end),
                    ));
                }
                let first = self.parse_expr()?;
                if self.at(TokenKind::Colon) {
                    // Dict display: alternate keys and values.
                    self.advance();
                    self.skip_newlines();
                    let mut args = vec![first, self.parse_expr()?];
                    loop {
                        self.skip_newlines();
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                        self.skip_newlines();
                        if self.at(TokenKind::Rbrc) {
                            break;
                        }
                        args.push(self.parse_expr()?);
                        self.skip_newlines();
                        self.expect(TokenKind::Colon, "':' in dict entry")?;
                        self.skip_newlines();
                        args.push(self.parse_expr()?);
                    }
                    self.skip_newlines();
                    let end = self.expect(TokenKind::Rbrc, "'}' after dict")?;
                    return Ok(Ast::new(
                        AstKind::DictDisplay,
                        args,
                        Token::combine(tok, end),
                    ));
                }
                // Set display.
                let mut elems = vec![first];
                loop {
                    self.skip_newlines();
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                    self.skip_newlines();
                    if self.at(TokenKind::Rbrc) {
                        break;
                    }
                    elems.push(self.parse_expr()?);
                }
                self.skip_newlines();
                let end = self.expect(TokenKind::Rbrc, "'}' after set")?;
                Ok(Ast::new(
                    AstKind::SetDisplay,
                    elems,
                    Token::combine(tok, end),
                ))
            }
            _ => Err(self.err(tok, "Unexpected token")),
        }
    }

    // ---- literal conversion ----

    fn parse_int_lit(&self, tok: Token) -> PResult<Lit> {
        let text = self.text(tok);
        let (radix, digits) = split_base_prefix(text);
        BigInt::parse_bytes(digits.as_bytes(), radix)
            .map(Lit::Int)
            .ok_or_else(|| self.err(tok, "Invalid integer literal"))
    }

    fn parse_float_lit(&self, tok: Token) -> PResult<Lit> {
        let mut text = self.text(tok);
        let imag = text.ends_with('i') || text.ends_with('I');
        if imag {
            text = &text[..text.len() - 1];
        }
        let (radix, digits) = split_base_prefix(text);
        if radix != 10 {
            return Err(self.err(tok, "Float literals must be decimal"));
        }
        let v: f64 = digits
            .parse()
            .map_err(|_| self.err(tok, "Invalid float literal"))?;
        Ok(if imag { Lit::Imag(v) } else { Lit::Float(v) })
    }
}

/// First element's token, used when combining call spans.
fn args_tok(args: &[Ast]) -> Token {
    args.first().map(|a| a.tok).unwrap_or_else(Token::empty)
}

/// Split an optional `0b`/`0o`/`0d`/`0x` base prefix from a numeric
/// literal's text.
fn split_base_prefix(text: &str) -> (u32, &str) {
    let bytes = text.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'b' | b'B' => return (2, &text[2..]),
            b'o' | b'O' => return (8, &text[2..]),
            b'd' | b'D' => return (10, &text[2..]),
            b'x' | b'X' => return (16, &text[2..]),
            _ => {}
        }
    }
    (10, text)
}

/// Remove the surrounding quotes (single or triple) from a quoted token.
fn strip_quotes(text: &str) -> &str {
    let q = text.as_bytes()[0];
    let triple = text.len() >= 6 && text.as_bytes()[1] == q && text.as_bytes()[2] == q;
    if triple {
        &text[3..text.len() - 3]
    } else {
        &text[1..text.len() - 1]
    }
}

/// Lex and parse a whole program.
pub fn parse_prog(fname: &str, src: &str) -> Result<Ast, SyntaxError> {
    let toks = crate::lexer::lex(fname, src)?;
    Parser::new(fname, src, toks).parse_prog()
}

/// Lex and parse a single expression.
pub fn parse_expr(fname: &str, src: &str) -> Result<Ast, SyntaxError> {
    let toks = crate::lexer::lex(fname, src)?;
    Parser::new(fname, src, toks).parse_expr_only()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Ast {
        parse_expr("<test>", src).expect("parse failed")
    }

    fn prog(src: &str) -> Ast {
        parse_prog("<test>", src).expect("parse failed")
    }

    #[test]
    fn test_precedence_additive_multiplicative() {
        // 1 + 2 * 3 parses as additive-of-(1, multiplicative-of-(2, 3)).
        let e = expr("1 + 2 * 3");
        assert_eq!(e.kind, AstKind::Binary(BinOp::Add));
        assert_eq!(e.args[0].kind, AstKind::Const(Lit::Int(BigInt::from(1))));
        assert_eq!(e.args[1].kind, AstKind::Binary(BinOp::Mul));
    }

    #[test]
    fn test_power_is_right_associative() {
        let e = expr("2 ** 3 ** 2");
        assert_eq!(e.kind, AstKind::Binary(BinOp::Pow));
        assert_eq!(e.args[1].kind, AstKind::Binary(BinOp::Pow));
    }

    #[test]
    fn test_comparison_chain_is_one_node() {
        let e = expr("a < b <= c");
        match &e.kind {
            AstKind::RichCmp(ops) => {
                assert_eq!(ops, &vec![CmpOp::Lt, CmpOp::Le]);
                assert_eq!(e.args.len(), 3);
            }
            k => panic!("expected RichCmp, got {k:?}"),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let e = expr("a = b = 1");
        assert_eq!(e.kind, AstKind::Binary(BinOp::Assign));
        assert_eq!(e.args[1].kind, AstKind::Binary(BinOp::Assign));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_expr("<test>", "1 + 2 = 3").is_err());
    }

    #[test]
    fn test_call_attr_index_postfix() {
        let e = expr("a.b(1)[2]");
        assert_eq!(e.kind, AstKind::Elem);
        assert_eq!(e.args[0].kind, AstKind::Call);
        assert_eq!(e.args[0].args[0].kind, AstKind::Attr("b".to_string()));
    }

    #[test]
    fn test_displays() {
        assert_eq!(expr("[1, 2]").kind, AstKind::ListDisplay);
        assert_eq!(expr("(1, 2)").kind, AstKind::TupleDisplay);
        assert_eq!(expr("()").kind, AstKind::TupleDisplay);
        assert_eq!(expr("{1, 2}").kind, AstKind::SetDisplay);
        assert_eq!(expr("{}").kind, AstKind::DictDisplay);
        let d = expr("{'a': 1, 'b': 2}");
        assert_eq!(d.kind, AstKind::DictDisplay);
        assert_eq!(d.args.len(), 4);
    }

    #[test]
    fn test_grouping_is_not_a_tuple() {
        assert_eq!(expr("(1 + 2)").kind, AstKind::Binary(BinOp::Add));
    }

    #[test]
    fn test_slice_subscript() {
        let e = expr("a[1:2]");
        assert_eq!(e.kind, AstKind::Elem);
        assert_eq!(e.args[1].kind, AstKind::SliceDisplay);
        let full = expr("a[::2]");
        assert_eq!(full.args[1].kind, AstKind::SliceDisplay);
        assert_eq!(full.args[1].args[0].kind, AstKind::Name("none".to_string()));
    }

    #[test]
    fn test_funcdef_with_defaults_and_variadic() {
        let p = prog("func f(a, b=2, *c) { ret (a, b, c) }");
        match &p.args[0].kind {
            AstKind::FuncDef { name, params } => {
                assert_eq!(name, "f");
                assert_eq!(params.len(), 3);
                assert!(params[0].default.is_none());
                assert!(params[1].default.is_some());
                assert!(params[2].variadic);
            }
            k => panic!("expected FuncDef, got {k:?}"),
        }
    }

    #[test]
    fn test_variadic_must_be_last() {
        assert!(parse_prog("<test>", "func f(*a, b) { }").is_err());
    }

    #[test]
    fn test_elif_folds_into_else() {
        let p = prog("if a { 1 } elif b { 2 } else { 3 }");
        match &p.args[0].kind {
            AstKind::If => {
                let outer = &p.args[0];
                assert_eq!(outer.args.len(), 3);
                assert_eq!(outer.args[2].kind, AstKind::If);
            }
            k => panic!("expected If, got {k:?}"),
        }
    }

    #[test]
    fn test_for_loop() {
        let p = prog("for i in range(3) { x.push(i*i) }");
        match &p.args[0].kind {
            AstKind::For { var } => assert_eq!(var, "i"),
            k => panic!("expected For, got {k:?}"),
        }
    }

    #[test]
    fn test_try_catch_forms() {
        let p = prog("try { f() } catch e { e }");
        match &p.args[0].kind {
            AstKind::Try { catches, finally } => {
                assert_eq!(catches.len(), 1);
                assert!(catches[0].ty.is_none());
                assert_eq!(catches[0].name.as_deref(), Some("e"));
                assert!(finally.is_none());
            }
            k => panic!("expected Try, got {k:?}"),
        }

        let p = prog("try { f() } catch Error as e { e } catch { 0 } finally { g() }");
        match &p.args[0].kind {
            AstKind::Try { catches, finally } => {
                assert_eq!(catches.len(), 2);
                assert!(catches[0].ty.is_some());
                assert_eq!(catches[0].name.as_deref(), Some("e"));
                assert!(catches[1].ty.is_none());
                assert!(catches[1].name.is_none());
                assert!(finally.is_some());
            }
            k => panic!("expected Try, got {k:?}"),
        }
    }

    #[test]
    fn test_try_requires_catch_or_finally() {
        assert!(parse_prog("<test>", "try { f() }").is_err());
    }

    #[test]
    fn test_typedef() {
        let p = prog("type Point extends object { func get(self) { ret 1 } }");
        match &p.args[0].kind {
            AstKind::TypeDef { name } => assert_eq!(name, "Point"),
            k => panic!("expected TypeDef, got {k:?}"),
        }
    }

    #[test]
    fn test_type_call_is_not_typedef() {
        let p = prog("type(x)");
        assert_eq!(p.args[0].kind, AstKind::Call);
    }

    #[test]
    fn test_import_forms() {
        let p = prog("import a.b.c as d");
        match &p.args[0].kind {
            AstKind::Import { name, alias } => {
                assert_eq!(name, "a.b.c");
                assert_eq!(alias.as_deref(), Some("d"));
            }
            k => panic!("expected Import, got {k:?}"),
        }
    }

    #[test]
    fn test_ternary() {
        let e = expr("1 if x else 2");
        assert_eq!(e.kind, AstKind::Cond);
        assert_eq!(e.args.len(), 3);
    }

    #[test]
    fn test_base_prefixed_ints() {
        match expr("0xff").kind {
            AstKind::Const(Lit::Int(v)) => assert_eq!(v, BigInt::from(255)),
            k => panic!("expected int, got {k:?}"),
        }
        match expr("0b101").kind {
            AstKind::Const(Lit::Int(v)) => assert_eq!(v, BigInt::from(5)),
            k => panic!("expected int, got {k:?}"),
        }
    }

    #[test]
    fn test_imaginary_literal() {
        match expr("2i").kind {
            AstKind::Const(Lit::Imag(v)) => assert_eq!(v, 2.0),
            k => panic!("expected imaginary, got {k:?}"),
        }
    }

    #[test]
    fn test_statement_separators() {
        let p = prog("x = []; x");
        assert_eq!(p.args.len(), 2);
        let p = prog("x = 1\ny = 2\n");
        assert_eq!(p.args.len(), 2);
    }

    #[test]
    fn test_anonymous_func_expression() {
        let p = prog("f = func (a) { ret a }");
        match &p.args[0].kind {
            AstKind::Binary(BinOp::Assign) => match &p.args[0].args[1].kind {
                AstKind::FuncDef { name, .. } => assert!(name.is_empty()),
                k => panic!("expected FuncDef, got {k:?}"),
            },
            k => panic!("expected assignment, got {k:?}"),
        }
    }

    #[test]
    fn test_del_statement() {
        let p = prog("del d['a']");
        match &p.args[0].kind {
            AstKind::Del => assert_eq!(p.args[0].args.len(), 2),
            k => panic!("expected Del, got {k:?}"),
        }
        // Only element targets are deletable.
        assert!(parse_prog("<test>", "del x").is_err());
    }

    #[test]
    fn test_coalesce_and_logic() {
        let e = expr("a ?? b || c && d");
        assert_eq!(e.kind, AstKind::Binary(BinOp::Coalesce));
    }
}
