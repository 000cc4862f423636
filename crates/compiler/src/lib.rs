//! Kestrel compiler front end
//!
//! Turns Kestrel source text into tokens and an abstract syntax tree:
//!
//! ```text
//! source ──lex──▶ tokens ──parse──▶ AST
//! ```
//!
//! The bytecode back end lives in `kestrel-runtime`, next to the object
//! model its constant pools are built from. Errors at this layer are
//! [`SyntaxError`]s carrying a rendered source excerpt.

pub mod ast;
pub mod diag;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Ast, AstKind, BinOp, CatchClause, CmpOp, Lit, Param, UnOp};
pub use diag::SyntaxError;
pub use lexer::lex;
pub use parser::{Parser, parse_expr, parse_prog};
pub use token::{Token, TokenKind};
