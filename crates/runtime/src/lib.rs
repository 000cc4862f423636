//! Kestrel runtime
//!
//! Everything past the parser lives here: the reference-counted object
//! model and its dispatch slots, the bytecode compiler and code objects,
//! the stack VM with frames and exception unwinding, the import system,
//! and the builtin names.
//!
//! The entry point for embedding is [`Context`]: build one, then
//! [`run_source`] Kestrel programs against it. Every interpreter
//! operation takes `&mut Context`; exclusive access to the context is
//! the interpreter lock, and independent contexts are fully isolated.
//!
//! ```no_run
//! use kestrel_runtime::{Context, run_source};
//!
//! let mut ctx = Context::new();
//! let vars = ctx.inter_vars.clone();
//! let (result, _) = run_source(&mut ctx, "<demo>", "1 + 2 * 3", &vars)
//!     .map_err(|_| "error").unwrap();
//! assert_eq!(result.as_int().map(|v| v.to_string()), Some("7".into()));
//! ```

pub mod builtins;
pub mod code;
pub mod codegen;
pub mod context;
pub mod dict;
pub mod exc;
pub mod func;
pub mod import;
pub mod iter;
pub mod number;
pub mod obj;
pub mod op;
pub mod ops;
pub mod range;
pub mod repl;
pub mod string;
pub mod types;
pub mod ucd;
pub mod ucd_module;
pub mod vm;

pub use context::{Context, Frame, Thread};
pub use exc::{ExcKind, Throw, XResult};
pub use obj::{Obj, Payload};

use kestrel_compiler::ast::{Ast, AstKind};

/// Lex, parse, compile, and execute `src` with `locals` as the variable
/// mapping. A program that reduces to a single expression evaluates to
/// that expression's value; the returned flag says so (the callers use
/// it to decide whether to echo the result).
pub fn run_source(
    ctx: &mut Context,
    fname: &str,
    src: &str,
    locals: &Obj,
) -> XResult<(Obj, bool)> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);

    let mut prog = match kestrel_compiler::parse_prog(fname, src) {
        Ok(p) => p,
        Err(e) => {
            return Err(ctx.throw(ExcKind::SyntaxError, e.to_string()));
        }
    };

    // Reduce a one-statement program to that statement.
    while matches!(prog.kind, AstKind::Block) && prog.args.len() == 1 {
        prog = prog.args.remove(0);
    }

    let is_expr = prog.is_expr();
    let prog = if is_expr {
        let tok = prog.tok;
        Ast::new(AstKind::Ret, vec![prog], tok)
    } else {
        prog
    };

    let code = codegen::compile(ctx, fname, src, &prog, None)?;
    let result = ctx.exec_code(&code, locals)?;
    Ok((result, is_expr))
}

/// Parse and evaluate a single expression.
pub fn eval_expr(ctx: &mut Context, fname: &str, src: &str, locals: &Obj) -> XResult<Obj> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    let expr = match kestrel_compiler::parse_expr(fname, src) {
        Ok(e) => e,
        Err(e) => {
            return Err(ctx.throw(ExcKind::SyntaxError, e.to_string()));
        }
    };
    let tok = expr.tok;
    let prog = Ast::new(AstKind::Ret, vec![expr], tok);
    let code = codegen::compile(ctx, fname, src, &prog, None)?;
    ctx.exec_code(&code, locals)
}
