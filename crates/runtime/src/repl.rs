//! Interactive interpreter
//!
//! A line-oriented REPL on `rustyline`. Input keeps accumulating while
//! brackets are unbalanced, so multi-line constructs paste naturally.
//! Expression results are printed and bound to `_`; errors are reported
//! without ending the session.

use crate::context::Context;
use crate::run_source;
use kestrel_compiler::lexer::lex;
use kestrel_compiler::token::TokenKind;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

const PROMPT0: &str = ">>> ";
const PROMPT1: &str = "... ";

/// Whether the accumulated input still has open brackets. Input that
/// does not lex counts as complete so the error surfaces.
fn needs_continuation(src: &str) -> bool {
    let toks = match lex("<inter>", src) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let (mut par, mut brk, mut brc) = (0i32, 0i32, 0i32);
    for t in &toks {
        match t.kind {
            TokenKind::Lpar => par += 1,
            TokenKind::Rpar => par -= 1,
            TokenKind::Lbrk => brk += 1,
            TokenKind::Rbrk => brk -= 1,
            TokenKind::Lbrc => brc += 1,
            TokenKind::Rbrc => brc -= 1,
            _ => {}
        }
    }
    par > 0 || brk > 0 || brc > 0
}

/// Run the interactive loop until end of input. Returns the process
/// exit code.
pub fn run_repl(ctx: &mut Context) -> i32 {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: failed to initialize line editing: {e}");
            return 1;
        }
    };
    debug!("entering interactive session");

    let mut count = 0usize;
    'outer: loop {
        let mut buf = String::new();
        loop {
            let prompt = if buf.is_empty() { PROMPT0 } else { PROMPT1 };
            match rl.readline(prompt) {
                Ok(line) => {
                    buf.push_str(&line);
                    buf.push('\n');
                }
                Err(ReadlineError::Interrupted) => {
                    println!("Use CTRL-D or 'exit()' to quit");
                    continue 'outer;
                }
                Err(ReadlineError::Eof) => return 0,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return 1;
                }
            }
            if !needs_continuation(&buf) {
                break;
            }
        }

        if buf.trim().is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(buf.trim_end());

        let fname = format!("<inter-{count}>");
        count += 1;
        let vars = ctx.inter_vars.clone();
        match run_source(ctx, &fname, &buf, &vars) {
            Ok((result, is_expr)) => {
                if is_expr && !result.is_none() {
                    match ctx.repr(&result) {
                        Ok(s) => println!("{s}"),
                        Err(_) => report_pending(ctx),
                    }
                    if ctx.dict_set_str(&vars, "_", result).is_err() {
                        report_pending(ctx);
                    }
                }
            }
            Err(_) => report_pending(ctx),
        }
    }
}

/// Print and clear the pending exception.
fn report_pending(ctx: &mut Context) {
    if let Some(exc) = ctx.catch_exc() {
        eprint!("{}", ctx.format_exc(&exc));
    }
}
