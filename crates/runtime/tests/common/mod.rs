//! Shared helpers for the integration tests.
#![allow(dead_code)]

use kestrel_runtime::{Context, Obj, run_source};

/// A fresh interpreter.
pub fn ctx() -> Context {
    Context::new()
}

/// Run a program against the context's interpreter variables, panicking
/// with the rendered exception on failure. Returns the program's value
/// (`none` unless it reduced to a single expression).
pub fn run(ctx: &mut Context, src: &str) -> Obj {
    let vars = ctx.inter_vars.clone();
    match run_source(ctx, "<test>", src, &vars) {
        Ok((v, _)) => v,
        Err(_) => {
            let exc = ctx.catch_exc().expect("pending exception after Err");
            panic!("program failed:\n{}\nsource: {src}", ctx.format_exc(&exc));
        }
    }
}

/// Run and render the result with `repr`.
pub fn run_repr(ctx: &mut Context, src: &str) -> String {
    let v = run(ctx, src);
    ctx.repr(&v).expect("repr succeeds")
}

/// Run a program that must fail; returns the exception object.
pub fn run_err(ctx: &mut Context, src: &str) -> Obj {
    let vars = ctx.inter_vars.clone();
    match run_source(ctx, "<test>", src, &vars) {
        Ok((v, _)) => panic!("expected failure, got {v:?} from: {src}"),
        Err(_) => ctx.catch_exc().expect("pending exception after Err"),
    }
}

/// The name of an exception's type.
pub fn exc_kind(exc: &Obj) -> String {
    exc.ty()
        .type_data()
        .map(|t| t.name.clone())
        .unwrap_or_default()
}
