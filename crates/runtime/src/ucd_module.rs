//! The `ucd` builtin module
//!
//! The Unicode-database collaborator exposed to programs: name → a
//! one-character string, codepoint → name, codepoint → general category.
//! Backed by the compact internal table in [`crate::ucd`].

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::obj::Obj;
use crate::ucd;

/// Build the module instance (called once; the import cache keeps it).
pub fn build(ctx: &mut Context) -> XResult<Obj> {
    let m = ctx.new_module("ucd", "");
    let ns = match m.as_module() {
        Some(md) => md.ns.clone(),
        None => return Err(ctx.throw(ExcKind::InternalError, "module payload")),
    };
    let f = ctx.native_func("ucd.lookup", bi_lookup);
    ctx.dict_set_str(&ns, "lookup", f)?;
    let f = ctx.native_func("ucd.name", bi_name);
    ctx.dict_set_str(&ns, "name", f)?;
    let f = ctx.native_func("ucd.category", bi_category);
    ctx.dict_set_str(&ns, "category", f)?;
    Ok(m)
}

/// The codepoint argument: a one-character string or an int.
fn arg_char(ctx: &mut Context, args: &[Obj], fname: &str) -> XResult<char> {
    let arg = match args.first() {
        Some(a) => a,
        None => {
            return Err(ctx.throw(
                ExcKind::ArgError,
                format!("{fname}() requires an argument"),
            ));
        }
    };
    if let Some(s) = arg.as_str() {
        let mut cs = s.chars();
        if let (Some(c), None) = (cs.next(), cs.next()) {
            return Ok(c);
        }
        return Err(ctx.throw(
            ExcKind::ValError,
            format!("{fname}() requires a length-1 string"),
        ));
    }
    if let Some(v) = crate::number::to_index(arg) {
        if let Some(c) = u32::try_from(v).ok().and_then(char::from_u32) {
            return Ok(c);
        }
        return Err(ctx.throw(ExcKind::ValError, format!("Invalid codepoint {v}")));
    }
    let ty = crate::types::type_name(arg);
    Err(ctx.throw(
        ExcKind::TypeError,
        format!("{fname}() requires a str or int, not '{ty}'"),
    ))
}

fn bi_lookup(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    let name = match args.first().and_then(|a| a.as_str()) {
        Some(s) => s.to_string(),
        None => {
            return Err(ctx.throw(ExcKind::ArgError, "ucd.lookup() requires a name string"));
        }
    };
    match ucd::codepoint_by_name(&name) {
        Some(c) => Ok(ctx.str_(c.to_string())),
        None => Err(ctx.throw(
            ExcKind::ValError,
            format!("Unknown character name '{name}'"),
        )),
    }
}

fn bi_name(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    let c = arg_char(ctx, args, "ucd.name")?;
    match ucd::name_of(c) {
        Some(n) => Ok(ctx.str_(n)),
        None => Err(ctx.throw(
            ExcKind::ValError,
            format!("No name for codepoint U+{:04X}", c as u32),
        )),
    }
}

fn bi_category(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    let c = arg_char(ctx, args, "ucd.category")?;
    Ok(ctx.str_(ucd::category(c)))
}
