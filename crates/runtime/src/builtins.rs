//! Builtin names
//!
//! Installs the process-wide builtins mapping: the singletons, the
//! builtin type objects (whose `__new` slots are the native
//! constructors), the builtin functions, and the method attributes of
//! the container and string types.

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::func::NativeFn;
use crate::number::{self, to_bigint};
use crate::obj::{Obj, Payload, issub};
use crate::range::{RangeData, SliceData};
use crate::types::{slot_lookup, type_name};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

/// Fill the builtins mapping of a fresh context.
pub fn install(ctx: &mut Context) {
    install_values(ctx);
    install_constructors(ctx);
    install_methods(ctx);
    install_funcs(ctx);
}

fn set_builtin(ctx: &mut Context, name: &str, val: Obj) {
    let b = ctx.builtins.clone();
    ctx.dict_set_str(&b, name, val)
        .expect("builtins mapping accepts string keys");
}

fn set_method(ctx: &mut Context, ty: &Obj, name: &str, f: NativeFn) {
    let ty = ty.clone();
    let func_name = {
        let tname = ty.type_data().map(|t| t.name.clone()).unwrap_or_default();
        format!("{tname}.{name}")
    };
    let func = ctx.native_func(&func_name, f);
    ctx.type_set_attr(&ty, name, func)
        .expect("builtin type accepts attributes");
}

fn install_values(ctx: &mut Context) {
    let none = ctx.none();
    set_builtin(ctx, "none", none);
    let t = ctx.bool_(true);
    set_builtin(ctx, "true", t);
    let f = ctx.bool_(false);
    set_builtin(ctx, "false", f);

    for (name, ty) in [
        ("object", ctx.types.object.clone()),
        ("type", ctx.types.type_.clone()),
        ("bool", ctx.types.bool_.clone()),
        ("int", ctx.types.int.clone()),
        ("float", ctx.types.float.clone()),
        ("complex", ctx.types.complex.clone()),
        ("str", ctx.types.str_.clone()),
        ("bytes", ctx.types.bytes.clone()),
        ("list", ctx.types.list.clone()),
        ("tuple", ctx.types.tuple.clone()),
        ("set", ctx.types.set.clone()),
        ("dict", ctx.types.dict.clone()),
        ("range", ctx.types.range.clone()),
        ("slice", ctx.types.slice.clone()),
        ("func", ctx.types.func.clone()),
        ("module", ctx.types.module.clone()),
        ("regex", ctx.types.regex.clone()),
    ] {
        set_builtin(ctx, name, ty);
    }

    for kind in crate::exc::ExcKind::ALL {
        let ty = ctx.types.exc_type(*kind).clone();
        set_builtin(ctx, kind.name(), ty);
    }
}

fn install_constructors(ctx: &mut Context) {
    let pairs: Vec<(Obj, &str, NativeFn)> = vec![
        (ctx.types.int.clone(), "int.__new", new_int),
        (ctx.types.float.clone(), "float.__new", new_float),
        (ctx.types.complex.clone(), "complex.__new", new_complex),
        (ctx.types.bool_.clone(), "bool.__new", new_bool),
        (ctx.types.str_.clone(), "str.__new", new_str),
        (ctx.types.bytes.clone(), "bytes.__new", new_bytes),
        (ctx.types.list.clone(), "list.__new", new_list),
        (ctx.types.tuple.clone(), "tuple.__new", new_tuple),
        (ctx.types.set.clone(), "set.__new", new_set),
        (ctx.types.dict.clone(), "dict.__new", new_dict),
        (ctx.types.range.clone(), "range.__new", new_range),
        (ctx.types.slice.clone(), "slice.__new", new_slice),
        (ctx.types.error().clone(), "Error.__new", new_error),
    ];
    for (ty, name, f) in pairs {
        let func = ctx.native_func(name, f);
        ctx.type_set_attr(&ty, "__new", func)
            .expect("builtin type accepts slots");
    }
}

fn install_methods(ctx: &mut Context) {
    let list = ctx.types.list.clone();
    set_method(ctx, &list, "push", list_push);
    set_method(ctx, &list, "pop", list_pop);
    set_method(ctx, &list, "clear", list_clear);
    set_method(ctx, &list, "reverse", list_reverse);
    set_method(ctx, &list, "index", list_index);

    let dict = ctx.types.dict.clone();
    set_method(ctx, &dict, "get", dict_get_m);
    set_method(ctx, &dict, "pop", dict_pop_m);
    set_method(ctx, &dict, "keys", dict_keys_m);
    set_method(ctx, &dict, "values", dict_values_m);

    let set_ty = ctx.types.set.clone();
    set_method(ctx, &set_ty, "add", set_add_m);
    set_method(ctx, &set_ty, "remove", set_remove_m);
    set_method(ctx, &set_ty, "has", set_has_m);

    let s = ctx.types.str_.clone();
    set_method(ctx, &s, "upper", str_upper);
    set_method(ctx, &s, "lower", str_lower);
    set_method(ctx, &s, "split", str_split);
    set_method(ctx, &s, "join", str_join);
    set_method(ctx, &s, "find", str_find);
    set_method(ctx, &s, "replace", str_replace);

    let re = ctx.types.regex.clone();
    set_method(ctx, &re, "test", regex_test);
    set_method(ctx, &re, "find", regex_find);
    set_method(ctx, &re, "findall", regex_findall);
}

fn install_funcs(ctx: &mut Context) {
    for (name, f) in [
        ("print", bi_print as NativeFn),
        ("repr", bi_repr),
        ("hash", bi_hash),
        ("abs", bi_abs),
        ("len", bi_len),
        ("pow", bi_pow),
        ("chr", bi_chr),
        ("ord", bi_ord),
        ("id", bi_id),
        ("iter", bi_iter),
        ("next", bi_next),
        ("issub", bi_issub),
        ("isinst", bi_isinst),
        ("exit", bi_exit),
        ("import", bi_import),
    ] {
        let func = ctx.native_func(name, f);
        set_builtin(ctx, name, func);
    }
}

// ---- argument helpers ----

fn need(ctx: &mut Context, name: &str, args: &[Obj], min: usize, max: usize) -> XResult<()> {
    if args.len() < min || args.len() > max {
        return Err(ctx.throw(
            ExcKind::ArgError,
            format!(
                "{name}() takes {min}..{max} arguments, got {}",
                args.len()
            ),
        ));
    }
    Ok(())
}

fn need_str(ctx: &mut Context, name: &str, arg: &Obj) -> XResult<String> {
    match arg.as_str() {
        Some(s) => Ok(s.to_string()),
        None => {
            let ty = type_name(arg);
            Err(ctx.throw(
                ExcKind::TypeError,
                format!("{name} requires a str, not '{ty}'"),
            ))
        }
    }
}

// ---- constructors (installed as `__new`; args[0] is the type) ----

fn new_int(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "int", args, 1, 3)?;
    let v = match args.get(1) {
        None => BigInt::from(0),
        Some(x) => {
            if let Some(base_arg) = args.get(2) {
                let s = need_str(ctx, "int with a base", x)?;
                let base = match to_bigint(base_arg).and_then(|b| b.to_u32()) {
                    Some(b @ (2 | 8 | 10 | 16)) => b,
                    _ => {
                        return Err(
                            ctx.throw(ExcKind::ValError, "Base must be 2, 8, 10, or 16")
                        );
                    }
                };
                match number::int_from_str_base(&s, base) {
                    Some(v) => v,
                    None => {
                        return Err(ctx.throw(
                            ExcKind::ValError,
                            format!("Invalid int literal {s:?} for base {base}"),
                        ));
                    }
                }
            } else {
                match x.payload() {
                    Payload::Int(v) => v.clone(),
                    Payload::Bool(b) => BigInt::from(*b as i64),
                    Payload::Float(f) => match BigInt::from_f64(f.trunc()) {
                        Some(v) => v,
                        None => {
                            return Err(
                                ctx.throw(ExcKind::ValError, "Cannot convert to int")
                            );
                        }
                    },
                    Payload::Str(s) => match number::int_from_str_base(&s.text, 10) {
                        Some(v) => v,
                        None => {
                            return Err(ctx.throw(
                                ExcKind::ValError,
                                format!("Invalid int literal {:?}", s.text),
                            ));
                        }
                    },
                    _ => {
                        if let Some(slot) = slot_lookup(x.ty(), |s| s.int.clone()) {
                            return ctx.call_obj(slot, vec![x.clone()]);
                        }
                        let ty = type_name(x);
                        return Err(ctx.throw(
                            ExcKind::TypeError,
                            format!("Cannot convert '{ty}' object to int"),
                        ));
                    }
                }
            }
        }
    };
    Ok(ctx.int_from(v))
}

fn new_float(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "float", args, 1, 2)?;
    let v = match args.get(1) {
        None => 0.0,
        Some(x) => match x.payload() {
            Payload::Str(s) => match number::float_from_str(&s.text) {
                Some(v) => v,
                None => {
                    return Err(ctx.throw(
                        ExcKind::ValError,
                        format!("Invalid float literal {:?}", s.text),
                    ));
                }
            },
            _ => match number::to_f64(x) {
                Some(v) => v,
                None => {
                    if let Some(slot) = slot_lookup(x.ty(), |s| s.float.clone()) {
                        return ctx.call_obj(slot, vec![x.clone()]);
                    }
                    let ty = type_name(x);
                    return Err(ctx.throw(
                        ExcKind::TypeError,
                        format!("Cannot convert '{ty}' object to float"),
                    ));
                }
            },
        },
    };
    Ok(ctx.float(v))
}

fn new_complex(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "complex", args, 1, 3)?;
    let re = match args.get(1) {
        None => 0.0,
        Some(x) => match number::to_complex(x) {
            Some((r, i)) if i == 0.0 => r,
            Some(_) if args.len() == 2 => {
                // complex(z) passes an existing complex through.
                let (r, i) = number::to_complex(&args[1]).expect("complex payload");
                return Ok(ctx.complex(r, i));
            }
            _ => {
                let ty = type_name(x);
                return Err(ctx.throw(
                    ExcKind::TypeError,
                    format!("Cannot convert '{ty}' object to complex"),
                ));
            }
        },
    };
    let im = match args.get(2) {
        None => 0.0,
        Some(x) => match number::to_f64(x) {
            Some(v) => v,
            None => {
                let ty = type_name(x);
                return Err(ctx.throw(
                    ExcKind::TypeError,
                    format!("Imaginary part must be a number, not '{ty}'"),
                ));
            }
        },
    };
    Ok(ctx.complex(re, im))
}

fn new_bool(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "bool", args, 1, 2)?;
    match args.get(1) {
        None => Ok(ctx.bool_(false)),
        Some(x) => {
            let t = ctx.truthy(x)?;
            Ok(ctx.bool_(t))
        }
    }
}

fn new_str(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str", args, 1, 2)?;
    match args.get(1) {
        None => Ok(ctx.str_("")),
        Some(x) => {
            let s = ctx.str_of(x)?;
            Ok(ctx.str_(s))
        }
    }
}

fn new_bytes(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "bytes", args, 1, 2)?;
    match args.get(1) {
        None => Ok(ctx.bytes(Vec::new())),
        Some(x) => {
            if let Some(s) = x.as_str() {
                return Ok(ctx.bytes(s.as_bytes().to_vec()));
            }
            if let Some(b) = x.as_bytes() {
                return Ok(ctx.bytes(b.to_vec()));
            }
            let items = ctx.iter_collect(x)?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match to_bigint(&item).and_then(|v| v.to_u8()) {
                    Some(b) => out.push(b),
                    None => {
                        return Err(ctx.throw(
                            ExcKind::ValError,
                            "bytes() requires ints in 0..256",
                        ));
                    }
                }
            }
            Ok(ctx.bytes(out))
        }
    }
}

fn new_list(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "list", args, 1, 2)?;
    match args.get(1) {
        None => Ok(ctx.list(Vec::new())),
        Some(x) => {
            let items = ctx.iter_collect(x)?;
            Ok(ctx.list(items))
        }
    }
}

fn new_tuple(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "tuple", args, 1, 2)?;
    match args.get(1) {
        None => Ok(ctx.tuple(Vec::new())),
        Some(x) => {
            let items = ctx.iter_collect(x)?;
            Ok(ctx.tuple(items))
        }
    }
}

fn new_set(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "set", args, 1, 2)?;
    let out = ctx.new_set();
    if let Some(x) = args.get(1) {
        for item in ctx.iter_collect(x)? {
            ctx.dict_set(&out, item.clone(), item)?;
        }
    }
    Ok(out)
}

fn new_dict(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "dict", args, 1, 2)?;
    let out = ctx.new_dict();
    if let Some(x) = args.get(1) {
        match x.as_dict() {
            Some(cell) => {
                let items: Vec<(Obj, Obj)> = cell
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                for (k, v) in items {
                    ctx.dict_set(&out, k, v)?;
                }
            }
            None => {
                // An iterable of (key, value) pairs.
                for item in ctx.iter_collect(x)? {
                    let pair = match item.as_tuple() {
                        Some(t) if t.len() == 2 => (t[0].clone(), t[1].clone()),
                        _ => {
                            return Err(ctx.throw(
                                ExcKind::ValError,
                                "dict() requires (key, value) pairs",
                            ));
                        }
                    };
                    ctx.dict_set(&out, pair.0, pair.1)?;
                }
            }
        }
    }
    Ok(out)
}

fn new_range(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "range", args, 2, 4)?;
    let int_arg = |ctx: &mut Context, o: &Obj| match to_bigint(o) {
        Some(v) => Ok(v),
        None => {
            let ty = type_name(o);
            Err(ctx.throw(
                ExcKind::TypeError,
                format!("range() requires ints, not '{ty}'"),
            ))
        }
    };
    let (start, end, step) = match args.len() {
        2 => (
            BigInt::from(0),
            int_arg(ctx, &args[1])?,
            BigInt::from(1),
        ),
        3 => (
            int_arg(ctx, &args[1])?,
            int_arg(ctx, &args[2])?,
            BigInt::from(1),
        ),
        _ => (
            int_arg(ctx, &args[1])?,
            int_arg(ctx, &args[2])?,
            int_arg(ctx, &args[3])?,
        ),
    };
    if step.is_zero() {
        return Err(ctx.throw(ExcKind::ValError, "range() step cannot be zero"));
    }
    Ok(Obj::new(
        &ctx.types.range,
        Payload::Range(RangeData { start, end, step }),
        false,
    ))
}

fn new_slice(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "slice", args, 2, 4)?;
    let none = ctx.none();
    let start = args.get(1).cloned().unwrap_or_else(|| none.clone());
    let end = args.get(2).cloned().unwrap_or_else(|| none.clone());
    let step = args.get(3).cloned().unwrap_or(none);
    Ok(Obj::new(
        &ctx.types.slice,
        Payload::Slice(SliceData { start, end, step }),
        false,
    ))
}

fn new_error(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "Error", args, 1, 2)?;
    let ty = args[0].clone();
    let msg = match args.get(1) {
        Some(m) => ctx.str_of(m)?,
        None => String::new(),
    };
    // `ty` is the called type, so subtypes of Error construct here too.
    Ok(Obj::new(
        &ty,
        Payload::Exc(std::cell::RefCell::new(crate::exc::ExcData {
            msg,
            loc: None,
            inner: None,
            frames: Vec::new(),
        })),
        true,
    ))
}

// ---- builtin functions ----

fn bi_print(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    let mut parts = Vec::with_capacity(args.len());
    for a in args {
        parts.push(ctx.str_of(a)?);
    }
    println!("{}", parts.join(" "));
    Ok(ctx.none())
}

fn bi_repr(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "repr", args, 1, 1)?;
    let s = ctx.repr(&args[0])?;
    Ok(ctx.str_(s))
}

fn bi_hash(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "hash", args, 1, 1)?;
    let h = ctx.obj_hash(&args[0])?;
    Ok(ctx.int_from(BigInt::from(h)))
}

fn bi_abs(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "abs", args, 1, 1)?;
    let x = &args[0];
    match x.payload() {
        Payload::Int(v) => Ok(ctx.int_from(v.abs())),
        Payload::Bool(b) => Ok(ctx.int_i64(*b as i64)),
        Payload::Float(v) => Ok(ctx.float(v.abs())),
        Payload::Complex(re, im) => Ok(ctx.float(re.hypot(*im))),
        _ => {
            if let Some(slot) = slot_lookup(x.ty(), |s| s.abs.clone()) {
                return ctx.call_obj(slot, vec![x.clone()]);
            }
            let ty = type_name(x);
            Err(ctx.throw(
                ExcKind::TypeError,
                format!("'{ty}' object has no '__abs' member"),
            ))
        }
    }
}

fn bi_len(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "len", args, 1, 1)?;
    let x = &args[0];
    let n: BigInt = match x.payload() {
        Payload::Str(s) => BigInt::from(s.chars),
        Payload::Bytes(b) => BigInt::from(b.len()),
        Payload::List(v) => BigInt::from(v.borrow().len()),
        Payload::Tuple(v) => BigInt::from(v.len()),
        Payload::Set(d) | Payload::Dict(d) => BigInt::from(d.borrow().len()),
        Payload::Range(r) => r.len(),
        _ => {
            if let Some(slot) = slot_lookup(x.ty(), |s| s.len.clone()) {
                return ctx.call_obj(slot, vec![x.clone()]);
            }
            let ty = type_name(x);
            return Err(ctx.throw(
                ExcKind::TypeError,
                format!("'{ty}' object has no '__len' member"),
            ));
        }
    };
    Ok(ctx.int_from(n))
}

fn bi_pow(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "pow", args, 2, 3)?;
    let modulus = args.get(2).filter(|m| !m.is_none()).cloned();
    match modulus {
        None => {
            let (l, r) = (args[0].clone(), args[1].clone());
            ctx.binop(crate::op::Op::BopPow, &l, &r)
        }
        Some(m) => {
            // Modular exponentiation on integers.
            let (b, e, m) = match (to_bigint(&args[0]), to_bigint(&args[1]), to_bigint(&m)) {
                (Some(b), Some(e), Some(m)) => (b, e, m),
                _ => {
                    return Err(ctx.throw(
                        ExcKind::TypeError,
                        "pow() with a modulus requires ints",
                    ));
                }
            };
            if e.is_negative() {
                return Err(ctx.throw(
                    ExcKind::ValError,
                    "pow() with a modulus requires a non-negative exponent",
                ));
            }
            if m.is_zero() {
                return Err(ctx.throw(ExcKind::ValError, "pow() modulus cannot be zero"));
            }
            Ok(ctx.int_from(b.modpow(&e, &m)))
        }
    }
}

fn bi_chr(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "chr", args, 1, 1)?;
    let v = match crate::number::to_index(&args[0]) {
        Some(v) => v,
        None => {
            return Err(ctx.throw(ExcKind::TypeError, "chr() requires an int"));
        }
    };
    match u32::try_from(v).ok().and_then(char::from_u32) {
        Some(c) => Ok(ctx.str_(c.to_string())),
        None => Err(ctx.throw(ExcKind::ValError, format!("Invalid codepoint {v}"))),
    }
}

fn bi_ord(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "ord", args, 1, 1)?;
    let s = need_str(ctx, "ord()", &args[0])?;
    let mut cs = s.chars();
    match (cs.next(), cs.next()) {
        (Some(c), None) => Ok(ctx.int_i64(c as i64)),
        _ => Err(ctx.throw(ExcKind::ValError, "ord() requires a length-1 string")),
    }
}

fn bi_id(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "id", args, 1, 1)?;
    Ok(ctx.int_from(BigInt::from(args[0].id())))
}

fn bi_iter(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "iter", args, 1, 1)?;
    ctx.iter_of(&args[0])
}

fn bi_next(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "next", args, 1, 1)?;
    match ctx.iter_next(&args[0])? {
        Some(v) => Ok(v),
        None => Err(ctx.throw(ExcKind::OutOfIter, "Iterator exhausted")),
    }
}

fn bi_issub(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "issub", args, 2, 2)?;
    let tp = &args[0];
    if !tp.is_type() {
        return Err(ctx.throw(ExcKind::TypeError, "issub() requires a type"));
    }
    check_type_or_tuple(ctx, tp, &args[1])
}

fn bi_isinst(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "isinst", args, 2, 2)?;
    let ty = args[0].ty().clone();
    check_type_or_tuple(ctx, &ty, &args[1])
}

/// Shared tail of `issub`/`isinst`: `of` is a type or a tuple of types.
fn check_type_or_tuple(ctx: &mut Context, tp: &Obj, of: &Obj) -> XResult<Obj> {
    if of.is_type() {
        return Ok(ctx.bool_(issub(tp, of)));
    }
    if let Some(items) = of.as_tuple() {
        for item in items {
            if !item.is_type() {
                return Err(ctx.throw(
                    ExcKind::TypeError,
                    "Expected a type or a tuple of types",
                ));
            }
            if issub(tp, item) {
                return Ok(ctx.bool_(true));
            }
        }
        return Ok(ctx.bool_(false));
    }
    Err(ctx.throw(
        ExcKind::TypeError,
        "Expected a type or a tuple of types",
    ))
}

fn bi_exit(_ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    let code = args
        .first()
        .and_then(crate::number::to_index)
        .unwrap_or(0);
    std::process::exit(code as i32);
}

fn bi_import(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "import", args, 1, 1)?;
    let name = need_str(ctx, "import()", &args[0])?;
    ctx.import_module(&name)
}

// ---- list methods ----

fn self_list<'a>(
    ctx: &mut Context,
    name: &str,
    args: &'a [Obj],
) -> XResult<&'a std::cell::RefCell<Vec<Obj>>> {
    match args.first().and_then(|o| o.as_list()) {
        Some(cell) => Ok(cell),
        None => Err(ctx.throw(
            ExcKind::TypeError,
            format!("{name}() requires a list receiver"),
        )),
    }
}

fn list_push(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "list.push", args, 2, 2)?;
    let cell = self_list(ctx, "list.push", args)?;
    cell.borrow_mut().push(args[1].clone());
    Ok(ctx.none())
}

fn list_pop(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "list.pop", args, 1, 1)?;
    let cell = self_list(ctx, "list.pop", args)?;
    let popped = cell.borrow_mut().pop();
    match popped {
        Some(v) => Ok(v),
        None => Err(ctx.throw(ExcKind::IndexError, "Pop from an empty list")),
    }
}

fn list_clear(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "list.clear", args, 1, 1)?;
    let cell = self_list(ctx, "list.clear", args)?;
    cell.borrow_mut().clear();
    Ok(ctx.none())
}

fn list_reverse(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "list.reverse", args, 1, 1)?;
    let cell = self_list(ctx, "list.reverse", args)?;
    cell.borrow_mut().reverse();
    Ok(ctx.none())
}

fn list_index(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "list.index", args, 2, 2)?;
    let items = self_list(ctx, "list.index", args)?.borrow().clone();
    for (i, item) in items.iter().enumerate() {
        if ctx.obj_eq(item, &args[1])? {
            return Ok(ctx.int_i64(i as i64));
        }
    }
    let r = ctx.repr(&args[1])?;
    Err(ctx.throw(ExcKind::ValError, format!("{r} is not in the list")))
}

// ---- dict methods ----

fn dict_get_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "dict.get", args, 2, 3)?;
    match ctx.dict_get(&args[0], &args[1])? {
        Some(v) => Ok(v),
        None => Ok(args.get(2).cloned().unwrap_or_else(|| ctx.none())),
    }
}

fn dict_pop_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "dict.pop", args, 2, 2)?;
    match ctx.dict_remove(&args[0], &args[1])? {
        Some(v) => Ok(v),
        None => {
            let k = ctx.repr(&args[1])?;
            Err(ctx.throw(ExcKind::KeyError, format!("Key {k} not found")))
        }
    }
}

fn dict_keys_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "dict.keys", args, 1, 1)?;
    let keys = match args[0].as_dict() {
        Some(cell) => cell.borrow().keys(),
        None => {
            return Err(ctx.throw(ExcKind::TypeError, "dict.keys() requires a dict"));
        }
    };
    Ok(ctx.list(keys))
}

fn dict_values_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "dict.values", args, 1, 1)?;
    let vals = match args[0].as_dict() {
        Some(cell) => cell.borrow().values(),
        None => {
            return Err(ctx.throw(ExcKind::TypeError, "dict.values() requires a dict"));
        }
    };
    Ok(ctx.list(vals))
}

// ---- set methods ----

fn set_add_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "set.add", args, 2, 2)?;
    ctx.dict_set(&args[0], args[1].clone(), args[1].clone())?;
    Ok(ctx.none())
}

fn set_remove_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "set.remove", args, 2, 2)?;
    match ctx.dict_remove(&args[0], &args[1])? {
        Some(_) => Ok(ctx.none()),
        None => {
            let r = ctx.repr(&args[1])?;
            Err(ctx.throw(ExcKind::KeyError, format!("{r} not in set")))
        }
    }
}

fn set_has_m(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "set.has", args, 2, 2)?;
    let hit = ctx.dict_get(&args[0], &args[1])?.is_some();
    Ok(ctx.bool_(hit))
}

// ---- str methods ----

fn str_upper(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str.upper", args, 1, 1)?;
    let s = need_str(ctx, "str.upper()", &args[0])?;
    Ok(ctx.str_(s.to_uppercase()))
}

fn str_lower(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str.lower", args, 1, 1)?;
    let s = need_str(ctx, "str.lower()", &args[0])?;
    Ok(ctx.str_(s.to_lowercase()))
}

fn str_split(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str.split", args, 1, 2)?;
    let s = need_str(ctx, "str.split()", &args[0])?;
    let parts: Vec<Obj> = match args.get(1) {
        Some(sep) => {
            let sep = need_str(ctx, "str.split()", sep)?;
            s.split(&sep).map(|p| ctx.str_(p)).collect()
        }
        None => s.split_whitespace().map(|p| ctx.str_(p)).collect(),
    };
    Ok(ctx.list(parts))
}

fn str_join(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str.join", args, 2, 2)?;
    let sep = need_str(ctx, "str.join()", &args[0])?;
    let items = ctx.iter_collect(&args[1])?;
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(ctx.str_of(item)?);
    }
    Ok(ctx.str_(parts.join(&sep)))
}

fn str_find(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str.find", args, 2, 2)?;
    let s = need_str(ctx, "str.find()", &args[0])?;
    let sub = need_str(ctx, "str.find()", &args[1])?;
    match s.find(&sub) {
        Some(byte_at) => {
            let char_at = s[..byte_at].chars().count();
            Ok(ctx.int_i64(char_at as i64))
        }
        None => Ok(ctx.int_i64(-1)),
    }
}

fn str_replace(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "str.replace", args, 3, 3)?;
    let s = need_str(ctx, "str.replace()", &args[0])?;
    let from = need_str(ctx, "str.replace()", &args[1])?;
    let to = need_str(ctx, "str.replace()", &args[2])?;
    Ok(ctx.str_(s.replace(&from, &to)))
}

// ---- regex methods ----

fn self_regex(ctx: &mut Context, name: &str, args: &[Obj]) -> XResult<regex::Regex> {
    match args.first().map(|o| o.payload()) {
        Some(Payload::Regex(r)) => Ok(r.re.clone()),
        _ => Err(ctx.throw(
            ExcKind::TypeError,
            format!("{name}() requires a regex receiver"),
        )),
    }
}

fn regex_test(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "regex.test", args, 2, 2)?;
    let re = self_regex(ctx, "regex.test", args)?;
    let s = need_str(ctx, "regex.test()", &args[1])?;
    Ok(ctx.bool_(re.is_match(&s)))
}

fn regex_find(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "regex.find", args, 2, 2)?;
    let re = self_regex(ctx, "regex.find", args)?;
    let s = need_str(ctx, "regex.find()", &args[1])?;
    match re.find(&s) {
        Some(m) => Ok(ctx.str_(m.as_str())),
        None => Ok(ctx.none()),
    }
}

fn regex_findall(ctx: &mut Context, args: &[Obj]) -> XResult<Obj> {
    need(ctx, "regex.findall", args, 2, 2)?;
    let re = self_regex(ctx, "regex.findall", args)?;
    let s = need_str(ctx, "regex.findall()", &args[1])?;
    let found: Vec<Obj> = re.find_iter(&s).map(|m| ctx.str_(m.as_str())).collect();
    Ok(ctx.list(found))
}
