//! Bytecode execution
//!
//! The VM runs one frame's bytecode to completion: decode an opcode (and
//! its little-endian immediate when it has one), dispatch, repeat until
//! `ret`. Jump immediates are relative to the byte after the immediate.
//!
//! Failure unwinds: every fallible operation leaves a pending exception
//! and an `Err(Throw)`; the loop truncates the operand stack to the
//! innermost try-block's recorded depth and jumps to its handler, or
//! propagates out of the frame when no handler remains.

use crate::context::{Context, Frame};
use crate::exc::{ExcKind, Throw, XResult};
use crate::func::{BFunc, FuncKind};
use crate::obj::{Obj, Payload, isinst, issub};
use crate::op::Op;
use crate::range::SliceData;
use crate::types::slot_lookup;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/// A recorded `try` region: handler target and the operand-stack depth
/// to restore on unwind.
struct TryBlock {
    target: usize,
    depth: usize,
}

enum Flow {
    Next,
    Jump(usize),
    Return(Obj),
}

impl Context {
    /// Call any callable value with positional arguments.
    pub fn call_obj(&mut self, f: Obj, args: Vec<Obj>) -> XResult<Obj> {
        match f.payload() {
            Payload::Func(fd) => match &fd.kind {
                FuncKind::Native(nf) => {
                    let nf = *nf;
                    let frame = Frame {
                        callable: f.clone(),
                        args: args.clone(),
                        locals: None,
                        closure: None,
                        globals: None,
                        pc: 0,
                    };
                    self.push_frame(frame)?;
                    let r = nf(self, &args);
                    self.pop_frame();
                    r
                }
                FuncKind::Bytecode(bf) => {
                    let code = bf.code.clone();
                    let closure = bf.closure.clone();
                    let globals = bf.globals.clone();
                    let name = fd.name.clone();
                    let locals = self.bind_args(&name, bf, args.clone())?;
                    exec_frame(self, f.clone(), code, locals, closure, globals, args)
                }
            },
            Payload::Partial(p) => {
                let of = p.of.clone();
                let merged = p.merge(args);
                self.call_obj(of, merged)
            }
            Payload::Type(_) => self.construct(&f, args),
            Payload::Code(_) => {
                let locals = self.new_dict();
                exec_frame(self, f.clone(), f.clone(), locals.clone(), None, locals, args)
            }
            _ => {
                if let Some(slot) = slot_lookup(f.ty(), |s| s.call.clone()) {
                    let mut cargs = vec![f.clone()];
                    cargs.extend(args);
                    return self.call_obj(slot, cargs);
                }
                let ty = crate::types::type_name(&f);
                Err(self.throw(
                    ExcKind::TypeError,
                    format!("'{ty}' object is not callable"),
                ))
            }
        }
    }

    /// Execute a code object with `locals` serving as both the local and
    /// global mapping. This is how modules, the REPL, and `-e` run.
    pub fn exec_code(&mut self, code: &Obj, locals: &Obj) -> XResult<Obj> {
        exec_frame(
            self,
            code.clone(),
            code.clone(),
            locals.clone(),
            None,
            locals.clone(),
            Vec::new(),
        )
    }
}

/// Push a frame, run `code`, pop the frame.
fn exec_frame(
    ctx: &mut Context,
    callable: Obj,
    code: Obj,
    locals: Obj,
    closure: Option<Rc<RefCell<Frame>>>,
    globals: Obj,
    args: Vec<Obj>,
) -> XResult<Obj> {
    let frame = ctx.push_frame(Frame {
        callable,
        args,
        locals: Some(locals.clone()),
        closure: closure.clone(),
        globals: Some(globals.clone()),
        pc: 0,
    })?;
    let r = run(ctx, &frame, &code, &locals, &closure, &globals);
    ctx.pop_frame();
    r
}

fn run(
    ctx: &mut Context,
    frame: &Rc<RefCell<Frame>>,
    code: &Obj,
    locals: &Obj,
    closure: &Option<Rc<RefCell<Frame>>>,
    globals: &Obj,
) -> XResult<Obj> {
    let code_data = match code.as_code() {
        Some(c) => c,
        None => {
            return Err(ctx.throw(ExcKind::InternalError, "Frame callable has no bytecode"));
        }
    };
    trace!(file = %code_data.fname, "executing bytecode");

    let entry_depth = ctx.thread.stack.len();
    let mut tryblocks: Vec<TryBlock> = Vec::new();
    let mut pc: usize = 0;

    loop {
        frame.borrow_mut().pc = pc;

        let step = |ctx: &mut Context, pc: &mut usize, tryblocks: &mut Vec<TryBlock>| -> XResult<Flow> {
            let bc = code_data.bc.borrow();
            if *pc >= bc.len() {
                // Running off the end behaves like `ret none`.
                drop(bc);
                return Ok(Flow::Return(ctx.none()));
            }
            let byte = bc[*pc];
            let op = match Op::try_from(byte) {
                Ok(op) => op,
                Err(_) => {
                    drop(bc);
                    return Err(
                        ctx.throw(ExcKind::InternalError, format!("Bad opcode {byte:#04x}"))
                    );
                }
            };
            let mut arg: i32 = 0;
            if op.has_arg() {
                let raw: [u8; 4] = match bc.get(*pc + 1..*pc + 5) {
                    Some(s) => s.try_into().expect("4-byte immediate"),
                    None => {
                        drop(bc);
                        return Err(
                            ctx.throw(ExcKind::InternalError, "Truncated instruction")
                        );
                    }
                };
                arg = i32::from_le_bytes(raw);
                *pc += 5;
            } else {
                *pc += 1;
            }
            drop(bc);
            let at = *pc;

            let jump_to = |off: i32| (at as i64 + off as i64) as usize;

            match op {
                Op::Noop => Ok(Flow::Next),
                Op::Push => match code_data.pool.get(arg as usize) {
                    Some(v) => {
                        ctx.push(v);
                        Ok(Flow::Next)
                    }
                    None => Err(ctx.throw(ExcKind::InternalError, "Bad constant index")),
                },
                Op::Popu => {
                    ctx.pop()?;
                    Ok(Flow::Next)
                }
                Op::Dup => {
                    let v = ctx.peek()?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }

                Op::Load => {
                    let name = const_name(ctx, code_data, arg)?;
                    // Locals, then the closure chain, then module
                    // globals, then builtins.
                    if let Some(v) = ctx.dict_get_str(locals, &name) {
                        ctx.push(v);
                        return Ok(Flow::Next);
                    }
                    let mut link = closure.clone();
                    while let Some(fr) = link {
                        let fr = fr.borrow();
                        if let Some(flocals) = &fr.locals {
                            if let Some(v) = ctx.dict_get_str(flocals, &name) {
                                ctx.push(v);
                                return Ok(Flow::Next);
                            }
                        }
                        link = fr.closure.clone();
                    }
                    if let Some(v) = ctx.dict_get_str(globals, &name) {
                        ctx.push(v);
                        return Ok(Flow::Next);
                    }
                    let builtins = ctx.builtins.clone();
                    if let Some(v) = ctx.dict_get_str(&builtins, &name) {
                        ctx.push(v);
                        return Ok(Flow::Next);
                    }
                    Err(ctx.throw(ExcKind::NameError, format!("Undefined name '{name}'")))
                }
                Op::Store => {
                    let name = const_name(ctx, code_data, arg)?;
                    let val = ctx.peek()?;
                    ctx.dict_set_str(locals, &name, val)?;
                    Ok(Flow::Next)
                }

                Op::Getattr => {
                    let name = const_name(ctx, code_data, arg)?;
                    let obj = ctx.pop()?;
                    let v = ctx.getattr(&obj, &name)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::Setattr => {
                    let name = const_name(ctx, code_data, arg)?;
                    let val = ctx.pop()?;
                    let obj = ctx.pop()?;
                    ctx.setattr(&obj, &name, val.clone())?;
                    ctx.push(val);
                    Ok(Flow::Next)
                }
                Op::Getelems => {
                    let mut items = ctx.pop_n(arg as usize + 1)?;
                    let obj = items.remove(0);
                    let v = ctx.getelem(&obj, &items)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::Setelems => {
                    let mut items = ctx.pop_n(arg as usize + 2)?;
                    let obj = items.remove(0);
                    let val = items.pop().expect("value operand");
                    ctx.setelem(&obj, &items, val.clone())?;
                    ctx.push(val);
                    Ok(Flow::Next)
                }
                Op::Delelems => {
                    let mut items = ctx.pop_n(arg as usize + 1)?;
                    let obj = items.remove(0);
                    ctx.delelem(&obj, &items)?;
                    Ok(Flow::Next)
                }

                Op::Call => {
                    let mut items = ctx.pop_n(arg as usize)?;
                    if items.is_empty() {
                        return Err(ctx.throw(ExcKind::InternalError, "Empty call"));
                    }
                    let f = items.remove(0);
                    let v = ctx.call_obj(f, items)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::Callv => {
                    let argtuple = ctx.pop()?;
                    let f = ctx.pop()?;
                    let args = match argtuple.as_tuple() {
                        Some(t) => t.to_vec(),
                        None => ctx.iter_collect(&argtuple)?,
                    };
                    let v = ctx.call_obj(f, args)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }

                Op::List => {
                    let items = ctx.pop_n(arg as usize)?;
                    let v = ctx.list(items);
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::ListPushn => {
                    let items = ctx.pop_n(arg as usize)?;
                    let target = ctx.peek()?;
                    match target.as_list() {
                        Some(cell) => cell.borrow_mut().extend(items),
                        None => {
                            return Err(
                                ctx.throw(ExcKind::InternalError, "Expected a list to extend")
                            );
                        }
                    }
                    Ok(Flow::Next)
                }
                Op::ListPushi => {
                    let iterable = ctx.pop()?;
                    let items = ctx.iter_collect(&iterable)?;
                    let target = ctx.peek()?;
                    match target.as_list() {
                        Some(cell) => cell.borrow_mut().extend(items),
                        None => {
                            return Err(
                                ctx.throw(ExcKind::InternalError, "Expected a list to extend")
                            );
                        }
                    }
                    Ok(Flow::Next)
                }
                Op::Tuple => {
                    let items = ctx.pop_n(arg as usize)?;
                    let v = ctx.tuple(items);
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::TuplePushn => {
                    let items = ctx.pop_n(arg as usize)?;
                    let target = ctx.pop()?;
                    let mut v = match target.as_tuple() {
                        Some(t) => t.to_vec(),
                        None => {
                            return Err(
                                ctx.throw(ExcKind::InternalError, "Expected a tuple to extend")
                            );
                        }
                    };
                    v.extend(items);
                    let v = ctx.tuple(v);
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::TuplePushi => {
                    let iterable = ctx.pop()?;
                    let items = ctx.iter_collect(&iterable)?;
                    let target = ctx.pop()?;
                    let mut v = match target.as_tuple() {
                        Some(t) => t.to_vec(),
                        None => {
                            return Err(
                                ctx.throw(ExcKind::InternalError, "Expected a tuple to extend")
                            );
                        }
                    };
                    v.extend(items);
                    let v = ctx.tuple(v);
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::Set => {
                    let items = ctx.pop_n(arg as usize)?;
                    let set = ctx.new_set();
                    for item in items {
                        ctx.dict_set(&set, item.clone(), item)?;
                    }
                    ctx.push(set);
                    Ok(Flow::Next)
                }
                Op::SetPushn => {
                    let items = ctx.pop_n(arg as usize)?;
                    let target = ctx.peek()?;
                    for item in items {
                        ctx.dict_set(&target, item.clone(), item)?;
                    }
                    Ok(Flow::Next)
                }
                Op::SetPushi => {
                    let iterable = ctx.pop()?;
                    let items = ctx.iter_collect(&iterable)?;
                    let target = ctx.peek()?;
                    for item in items {
                        ctx.dict_set(&target, item.clone(), item)?;
                    }
                    Ok(Flow::Next)
                }
                Op::Dict => {
                    let items = ctx.pop_n(arg as usize * 2)?;
                    let dict = ctx.new_dict();
                    let mut it = items.into_iter();
                    while let (Some(k), Some(v)) = (it.next(), it.next()) {
                        ctx.dict_set(&dict, k, v)?;
                    }
                    ctx.push(dict);
                    Ok(Flow::Next)
                }
                Op::Slice => {
                    let step = ctx.pop()?;
                    let end = ctx.pop()?;
                    let start = ctx.pop()?;
                    let v = Obj::new(
                        &ctx.types.slice,
                        Payload::Slice(SliceData { start, end, step }),
                        false,
                    );
                    ctx.push(v);
                    Ok(Flow::Next)
                }

                Op::Func => {
                    let tpl = match code_data.pool.get(arg as usize) {
                        Some(v) => v,
                        None => {
                            return Err(ctx.throw(ExcKind::InternalError, "Bad constant index"));
                        }
                    };
                    let v = build_func(ctx, &tpl, frame, globals)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::FuncDefa => {
                    let values = ctx.pop_n(arg as usize)?;
                    let target = ctx.peek()?;
                    match target.as_func().and_then(|f| f.bytecode()) {
                        Some(bf) => bf.set_defaults(values),
                        None => {
                            return Err(ctx.throw(
                                ExcKind::InternalError,
                                "Defaults require a bytecode function",
                            ));
                        }
                    }
                    Ok(Flow::Next)
                }
                Op::Type => {
                    let tpl = match code_data.pool.get(arg as usize) {
                        Some(v) => v,
                        None => {
                            return Err(ctx.throw(ExcKind::InternalError, "Bad constant index"));
                        }
                    };
                    let base = ctx.pop()?;
                    let v = build_type(ctx, &tpl, &base, frame, globals)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }

                Op::Jmp => Ok(Flow::Jump(jump_to(arg))),
                Op::Jmpt => {
                    let cond = ctx.pop()?;
                    if ctx.truthy(&cond)? {
                        Ok(Flow::Jump(jump_to(arg)))
                    } else {
                        Ok(Flow::Next)
                    }
                }
                Op::Jmpf => {
                    let cond = ctx.pop()?;
                    if ctx.truthy(&cond)? {
                        Ok(Flow::Next)
                    } else {
                        Ok(Flow::Jump(jump_to(arg)))
                    }
                }
                Op::Ret => {
                    let v = ctx.pop()?;
                    Ok(Flow::Return(v))
                }
                Op::Throw => {
                    let v = ctx.pop()?;
                    let error_ty = ctx.types.error().clone();
                    if isinst(&v, &error_ty) {
                        return Err(ctx.throw_obj(v));
                    }
                    if v.is_type() && issub(&v, &error_ty) {
                        let exc = ctx.construct(&v, vec![])?;
                        return Err(ctx.throw_obj(exc));
                    }
                    let ty = crate::types::type_name(&v);
                    Err(ctx.throw(
                        ExcKind::TypeError,
                        format!("Can only throw Error objects, not '{ty}'"),
                    ))
                }

                Op::ForStart => {
                    let o = ctx.pop()?;
                    let it = ctx.iter_of(&o)?;
                    ctx.push(it);
                    Ok(Flow::Next)
                }
                Op::ForNextt | Op::ForNextf => {
                    let it = ctx.peek()?;
                    match ctx.iter_next(&it)? {
                        Some(v) => {
                            ctx.push(v);
                            if op == Op::ForNextt {
                                Ok(Flow::Jump(jump_to(arg)))
                            } else {
                                Ok(Flow::Next)
                            }
                        }
                        None => {
                            ctx.pop()?; // the exhausted iterator
                            if op == Op::ForNextt {
                                Ok(Flow::Next)
                            } else {
                                Ok(Flow::Jump(jump_to(arg)))
                            }
                        }
                    }
                }

                Op::TryStart => {
                    tryblocks.push(TryBlock {
                        target: jump_to(arg),
                        depth: ctx.thread.stack.len(),
                    });
                    Ok(Flow::Next)
                }
                Op::TryCatch => {
                    let ty = ctx.pop()?;
                    if !ty.is_type() {
                        let got = crate::types::type_name(&ty);
                        return Err(ctx.throw(
                            ExcKind::TypeError,
                            format!("'catch' requires a type, not '{got}' object"),
                        ));
                    }
                    let matched = ctx
                        .thread
                        .exc
                        .as_ref()
                        .map(|e| isinst(e, &ty))
                        .unwrap_or(false);
                    if matched {
                        let exc = ctx.catch_exc().expect("pending exception");
                        ctx.push(exc);
                        Ok(Flow::Next)
                    } else {
                        Ok(Flow::Jump(jump_to(arg)))
                    }
                }
                Op::TryCatchAll => match ctx.catch_exc() {
                    Some(exc) => {
                        ctx.push(exc);
                        Ok(Flow::Next)
                    }
                    None => Err(ctx.throw(
                        ExcKind::InternalError,
                        "No pending exception to catch",
                    )),
                },
                Op::TryEnd => {
                    tryblocks.pop();
                    Ok(Flow::Jump(jump_to(arg)))
                }
                Op::FinallyEnd => {
                    let v = ctx.pop()?;
                    if v.is_none() {
                        Ok(Flow::Next)
                    } else {
                        Err(ctx.rethrow(v))
                    }
                }

                Op::BopIn
                | Op::BopEeq
                | Op::BopEq
                | Op::BopNe
                | Op::BopLt
                | Op::BopLe
                | Op::BopGt
                | Op::BopGe
                | Op::BopIor
                | Op::BopXor
                | Op::BopAnd
                | Op::BopLsh
                | Op::BopRsh
                | Op::BopAdd
                | Op::BopSub
                | Op::BopMul
                | Op::BopDiv
                | Op::BopFloordiv
                | Op::BopMod
                | Op::BopPow => {
                    let r = ctx.pop()?;
                    let l = ctx.pop()?;
                    let v = ctx.binop(op, &l, &r)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }
                Op::UopPos | Op::UopNeg | Op::UopSqig | Op::UopNot => {
                    let x = ctx.pop()?;
                    let v = ctx.unop(op, &x)?;
                    ctx.push(v);
                    Ok(Flow::Next)
                }
            }
        };

        match step(ctx, &mut pc, &mut tryblocks) {
            Ok(Flow::Next) => {}
            Ok(Flow::Jump(target)) => pc = target,
            Ok(Flow::Return(v)) => {
                ctx.thread.stack.truncate(entry_depth);
                return Ok(v);
            }
            Err(Throw) => match tryblocks.pop() {
                Some(tb) => {
                    ctx.thread.stack.truncate(tb.depth);
                    pc = tb.target;
                }
                None => {
                    ctx.thread.stack.truncate(entry_depth);
                    return Err(Throw);
                }
            },
        }
    }
}

/// Read a string constant (a name) out of the pool.
fn const_name(ctx: &mut Context, code: &crate::code::CodeData, idx: i32) -> XResult<String> {
    match code.pool.get(idx as usize).as_ref().and_then(|o| o.as_str()) {
        Some(s) => Ok(s.to_string()),
        None => Err(ctx.throw(ExcKind::InternalError, "Expected a name constant")),
    }
}

/// Build a function value from its template constant:
/// `(name, (param names), vararg index or none, code)`.
fn build_func(
    ctx: &mut Context,
    tpl: &Obj,
    frame: &Rc<RefCell<Frame>>,
    globals: &Obj,
) -> XResult<Obj> {
    let parts = match tpl.as_tuple() {
        Some(t) if t.len() == 4 => t.to_vec(),
        _ => return Err(ctx.throw(ExcKind::InternalError, "Bad function template")),
    };
    let name = parts[0].as_str().unwrap_or("<anonymous>").to_string();
    let params: Vec<String> = match parts[1].as_tuple() {
        Some(t) => t
            .iter()
            .map(|p| p.as_str().unwrap_or_default().to_string())
            .collect(),
        None => return Err(ctx.throw(ExcKind::InternalError, "Bad function template")),
    };
    let vararg_idx = crate::number::to_index(&parts[2]).map(|v| v as usize);
    let code = parts[3].clone();
    if code.as_code().is_none() {
        return Err(ctx.throw(ExcKind::InternalError, "Bad function template"));
    }

    let nparams = params.len();
    Ok(Obj::new(
        &ctx.types.func,
        Payload::Func(crate::func::FuncData {
            name,
            kind: FuncKind::Bytecode(BFunc {
                code,
                params,
                defaults: RefCell::new(vec![None; nparams]),
                vararg_idx,
                closure: Some(frame.clone()),
                globals: globals.clone(),
            }),
        }),
        false,
    ))
}

/// Build a user type from its template constant `(name, body code)` and
/// the base popped off the stack: run the body with the new attribute
/// namespace as locals, then seal it into a type.
fn build_type(
    ctx: &mut Context,
    tpl: &Obj,
    base: &Obj,
    frame: &Rc<RefCell<Frame>>,
    globals: &Obj,
) -> XResult<Obj> {
    let parts = match tpl.as_tuple() {
        Some(t) if t.len() == 2 => t.to_vec(),
        _ => return Err(ctx.throw(ExcKind::InternalError, "Bad type template")),
    };
    let name = parts[0].as_str().unwrap_or("<type>").to_string();
    let body = parts[1].clone();
    if body.as_code().is_none() {
        return Err(ctx.throw(ExcKind::InternalError, "Bad type template"));
    }

    let ns = ctx.new_dict();
    exec_frame(
        ctx,
        body.clone(),
        body,
        ns.clone(),
        Some(frame.clone()),
        globals.clone(),
        Vec::new(),
    )?;
    ctx.make_type(&name, base, &ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::CodeData;

    fn empty_code(ctx: &Context) -> Obj {
        Obj::new(
            &ctx.types.code,
            Payload::Code(CodeData::new("<vm-test>", "")),
            false,
        )
    }

    #[test]
    fn test_callv_spreads_a_tuple_of_arguments() {
        let mut ctx = Context::new();
        let code = empty_code(&ctx);
        let builtins = ctx.builtins.clone();
        let chr = ctx.dict_get_str(&builtins, "chr").expect("chr builtin");
        let args = {
            let a = ctx.int_i64(65);
            ctx.tuple(vec![a])
        };
        {
            let cd = code.as_code().expect("code payload");
            cd.emito(Op::Push, &chr);
            cd.emito(Op::Push, &args);
            cd.emit(Op::Callv);
            cd.emit(Op::Ret);
        }
        let locals = ctx.new_dict();
        let r = ctx.exec_code(&code, &locals).expect("exec");
        assert_eq!(r.as_str(), Some("A"));
    }

    #[test]
    fn test_list_builders_extend_in_chunks() {
        let mut ctx = Context::new();
        let code = empty_code(&ctx);
        let one = ctx.int_i64(1);
        let two = ctx.int_i64(2);
        let tail = {
            let (a, b) = (ctx.int_i64(3), ctx.int_i64(4));
            ctx.tuple(vec![a, b])
        };
        {
            let cd = code.as_code().expect("code payload");
            cd.emiti(Op::List, 0);
            cd.emito(Op::Push, &one);
            cd.emito(Op::Push, &two);
            cd.emiti(Op::ListPushn, 2);
            cd.emito(Op::Push, &tail);
            cd.emit(Op::ListPushi);
            cd.emit(Op::Ret);
        }
        let locals = ctx.new_dict();
        let r = ctx.exec_code(&code, &locals).expect("exec");
        let rendered = ctx.repr(&r).expect("repr");
        assert_eq!(rendered, "[1, 2, 3, 4]");
    }

    #[test]
    fn test_tuple_and_set_builders() {
        let mut ctx = Context::new();
        let code = empty_code(&ctx);
        let one = ctx.int_i64(1);
        let two = ctx.int_i64(2);
        let pair = ctx.tuple(vec![one.clone()]);
        {
            let cd = code.as_code().expect("code payload");
            cd.emiti(Op::Tuple, 0);
            cd.emito(Op::Push, &one);
            cd.emiti(Op::TuplePushn, 1);
            cd.emito(Op::Push, &pair);
            cd.emit(Op::TuplePushi);
            cd.emit(Op::Ret);
        }
        let locals = ctx.new_dict();
        let r = ctx.exec_code(&code, &locals).expect("exec");
        // (1,) extended by iterating (1,) again.
        assert_eq!(ctx.repr(&r).expect("repr"), "(1, 1)");

        let code = empty_code(&ctx);
        {
            let cd = code.as_code().expect("code payload");
            cd.emiti(Op::Set, 0);
            cd.emito(Op::Push, &one);
            cd.emito(Op::Push, &two);
            cd.emiti(Op::SetPushn, 2);
            cd.emito(Op::Push, &two);
            cd.emiti(Op::SetPushn, 1);
            cd.emit(Op::Ret);
        }
        let r = ctx.exec_code(&code, &locals).expect("exec");
        assert_eq!(ctx.repr(&r).expect("repr"), "{1, 2}");
    }

    #[test]
    fn test_noop_and_dup() {
        let mut ctx = Context::new();
        let code = empty_code(&ctx);
        let one = ctx.int_i64(1);
        {
            let cd = code.as_code().expect("code payload");
            cd.emit(Op::Noop);
            cd.emito(Op::Push, &one);
            cd.emit(Op::Dup);
            cd.emit(Op::BopAdd);
            cd.emit(Op::Ret);
        }
        let locals = ctx.new_dict();
        let r = ctx.exec_code(&code, &locals).expect("exec");
        assert_eq!(r.as_int().map(|v| v.to_string()), Some("2".to_string()));
    }
}
