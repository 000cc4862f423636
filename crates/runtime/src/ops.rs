//! Operator dispatch
//!
//! Binary operators try the left operand's slot, then the right one's
//! with the arguments swapped; a slot defers by returning the `undefined`
//! sentinel, and when both sides defer the operation is a `TypeError`.
//! Builtin payload pairs short-circuit through native fast paths before
//! any slot runs. Element access (`getelem`/`setelem`/`delelem`) lives
//! here too; subscripting a type instantiates a template.

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::number::{
    self, bigint_floordiv, bigint_mod, f64_floormod, to_bigint, to_complex, to_f64,
};
use crate::obj::{Obj, Payload, value_eq};
use crate::op::Op;
use crate::string::StrData;
use crate::types::{Slots, slot_lookup, type_name};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;

/// Source-level symbol of a binary opcode, for error messages.
fn bop_symbol(op: Op) -> &'static str {
    match op {
        Op::BopIn => "in",
        Op::BopEeq => "===",
        Op::BopEq => "==",
        Op::BopNe => "!=",
        Op::BopLt => "<",
        Op::BopLe => "<=",
        Op::BopGt => ">",
        Op::BopGe => ">=",
        Op::BopIor => "|",
        Op::BopXor => "^",
        Op::BopAnd => "&",
        Op::BopLsh => "<<",
        Op::BopRsh => ">>",
        Op::BopAdd => "+",
        Op::BopSub => "-",
        Op::BopMul => "*",
        Op::BopDiv => "/",
        Op::BopFloordiv => "//",
        Op::BopMod => "%",
        Op::BopPow => "**",
        _ => "?",
    }
}

/// Slot getter for a binary opcode.
fn bop_slot(op: Op) -> Option<fn(&Slots) -> Option<Obj>> {
    Some(match op {
        Op::BopIn => |s: &Slots| s.contains.clone(),
        Op::BopEq => |s: &Slots| s.eq.clone(),
        Op::BopLt => |s: &Slots| s.lt.clone(),
        Op::BopLe => |s: &Slots| s.le.clone(),
        Op::BopGt => |s: &Slots| s.gt.clone(),
        Op::BopGe => |s: &Slots| s.ge.clone(),
        Op::BopIor => |s: &Slots| s.ior.clone(),
        Op::BopXor => |s: &Slots| s.xor.clone(),
        Op::BopAnd => |s: &Slots| s.and.clone(),
        Op::BopLsh => |s: &Slots| s.lsh.clone(),
        Op::BopRsh => |s: &Slots| s.rsh.clone(),
        Op::BopAdd => |s: &Slots| s.add.clone(),
        Op::BopSub => |s: &Slots| s.sub.clone(),
        Op::BopMul => |s: &Slots| s.mul.clone(),
        Op::BopDiv => |s: &Slots| s.div.clone(),
        Op::BopFloordiv => |s: &Slots| s.floordiv.clone(),
        Op::BopMod => |s: &Slots| s.mod_.clone(),
        Op::BopPow => |s: &Slots| s.pow.clone(),
        _ => return None,
    })
}

impl Context {
    /// Evaluate a binary operator.
    pub fn binop(&mut self, op: Op, l: &Obj, r: &Obj) -> XResult<Obj> {
        match op {
            Op::BopEeq => return Ok(self.bool_(l.is(r))),
            Op::BopEq => {
                let v = self.obj_eq(l, r)?;
                return Ok(self.bool_(v));
            }
            Op::BopNe => {
                let v = self.obj_eq(l, r)?;
                return Ok(self.bool_(!v));
            }
            Op::BopLt | Op::BopLe | Op::BopGt | Op::BopGe => {
                if let Some(ord) = self.obj_cmp(l, r)? {
                    let v = match op {
                        Op::BopLt => ord == Ordering::Less,
                        Op::BopLe => ord != Ordering::Greater,
                        Op::BopGt => ord == Ordering::Greater,
                        _ => ord != Ordering::Less,
                    };
                    return Ok(self.bool_(v));
                }
                // Fall through to slot dispatch below.
            }
            Op::BopIn => return self.contains(l, r),
            _ => {
                if let Some(v) = self.binop_native(op, l, r)? {
                    return Ok(v);
                }
            }
        }

        // Left slot, then right slot with swapped operands.
        if let Some(get) = bop_slot(op) {
            if let Some(slot) = slot_lookup(l.ty(), get) {
                let v = self.call_obj(slot, vec![l.clone(), r.clone()])?;
                if !self.is_undefined(&v) {
                    return Ok(v);
                }
            }
            if let Some(slot) = slot_lookup(r.ty(), get) {
                let v = self.call_obj(slot, vec![r.clone(), l.clone()])?;
                if !self.is_undefined(&v) {
                    return Ok(v);
                }
            }
        }

        let (ln, rn) = (type_name(l), type_name(r));
        Err(self.throw(
            ExcKind::TypeError,
            format!(
                "Unsupported operator '{}' between '{}' and '{}'",
                bop_symbol(op),
                ln,
                rn
            ),
        ))
    }

    /// Native fast paths for the arithmetic/bitwise operators. `None`
    /// defers to slot dispatch.
    fn binop_native(&mut self, op: Op, l: &Obj, r: &Obj) -> XResult<Option<Obj>> {
        // Integer arithmetic (bool coerces to int).
        if let (Some(a), Some(b)) = (to_bigint(l), to_bigint(r)) {
            return match op {
                Op::BopAdd => Ok(Some(self.int_from(a + b))),
                Op::BopSub => Ok(Some(self.int_from(a - b))),
                Op::BopMul => Ok(Some(self.int_from(a * b))),
                Op::BopDiv => {
                    if b.is_zero() {
                        return Err(self.throw(ExcKind::ValError, "Division by zero"));
                    }
                    let (x, y) = (a.to_f64().unwrap_or(f64::NAN), b.to_f64().unwrap_or(f64::NAN));
                    Ok(Some(self.float(x / y)))
                }
                Op::BopFloordiv => match bigint_floordiv(&a, &b) {
                    Some(v) => Ok(Some(self.int_from(v))),
                    None => Err(self.throw(ExcKind::ValError, "Division by zero")),
                },
                Op::BopMod => match bigint_mod(&a, &b) {
                    Some(v) => Ok(Some(self.int_from(v))),
                    None => Err(self.throw(ExcKind::ValError, "Division by zero")),
                },
                Op::BopPow => self.int_pow(a, b).map(Some),
                Op::BopIor => Ok(Some(self.int_from(a | b))),
                Op::BopXor => Ok(Some(self.int_from(a ^ b))),
                Op::BopAnd => Ok(Some(self.int_from(a & b))),
                Op::BopLsh | Op::BopRsh => {
                    let count = match b.to_u64() {
                        Some(c) if c <= 1 << 20 => c as usize,
                        Some(_) => {
                            return Err(
                                self.throw(ExcKind::OverflowError, "Shift count too large")
                            );
                        }
                        None => {
                            return Err(self.throw(ExcKind::ValError, "Negative shift count"));
                        }
                    };
                    let v = if op == Op::BopLsh { a << count } else { a >> count };
                    Ok(Some(self.int_from(v)))
                }
                _ => Ok(None),
            };
        }

        // Real float arithmetic.
        let real = |o: &Obj| {
            matches!(
                o.payload(),
                Payload::Int(_) | Payload::Bool(_) | Payload::Float(_)
            )
        };
        if real(l) && real(r) {
            let (a, b) = match (to_f64(l), to_f64(r)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(None),
            };
            return match op {
                Op::BopAdd => Ok(Some(self.float(a + b))),
                Op::BopSub => Ok(Some(self.float(a - b))),
                Op::BopMul => Ok(Some(self.float(a * b))),
                Op::BopDiv => Ok(Some(self.float(a / b))),
                Op::BopFloordiv => Ok(Some(self.float((a / b).floor()))),
                Op::BopMod => Ok(Some(self.float(f64_floormod(a, b)))),
                Op::BopPow => Ok(Some(self.float(a.powf(b)))),
                _ => Ok(None),
            };
        }

        // Complex arithmetic.
        if number::is_numeric(l) && number::is_numeric(r) {
            let ((ar, ai), (br, bi)) = match (to_complex(l), to_complex(r)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(None),
            };
            return match op {
                Op::BopAdd => Ok(Some(self.complex(ar + br, ai + bi))),
                Op::BopSub => Ok(Some(self.complex(ar - br, ai - bi))),
                Op::BopMul => Ok(Some(self.complex(ar * br - ai * bi, ar * bi + ai * br))),
                Op::BopDiv => {
                    let d = br * br + bi * bi;
                    Ok(Some(self.complex(
                        (ar * br + ai * bi) / d,
                        (ai * br - ar * bi) / d,
                    )))
                }
                _ => Ok(None),
            };
        }

        // Sequence and string forms.
        match (l.payload(), r.payload(), op) {
            (Payload::Str(a), Payload::Str(b), Op::BopAdd) => {
                let mut s = String::with_capacity(a.text.len() + b.text.len());
                s.push_str(&a.text);
                s.push_str(&b.text);
                Ok(Some(self.str_(s)))
            }
            (Payload::Str(a), _, Op::BopMul) => Ok(self.repeat_str(a, r)),
            (_, Payload::Str(b), Op::BopMul) => Ok(self.repeat_str(b, l)),
            (Payload::Bytes(a), Payload::Bytes(b), Op::BopAdd) => {
                let mut v = Vec::with_capacity(a.len() + b.len());
                v.extend_from_slice(a);
                v.extend_from_slice(b);
                Ok(Some(self.bytes(v)))
            }
            (Payload::List(a), Payload::List(b), Op::BopAdd) => {
                let mut v = a.borrow().clone();
                v.extend(b.borrow().iter().cloned());
                Ok(Some(self.list(v)))
            }
            (Payload::List(a), _, Op::BopMul) => {
                let items = a.borrow().clone();
                Ok(self.repeat_seq(&items, r).map(|v| self.list(v)))
            }
            (Payload::Tuple(a), Payload::Tuple(b), Op::BopAdd) => {
                let mut v = a.to_vec();
                v.extend(b.iter().cloned());
                Ok(Some(self.tuple(v)))
            }
            (Payload::Tuple(a), _, Op::BopMul) => {
                Ok(self.repeat_seq(a, r).map(|v| self.tuple(v)))
            }
            // Set algebra.
            (Payload::Set(_), Payload::Set(_), Op::BopIor)
            | (Payload::Set(_), Payload::Set(_), Op::BopAnd)
            | (Payload::Set(_), Payload::Set(_), Op::BopSub)
            | (Payload::Set(_), Payload::Set(_), Op::BopXor) => {
                self.set_algebra(op, l, r).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn repeat_str(&mut self, s: &StrData, count: &Obj) -> Option<Obj> {
        let n = to_bigint(count)?.to_usize()?;
        Some(self.str_(s.text.repeat(n)))
    }

    fn repeat_seq(&mut self, items: &[Obj], count: &Obj) -> Option<Vec<Obj>> {
        let n = to_bigint(count)?.to_usize()?;
        let mut out = Vec::with_capacity(items.len() * n);
        for _ in 0..n {
            out.extend(items.iter().cloned());
        }
        Some(out)
    }

    fn int_pow(&mut self, a: BigInt, b: BigInt) -> XResult<Obj> {
        use num_traits::Pow;
        if b.is_negative() {
            let (x, y) = (a.to_f64().unwrap_or(f64::NAN), b.to_f64().unwrap_or(f64::NAN));
            return Ok(self.float(x.powf(y)));
        }
        match b.to_u32() {
            Some(exp) => Ok(self.int_from(Pow::pow(a, exp))),
            None => Err(self.throw(ExcKind::OverflowError, "Exponent too large")),
        }
    }

    fn set_algebra(&mut self, op: Op, l: &Obj, r: &Obj) -> XResult<Obj> {
        let lk: Vec<Obj> = l.as_set().map(|s| s.borrow().keys()).unwrap_or_default();
        let rk: Vec<Obj> = r.as_set().map(|s| s.borrow().keys()).unwrap_or_default();
        let in_r = |k: &Obj| rk.iter().any(|x| value_eq(x, k));
        let in_l = |k: &Obj| lk.iter().any(|x| value_eq(x, k));
        let keys: Vec<Obj> = match op {
            Op::BopIor => lk.iter().chain(rk.iter()).cloned().collect(),
            Op::BopAnd => lk.iter().filter(|k| in_r(k)).cloned().collect(),
            Op::BopSub => lk.iter().filter(|k| !in_r(k)).cloned().collect(),
            _ => lk
                .iter()
                .filter(|k| !in_r(k))
                .chain(rk.iter().filter(|k| !in_l(k)))
                .cloned()
                .collect(),
        };
        let out = self.new_set();
        for k in keys {
            self.dict_set(&out, k.clone(), k)?;
        }
        Ok(out)
    }

    /// Three-way comparison for the ordered builtins; `None` defers.
    pub fn obj_cmp(&mut self, l: &Obj, r: &Obj) -> XResult<Option<Ordering>> {
        if let (Some(a), Some(b)) = (to_bigint(l), to_bigint(r)) {
            return Ok(Some(a.cmp(&b)));
        }
        if number::is_numeric(l)
            && number::is_numeric(r)
            && !matches!(l.payload(), Payload::Complex(..))
            && !matches!(r.payload(), Payload::Complex(..))
        {
            let (a, b) = match (to_f64(l), to_f64(r)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(None),
            };
            return Ok(a.partial_cmp(&b));
        }
        match (l.payload(), r.payload()) {
            (Payload::Str(a), Payload::Str(b)) => Ok(Some(a.text.cmp(&b.text))),
            (Payload::Bytes(a), Payload::Bytes(b)) => Ok(Some(a.cmp(b))),
            (Payload::List(_), Payload::List(_)) | (Payload::Tuple(_), Payload::Tuple(_)) => {
                let av: Vec<Obj> = match l.payload() {
                    Payload::List(v) => v.borrow().clone(),
                    Payload::Tuple(v) => v.to_vec(),
                    _ => return Ok(None),
                };
                let bv: Vec<Obj> = match r.payload() {
                    Payload::List(v) => v.borrow().clone(),
                    Payload::Tuple(v) => v.to_vec(),
                    _ => return Ok(None),
                };
                for (x, y) in av.iter().zip(bv.iter()) {
                    if !self.obj_eq(x, y)? {
                        return self.obj_cmp(x, y);
                    }
                }
                Ok(Some(av.len().cmp(&bv.len())))
            }
            _ => Ok(None),
        }
    }

    /// The `in` operator: membership of `l` within `r`.
    pub fn contains(&mut self, l: &Obj, r: &Obj) -> XResult<Obj> {
        match r.payload() {
            Payload::Dict(_) | Payload::Set(_) => {
                let hit = self.dict_get(r, l)?.is_some();
                Ok(self.bool_(hit))
            }
            Payload::List(items) => {
                let items = items.borrow().clone();
                for x in &items {
                    if self.obj_eq(l, x)? {
                        return Ok(self.bool_(true));
                    }
                }
                Ok(self.bool_(false))
            }
            Payload::Tuple(items) => {
                let items = items.to_vec();
                for x in &items {
                    if self.obj_eq(l, x)? {
                        return Ok(self.bool_(true));
                    }
                }
                Ok(self.bool_(false))
            }
            Payload::Str(hay) => match l.as_str() {
                Some(needle) => Ok(self.bool_(hay.text.contains(needle))),
                None => {
                    let ty = type_name(l);
                    Err(self.throw(
                        ExcKind::TypeError,
                        format!("'in <str>' requires a str, not '{ty}'"),
                    ))
                }
            },
            Payload::Range(range) => match to_bigint(l) {
                Some(v) => Ok(self.bool_(range.contains(&v))),
                None => Ok(self.bool_(false)),
            },
            _ => {
                if let Some(slot) = slot_lookup(r.ty(), |s| s.contains.clone()) {
                    let v = self.call_obj(slot, vec![r.clone(), l.clone()])?;
                    let b = self.truthy(&v)?;
                    return Ok(self.bool_(b));
                }
                let ty = type_name(r);
                Err(self.throw(
                    ExcKind::TypeError,
                    format!("'{ty}' object does not support 'in'"),
                ))
            }
        }
    }

    /// Evaluate a unary operator.
    pub fn unop(&mut self, op: Op, v: &Obj) -> XResult<Obj> {
        match (op, v.payload()) {
            (Op::UopNot, _) => {
                let t = self.truthy(v)?;
                return Ok(self.bool_(!t));
            }
            (Op::UopPos, Payload::Int(_) | Payload::Bool(_)) => {
                return Ok(self.int_from(to_bigint(v).expect("int payload")));
            }
            (Op::UopPos, Payload::Float(x)) => return Ok(self.float(*x)),
            (Op::UopPos, Payload::Complex(re, im)) => return Ok(self.complex(*re, *im)),
            (Op::UopNeg, Payload::Int(_) | Payload::Bool(_)) => {
                return Ok(self.int_from(-to_bigint(v).expect("int payload")));
            }
            (Op::UopNeg, Payload::Float(x)) => return Ok(self.float(-x)),
            (Op::UopNeg, Payload::Complex(re, im)) => return Ok(self.complex(-re, -im)),
            (Op::UopSqig, Payload::Int(_) | Payload::Bool(_)) => {
                return Ok(self.int_from(!to_bigint(v).expect("int payload")));
            }
            _ => {}
        }

        let get: fn(&Slots) -> Option<Obj> = match op {
            Op::UopPos => |s: &Slots| s.pos.clone(),
            Op::UopNeg => |s: &Slots| s.neg.clone(),
            _ => |s: &Slots| s.sqig.clone(),
        };
        if let Some(slot) = slot_lookup(v.ty(), get) {
            let r = self.call_obj(slot, vec![v.clone()])?;
            if !self.is_undefined(&r) {
                return Ok(r);
            }
        }
        let sym = match op {
            Op::UopPos => "+",
            Op::UopNeg => "-",
            Op::UopSqig => "~",
            _ => "!",
        };
        let ty = type_name(v);
        Err(self.throw(
            ExcKind::TypeError,
            format!("Unsupported unary '{sym}' for '{ty}' object"),
        ))
    }

    /// Element read: sequences take integer or slice indices, mappings
    /// take hashable keys, types instantiate templates.
    pub fn getelem(&mut self, obj: &Obj, idxs: &[Obj]) -> XResult<Obj> {
        if obj.is_type() {
            return self.template(obj, idxs.to_vec());
        }
        if idxs.len() != 1 {
            if let Some(slot) = slot_lookup(obj.ty(), |s| s.getelem.clone()) {
                let mut args = vec![obj.clone()];
                args.extend(idxs.iter().cloned());
                return self.call_obj(slot, args);
            }
            let ty = type_name(obj);
            return Err(self.throw(
                ExcKind::TypeError,
                format!("'{ty}' object does not support multi-element indexing"),
            ));
        }
        let idx = &idxs[0];

        match obj.payload() {
            Payload::Dict(_) => match self.dict_get(obj, idx)? {
                Some(v) => Ok(v),
                None => {
                    let k = self.repr(idx)?;
                    Err(self.throw(ExcKind::KeyError, format!("Key {k} not found")))
                }
            },
            Payload::List(items) => {
                if let Payload::Slice(s) = idx.payload() {
                    let items = items.borrow().clone();
                    let norm = self.normalize_slice(s, items.len())?;
                    let mut out = Vec::with_capacity(norm.count);
                    let mut at = norm.first;
                    for _ in 0..norm.count {
                        out.push(items[at as usize].clone());
                        at += norm.delta;
                    }
                    return Ok(self.list(out));
                }
                let len = items.borrow().len();
                let i = self.normalize_index(idx, len)?;
                let v = items.borrow()[i].clone();
                Ok(v)
            }
            Payload::Tuple(items) => {
                if let Payload::Slice(s) = idx.payload() {
                    let norm = self.normalize_slice(s, items.len())?;
                    let mut out = Vec::with_capacity(norm.count);
                    let mut at = norm.first;
                    for _ in 0..norm.count {
                        out.push(items[at as usize].clone());
                        at += norm.delta;
                    }
                    return Ok(self.tuple(out));
                }
                let i = self.normalize_index(idx, items.len())?;
                Ok(items[i].clone())
            }
            Payload::Str(s) => {
                let chars: Vec<char> = s.text.chars().collect();
                if let Payload::Slice(sl) = idx.payload() {
                    let norm = self.normalize_slice(sl, chars.len())?;
                    let mut out = String::with_capacity(norm.count);
                    let mut at = norm.first;
                    for _ in 0..norm.count {
                        out.push(chars[at as usize]);
                        at += norm.delta;
                    }
                    return Ok(self.str_(out));
                }
                let i = self.normalize_index(idx, chars.len())?;
                Ok(self.str_(chars[i].to_string()))
            }
            Payload::Bytes(b) => {
                if let Payload::Slice(sl) = idx.payload() {
                    let norm = self.normalize_slice(sl, b.len())?;
                    let mut out = Vec::with_capacity(norm.count);
                    let mut at = norm.first;
                    for _ in 0..norm.count {
                        out.push(b[at as usize]);
                        at += norm.delta;
                    }
                    return Ok(self.bytes(out));
                }
                let i = self.normalize_index(idx, b.len())?;
                Ok(self.int_i64(b[i] as i64))
            }
            Payload::Range(range) => {
                let len = range.len().to_usize().unwrap_or(i64::MAX as usize);
                let i = self.normalize_index(idx, len)?;
                Ok(self.int_from(&range.start + &range.step * BigInt::from(i)))
            }
            _ => {
                if let Some(slot) = slot_lookup(obj.ty(), |s| s.getelem.clone()) {
                    return self.call_obj(slot, vec![obj.clone(), idx.clone()]);
                }
                let ty = type_name(obj);
                Err(self.throw(
                    ExcKind::TypeError,
                    format!("'{ty}' object is not subscriptable"),
                ))
            }
        }
    }

    /// Element write.
    pub fn setelem(&mut self, obj: &Obj, idxs: &[Obj], val: Obj) -> XResult<()> {
        if idxs.len() == 1 {
            match obj.payload() {
                Payload::Dict(_) => {
                    return self.dict_set(obj, idxs[0].clone(), val);
                }
                Payload::List(items) => {
                    let len = items.borrow().len();
                    let i = self.normalize_index(&idxs[0], len)?;
                    items.borrow_mut()[i] = val;
                    return Ok(());
                }
                _ => {}
            }
        }
        if let Some(slot) = slot_lookup(obj.ty(), |s| s.setelem.clone()) {
            let mut args = vec![obj.clone()];
            args.extend(idxs.iter().cloned());
            args.push(val);
            self.call_obj(slot, args)?;
            return Ok(());
        }
        let ty = type_name(obj);
        Err(self.throw(
            ExcKind::TypeError,
            format!("'{ty}' object does not support element assignment"),
        ))
    }

    /// Element deletion. Dict deletion leaves a tombstone behind.
    pub fn delelem(&mut self, obj: &Obj, idxs: &[Obj]) -> XResult<()> {
        if idxs.len() == 1 {
            match obj.payload() {
                Payload::Dict(_) => {
                    if self.dict_remove(obj, &idxs[0])?.is_none() {
                        let k = self.repr(&idxs[0])?;
                        return Err(
                            self.throw(ExcKind::KeyError, format!("Key {k} not found"))
                        );
                    }
                    return Ok(());
                }
                Payload::List(items) => {
                    let len = items.borrow().len();
                    let i = self.normalize_index(&idxs[0], len)?;
                    items.borrow_mut().remove(i);
                    return Ok(());
                }
                _ => {}
            }
        }
        if let Some(slot) = slot_lookup(obj.ty(), |s| s.delelem.clone()) {
            let mut args = vec![obj.clone()];
            args.extend(idxs.iter().cloned());
            self.call_obj(slot, args)?;
            return Ok(());
        }
        let ty = type_name(obj);
        Err(self.throw(
            ExcKind::TypeError,
            format!("'{ty}' object does not support element deletion"),
        ))
    }
}
