//! Runtime values
//!
//! Every Kestrel value is an [`Obj`]: a handle to a reference-counted cell
//! carrying the value's type, its payload, and (when the type asks for
//! one) a per-instance attribute mapping. `Rc`'s strong count is the
//! reference count: cloning a handle retains, dropping releases, and the
//! payload's `Drop` is the finalizer. Reference cycles are not detected;
//! a cycle leaks, which is the documented cost of the model.
//!
//! Mutation of list/dict/set payloads goes through `RefCell`, the dynamic
//! check standing in for the exclusive-owner discipline.

use crate::code::CodeData;
use crate::dict::DictData;
use crate::exc::ExcData;
use crate::func::{FuncData, PartialData};
use crate::import::ModuleData;
use crate::iter::IterData;
use crate::range::{RangeData, SliceData};
use crate::string::{RegexData, StrData};
use crate::types::TypeData;
use num_bigint::BigInt;
use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

/// Type-specific payload of a value.
pub enum Payload {
    None,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Complex(f64, f64),
    Str(StrData),
    Bytes(Box<[u8]>),
    List(RefCell<Vec<Obj>>),
    Tuple(Box<[Obj]>),
    Set(RefCell<DictData>),
    Dict(RefCell<DictData>),
    Range(RangeData),
    Slice(SliceData),
    Func(FuncData),
    Partial(PartialData),
    Code(CodeData),
    Module(ModuleData),
    Exc(RefCell<ExcData>),
    Type(TypeData),
    Regex(RegexData),
    Iter(RefCell<IterData>),
}

pub struct ObjCell {
    ty: OnceCell<Obj>,
    payload: Payload,
    attrs: Option<RefCell<DictData>>,
}

/// A handle to a runtime value.
#[derive(Clone)]
pub struct Obj(Rc<ObjCell>);

impl Obj {
    /// Allocate a value of type `ty`. When `with_attrs` is set the value
    /// carries a fresh per-instance attribute mapping.
    pub fn new(ty: &Obj, payload: Payload, with_attrs: bool) -> Obj {
        let o = Obj(Rc::new(ObjCell {
            ty: OnceCell::new(),
            payload,
            attrs: if with_attrs {
                Some(RefCell::new(DictData::new()))
            } else {
                None
            },
        }));
        let _ = o.0.ty.set(ty.clone());
        o
    }

    /// Allocate with the type pointer left unset. Used only while
    /// bootstrapping the type registry, where `object` and `type` must
    /// exist before they can point at each other.
    pub(crate) fn new_untyped(payload: Payload, with_attrs: bool) -> Obj {
        Obj(Rc::new(ObjCell {
            ty: OnceCell::new(),
            payload,
            attrs: if with_attrs {
                Some(RefCell::new(DictData::new()))
            } else {
                None
            },
        }))
    }

    /// Fill in the type pointer of a bootstrap value.
    pub(crate) fn init_type(&self, ty: &Obj) {
        let _ = self.0.ty.set(ty.clone());
    }

    /// The value's type.
    pub fn ty(&self) -> &Obj {
        self.0.ty.get().expect("type registry bootstrap complete")
    }

    pub fn payload(&self) -> &Payload {
        &self.0.payload
    }

    /// The per-instance attribute mapping, if the type declared one.
    pub fn attrs(&self) -> Option<&RefCell<DictData>> {
        self.0.attrs.as_ref()
    }

    /// Identity of the value (its cell address).
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Identity comparison (`===`).
    pub fn is(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Current reference count, surfaced for diagnostics.
    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    // Payload accessors. Each returns `None` when the payload is a
    // different kind.

    pub fn as_int(&self) -> Option<&BigInt> {
        match self.payload() {
            Payload::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.payload() {
            Payload::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload() {
            Payload::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.payload() {
            Payload::Str(s) => Some(&s.text),
            _ => None,
        }
    }

    pub fn str_data(&self) -> Option<&StrData> {
        match self.payload() {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self.payload() {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&RefCell<Vec<Obj>>> {
        match self.payload() {
            Payload::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Obj]> {
        match self.payload() {
            Payload::Tuple(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&RefCell<DictData>> {
        match self.payload() {
            Payload::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&RefCell<DictData>> {
        match self.payload() {
            Payload::Set(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&CodeData> {
        match self.payload() {
            Payload::Code(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&FuncData> {
        match self.payload() {
            Payload::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_exc(&self) -> Option<&RefCell<ExcData>> {
        match self.payload() {
            Payload::Exc(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match self.payload() {
            Payload::Module(m) => Some(m),
            _ => None,
        }
    }

    /// Type payload of a type object.
    pub fn type_data(&self) -> Option<&TypeData> {
        match self.payload() {
            Payload::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self.payload(), Payload::None)
    }

    pub fn is_type(&self) -> bool {
        matches!(self.payload(), Payload::Type(_))
    }

    /// Whether the value can be called: functions, partials, types, code
    /// objects, or anything whose type provides a `__call` slot.
    pub fn is_callable(&self) -> bool {
        matches!(
            self.payload(),
            Payload::Func(_) | Payload::Partial(_) | Payload::Type(_) | Payload::Code(_)
        )
    }
}

impl std::fmt::Debug for Obj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.payload() {
            Payload::None => "none",
            Payload::Bool(_) => "bool",
            Payload::Int(_) => "int",
            Payload::Float(_) => "float",
            Payload::Complex(..) => "complex",
            Payload::Str(_) => "str",
            Payload::Bytes(_) => "bytes",
            Payload::List(_) => "list",
            Payload::Tuple(_) => "tuple",
            Payload::Set(_) => "set",
            Payload::Dict(_) => "dict",
            Payload::Range(_) => "range",
            Payload::Slice(_) => "slice",
            Payload::Func(_) => "func",
            Payload::Partial(_) => "partial",
            Payload::Code(_) => "code",
            Payload::Module(_) => "module",
            Payload::Exc(_) => "exception",
            Payload::Type(_) => "type",
            Payload::Regex(_) => "regex",
            Payload::Iter(_) => "iter",
        };
        write!(f, "<{} @ {:#x}>", kind, self.id())
    }
}

/// Pure value equality, with no user dispatch: identity, cross-kind
/// numeric equality, and structural equality for strings, bytes, and
/// containers. Used for mapping keys and as the `==` fast path.
pub fn value_eq(a: &Obj, b: &Obj) -> bool {
    if a.is(b) {
        return true;
    }
    if let Some(r) = crate::number::num_eq(a, b) {
        return r;
    }
    match (a.payload(), b.payload()) {
        (Payload::None, Payload::None) => true,
        (Payload::Str(x), Payload::Str(y)) => x.hash == y.hash && x.text == y.text,
        (Payload::Bytes(x), Payload::Bytes(y)) => x == y,
        (Payload::Tuple(x), Payload::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| value_eq(p, q))
        }
        (Payload::List(x), Payload::List(y)) => {
            let x = x.borrow();
            let y = y.borrow();
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| value_eq(p, q))
        }
        _ => false,
    }
}

/// Pure value hash. `None` means the payload has no value hash (mutable
/// containers, or kinds that hash by identity at the context level).
pub fn value_hash(o: &Obj) -> Option<u64> {
    match o.payload() {
        Payload::None => Some(447),
        Payload::Bool(b) => Some(crate::number::hash_bigint(&BigInt::from(*b as i64))),
        Payload::Int(v) => Some(crate::number::hash_bigint(v)),
        Payload::Float(v) => Some(crate::number::hash_f64(*v)),
        Payload::Complex(re, im) => Some(crate::number::hash_complex(*re, *im)),
        Payload::Str(s) => Some(s.hash),
        Payload::Bytes(b) => Some(crate::string::bytes_hash(b)),
        Payload::Tuple(elems) => {
            let mut h: u64 = 0x345678;
            for e in elems.iter() {
                h = h.wrapping_mul(1000003) ^ value_hash(e)?;
            }
            Some(h ^ elems.len() as u64)
        }
        _ => None,
    }
}

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::types::{slot_lookup, type_name};

impl Context {
    /// Truthiness of a value.
    pub fn truthy(&mut self, o: &Obj) -> XResult<bool> {
        use num_traits::Zero;
        match o.payload() {
            Payload::None => Ok(false),
            Payload::Bool(b) => Ok(*b),
            Payload::Int(v) => Ok(!v.is_zero()),
            Payload::Float(v) => Ok(*v != 0.0),
            Payload::Complex(re, im) => Ok(*re != 0.0 || *im != 0.0),
            Payload::Str(s) => Ok(!s.text.is_empty()),
            Payload::Bytes(b) => Ok(!b.is_empty()),
            Payload::List(v) => Ok(!v.borrow().is_empty()),
            Payload::Tuple(v) => Ok(!v.is_empty()),
            Payload::Set(d) | Payload::Dict(d) => Ok(!d.borrow().is_empty()),
            Payload::Range(r) => Ok(!r.is_empty()),
            _ => {
                if let Some(slot) = slot_lookup(o.ty(), |s| s.bool_.clone()) {
                    let r = self.call_obj(slot, vec![o.clone()])?;
                    if let Some(b) = r.as_bool() {
                        return Ok(b);
                    }
                    return Err(self.throw(
                        ExcKind::TypeError,
                        "'__bool' must return a bool".to_string(),
                    ));
                }
                Ok(true)
            }
        }
    }

    /// Hash of a value: the `__hash` slot when provided, value hashing
    /// for the hashable builtins, identity for plain instances. Mutable
    /// containers are unhashable.
    pub fn obj_hash(&mut self, o: &Obj) -> XResult<u64> {
        if let Some(slot) = slot_lookup(o.ty(), |s| s.hash.clone()) {
            let r = self.call_obj(slot, vec![o.clone()])?;
            if let Some(v) = crate::number::to_bigint(&r) {
                return Ok(crate::number::hash_bigint(&v));
            }
            return Err(self.throw(ExcKind::TypeError, "'__hash' must return an int"));
        }
        if let Some(h) = value_hash(o) {
            return Ok(h);
        }
        match o.payload() {
            Payload::List(_) | Payload::Dict(_) | Payload::Set(_) => {
                let ty = type_name(o);
                Err(self.throw(
                    ExcKind::TypeError,
                    format!("'{ty}' object is not hashable"),
                ))
            }
            _ => Ok((o.id() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) % crate::number::HASH_M),
        }
    }

    /// Value equality through the `__eq` slot, with the pure fast path.
    pub fn obj_eq(&mut self, a: &Obj, b: &Obj) -> XResult<bool> {
        if value_eq(a, b) {
            return Ok(true);
        }
        if let Some(slot) = slot_lookup(a.ty(), |s| s.eq.clone()) {
            let r = self.call_obj(slot, vec![a.clone(), b.clone()])?;
            if !self.is_undefined(&r) {
                return self.truthy(&r);
            }
        }
        if let Some(slot) = slot_lookup(b.ty(), |s| s.eq.clone()) {
            let r = self.call_obj(slot, vec![b.clone(), a.clone()])?;
            if !self.is_undefined(&r) {
                return self.truthy(&r);
            }
        }
        Ok(false)
    }

    /// `repr` of a value. Containers guard against recursion through the
    /// thread's in-repr list and elide already-in-progress values.
    pub fn repr(&mut self, o: &Obj) -> XResult<String> {
        if self.thread.inrepr.iter().any(|x| x.is(o)) {
            return Ok("...".to_string());
        }
        if let Some(slot) = slot_lookup(o.ty(), |s| s.repr.clone()) {
            let r = self.call_obj(slot, vec![o.clone()])?;
            return match r.as_str() {
                Some(s) => Ok(s.to_string()),
                None => Err(self.throw(ExcKind::TypeError, "'__repr' must return a str")),
            };
        }
        match o.payload() {
            Payload::None => Ok("none".to_string()),
            Payload::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
            Payload::Int(v) => Ok(v.to_string()),
            Payload::Float(v) => Ok(crate::number::float_repr(*v)),
            Payload::Complex(re, im) => Ok(crate::number::complex_repr(*re, *im)),
            Payload::Str(s) => Ok(crate::string::quote(&s.text)),
            Payload::Bytes(b) => {
                let mut out = String::from("b'");
                for byte in b.iter() {
                    match byte {
                        b'\\' => out.push_str("\\\\"),
                        b'\'' => out.push_str("\\'"),
                        0x20..=0x7e => out.push(*byte as char),
                        _ => out.push_str(&format!("\\x{byte:02x}")),
                    }
                }
                out.push('\'');
                Ok(out)
            }
            Payload::List(_) => {
                self.thread.inrepr.push(o.clone());
                let r = self.repr_seq(o, "[", "]");
                self.thread.inrepr.pop();
                r
            }
            Payload::Tuple(elems) => {
                self.thread.inrepr.push(o.clone());
                let r: XResult<String> = (|| {
                    let mut parts = Vec::with_capacity(elems.len());
                    for e in elems.iter() {
                        parts.push(self.repr(e)?);
                    }
                    Ok(match parts.len() {
                        1 => format!("({},)", parts[0]),
                        _ => format!("({})", parts.join(", ")),
                    })
                })();
                self.thread.inrepr.pop();
                r
            }
            Payload::Set(d) => {
                self.thread.inrepr.push(o.clone());
                let r: XResult<String> = (|| {
                    let keys = d.borrow().keys();
                    if keys.is_empty() {
                        return Ok("set()".to_string());
                    }
                    let mut parts = Vec::with_capacity(keys.len());
                    for k in &keys {
                        parts.push(self.repr(k)?);
                    }
                    Ok(format!("{{{}}}", parts.join(", ")))
                })();
                self.thread.inrepr.pop();
                r
            }
            Payload::Dict(d) => {
                self.thread.inrepr.push(o.clone());
                let r: XResult<String> = (|| {
                    let items: Vec<(Obj, Obj)> = d
                        .borrow()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    let mut parts = Vec::with_capacity(items.len());
                    for (k, v) in &items {
                        parts.push(format!("{}: {}", self.repr(k)?, self.repr(v)?));
                    }
                    Ok(format!("{{{}}}", parts.join(", ")))
                })();
                self.thread.inrepr.pop();
                r
            }
            Payload::Range(r) => Ok(format!("range({}, {}, {})", r.start, r.end, r.step)),
            Payload::Slice(s) => {
                let a = self.repr(&s.start.clone())?;
                let b = self.repr(&s.end.clone())?;
                let c = self.repr(&s.step.clone())?;
                Ok(format!("slice({a}, {b}, {c})"))
            }
            Payload::Func(f) => Ok(format!("<func '{}'>", f.name)),
            Payload::Partial(p) => {
                let of = self.repr(&p.of.clone())?;
                Ok(format!("<partial of {of}>"))
            }
            Payload::Code(c) => Ok(format!("<code '{}'>", c.fname)),
            Payload::Module(m) => Ok(format!("<module '{}'>", m.name)),
            Payload::Exc(e) => {
                let ty = type_name(o);
                let msg = e.borrow().msg.clone();
                Ok(format!("{}({})", ty, crate::string::quote(&msg)))
            }
            Payload::Type(t) => Ok(format!("<type '{}'>", t.name)),
            Payload::Regex(r) => Ok(format!("`{}`", r.source)),
            Payload::Iter(_) => Ok(format!("<iter @ {:#x}>", o.id())),
        }
    }

    fn repr_seq(&mut self, o: &Obj, open: &str, close: &str) -> XResult<String> {
        let elems: Vec<Obj> = o.as_list().map(|l| l.borrow().clone()).unwrap_or_default();
        let mut parts = Vec::with_capacity(elems.len());
        for e in &elems {
            parts.push(self.repr(e)?);
        }
        Ok(format!("{open}{}{close}", parts.join(", ")))
    }

    /// Textual form of a value: strings pass through, exceptions render
    /// their message, everything else falls back to `repr` (or the
    /// `__str` slot when one is provided).
    pub fn str_of(&mut self, o: &Obj) -> XResult<String> {
        if let Some(s) = o.as_str() {
            return Ok(s.to_string());
        }
        if let Some(slot) = slot_lookup(o.ty(), |s| s.str_.clone()) {
            let r = self.call_obj(slot, vec![o.clone()])?;
            return match r.as_str() {
                Some(s) => Ok(s.to_string()),
                None => Err(self.throw(ExcKind::TypeError, "'__str' must return a str")),
            };
        }
        if let Some(e) = o.as_exc() {
            return Ok(e.borrow().msg.clone());
        }
        self.repr(o)
    }
}

/// Subtype test: walk `a`'s base chain looking for `b`. `object` is its
/// own base and terminates the chain.
pub fn issub(a: &Obj, b: &Obj) -> bool {
    let mut cur = a.clone();
    loop {
        if cur.is(b) {
            return true;
        }
        let base = match cur.type_data() {
            Some(td) => td.base_type(),
            None => return false,
        };
        if base.is(&cur) {
            return false;
        }
        cur = base;
    }
}

/// Instance test: `type(a)` is `b` or a subtype of it.
pub fn isinst(a: &Obj, b: &Obj) -> bool {
    issub(a.ty(), b)
}
