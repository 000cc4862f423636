//! Types and dispatch
//!
//! Types are themselves values. A type carries its names, its single base
//! (the root `object` type is its own base and terminates every chain),
//! an attribute mapping, and a table of dispatch slots: well-known
//! `__`-prefixed operations cached into direct fields when stored, so
//! operator dispatch does not probe the mapping. Dispatch walks the base
//! chain and uses the nearest ancestor providing a slot.
//!
//! A templated type's identity additionally includes its parameter tuple;
//! instantiation is memoized so the same parameters yield the same type
//! object.

use crate::context::Context;
use crate::dict::DictData;
use crate::exc::{ExcKind, XResult};
use crate::func::PartialData;
use crate::obj::{Obj, Payload, issub};
use std::cell::{OnceCell, RefCell};

/// Direct slot cache for the well-known operations.
#[derive(Default)]
pub struct Slots {
    pub new_: Option<Obj>,
    pub init: Option<Obj>,
    pub free: Option<Obj>,
    pub str_: Option<Obj>,
    pub repr: Option<Obj>,
    pub hash: Option<Obj>,
    pub len: Option<Obj>,
    pub bool_: Option<Obj>,
    pub int: Option<Obj>,
    pub float: Option<Obj>,
    pub complex: Option<Obj>,
    pub bytes: Option<Obj>,
    pub eq: Option<Obj>,
    pub cmp: Option<Obj>,
    pub lt: Option<Obj>,
    pub le: Option<Obj>,
    pub gt: Option<Obj>,
    pub ge: Option<Obj>,
    pub add: Option<Obj>,
    pub sub: Option<Obj>,
    pub mul: Option<Obj>,
    pub div: Option<Obj>,
    pub floordiv: Option<Obj>,
    pub mod_: Option<Obj>,
    pub pow: Option<Obj>,
    pub lsh: Option<Obj>,
    pub rsh: Option<Obj>,
    pub ior: Option<Obj>,
    pub xor: Option<Obj>,
    pub and: Option<Obj>,
    pub pos: Option<Obj>,
    pub neg: Option<Obj>,
    pub abs: Option<Obj>,
    pub sqig: Option<Obj>,
    pub getelem: Option<Obj>,
    pub setelem: Option<Obj>,
    pub delelem: Option<Obj>,
    pub contains: Option<Obj>,
    pub iter: Option<Obj>,
    pub next: Option<Obj>,
    pub call: Option<Obj>,
    pub getattr: Option<Obj>,
    pub setattr: Option<Obj>,
    pub on_template: Option<Obj>,
}

impl Slots {
    /// Cache `val` if `name` is a well-known key. Returns whether it was.
    pub fn set_well_known(&mut self, name: &str, val: &Obj) -> bool {
        let slot = match name {
            "__new" => &mut self.new_,
            "__init" => &mut self.init,
            "__free" => &mut self.free,
            "__str" => &mut self.str_,
            "__repr" => &mut self.repr,
            "__hash" => &mut self.hash,
            "__len" => &mut self.len,
            "__bool" => &mut self.bool_,
            "__int" => &mut self.int,
            "__float" => &mut self.float,
            "__complex" => &mut self.complex,
            "__bytes" => &mut self.bytes,
            "__eq" => &mut self.eq,
            "__cmp" => &mut self.cmp,
            "__lt" => &mut self.lt,
            "__le" => &mut self.le,
            "__gt" => &mut self.gt,
            "__ge" => &mut self.ge,
            "__add" => &mut self.add,
            "__sub" => &mut self.sub,
            "__mul" => &mut self.mul,
            "__div" => &mut self.div,
            "__floordiv" => &mut self.floordiv,
            "__mod" => &mut self.mod_,
            "__pow" => &mut self.pow,
            "__lsh" => &mut self.lsh,
            "__rsh" => &mut self.rsh,
            "__ior" => &mut self.ior,
            "__xor" => &mut self.xor,
            "__and" => &mut self.and,
            "__pos" => &mut self.pos,
            "__neg" => &mut self.neg,
            "__abs" => &mut self.abs,
            "__sqig" => &mut self.sqig,
            "__getelem" => &mut self.getelem,
            "__setelem" => &mut self.setelem,
            "__delelem" => &mut self.delelem,
            "__contains" => &mut self.contains,
            "__iter" => &mut self.iter,
            "__next" => &mut self.next,
            "__call" => &mut self.call,
            "__getattr" => &mut self.getattr,
            "__setattr" => &mut self.setattr,
            "__on_template" => &mut self.on_template,
            _ => return false,
        };
        *slot = Some(val.clone());
        true
    }
}

/// Payload of a type object.
pub struct TypeData {
    pub name: String,
    pub fullname: String,
    base: OnceCell<Obj>,
    /// Whether instances carry a per-instance attribute mapping.
    pub instances_have_attrs: bool,
    pub slots: RefCell<Slots>,
    pub attrs: RefCell<DictData>,
    /// Template parameters, for instantiated templated types.
    pub template: Option<Box<[Obj]>>,
    /// Memoized instantiations keyed by parameter identity.
    pub template_cache: RefCell<Vec<(Box<[Obj]>, Obj)>>,
}

impl TypeData {
    pub fn new(name: &str, fullname: &str, instances_have_attrs: bool) -> TypeData {
        TypeData {
            name: name.to_string(),
            fullname: fullname.to_string(),
            base: OnceCell::new(),
            instances_have_attrs,
            slots: RefCell::new(Slots::default()),
            attrs: RefCell::new(DictData::new()),
            template: None,
            template_cache: RefCell::new(Vec::new()),
        }
    }

    pub fn set_base(&self, base: &Obj) {
        let _ = self.base.set(base.clone());
    }

    pub fn base_type(&self) -> Obj {
        self.base
            .get()
            .expect("type registry bootstrap complete")
            .clone()
    }
}

/// Walk `ty`'s base chain, returning the first slot the getter finds.
pub fn slot_lookup(ty: &Obj, get: impl Fn(&Slots) -> Option<Obj>) -> Option<Obj> {
    let mut cur = ty.clone();
    loop {
        let td = cur.type_data()?;
        if let Some(v) = get(&td.slots.borrow()) {
            return Some(v);
        }
        let base = td.base_type();
        if base.is(&cur) {
            return None;
        }
        cur = base;
    }
}

/// The built-in type registry.
pub struct Types {
    pub object: Obj,
    pub type_: Obj,
    pub none: Obj,
    pub bool_: Obj,
    pub int: Obj,
    pub float: Obj,
    pub complex: Obj,
    pub str_: Obj,
    pub bytes: Obj,
    pub list: Obj,
    pub tuple: Obj,
    pub set: Obj,
    pub dict: Obj,
    pub range: Obj,
    pub slice: Obj,
    pub func: Obj,
    pub partial: Obj,
    pub code: Obj,
    pub module: Obj,
    pub iter: Obj,
    pub regex: Obj,
    excs: Vec<(ExcKind, Obj)>,
}

impl Types {
    pub fn new() -> Types {
        // `object` and `type` must exist before they can point at each
        // other, so both start untyped.
        let object = Obj::new_untyped(Payload::Type(TypeData::new("object", "object", false)), false);
        let type_ = Obj::new_untyped(Payload::Type(TypeData::new("type", "type", false)), false);
        object.init_type(&type_);
        type_.init_type(&type_);
        object.type_data().expect("type payload").set_base(&object);
        type_.type_data().expect("type payload").set_base(&object);

        let make = |name: &str, base: &Obj, has_attrs: bool| {
            let td = TypeData::new(name, name, has_attrs);
            td.set_base(base);
            Obj::new(&type_, Payload::Type(td), false)
        };

        let int = make("int", &object, false);
        let excs = {
            let error = make("Error", &object, true);
            let mut excs = vec![(ExcKind::Error, error.clone())];
            for kind in ExcKind::ALL {
                if *kind != ExcKind::Error {
                    excs.push((*kind, make(kind.name(), &error, true)));
                }
            }
            excs
        };

        Types {
            none: make("none", &object, false),
            bool_: make("bool", &int, false),
            float: make("float", &object, false),
            complex: make("complex", &object, false),
            str_: make("str", &object, false),
            bytes: make("bytes", &object, false),
            list: make("list", &object, false),
            tuple: make("tuple", &object, false),
            set: make("set", &object, false),
            dict: make("dict", &object, false),
            range: make("range", &object, false),
            slice: make("slice", &object, false),
            func: make("func", &object, false),
            partial: make("func.partial", &object, false),
            code: make("code", &object, false),
            module: make("module", &object, true),
            iter: make("iter", &object, false),
            regex: make("regex", &object, false),
            int,
            object,
            type_,
            excs,
        }
    }

    pub fn exc_type(&self, kind: ExcKind) -> &Obj {
        &self
            .excs
            .iter()
            .find(|(k, _)| *k == kind)
            .expect("registered exception kind")
            .1
    }

    pub fn error(&self) -> &Obj {
        self.exc_type(ExcKind::Error)
    }

    /// The builtin type owning a payload, for dispatch off a value.
    pub fn of_payload(&self, payload: &Payload) -> Obj {
        match payload {
            Payload::None => self.none.clone(),
            Payload::Bool(_) => self.bool_.clone(),
            Payload::Int(_) => self.int.clone(),
            Payload::Float(_) => self.float.clone(),
            Payload::Complex(..) => self.complex.clone(),
            Payload::Str(_) => self.str_.clone(),
            Payload::Bytes(_) => self.bytes.clone(),
            Payload::List(_) => self.list.clone(),
            Payload::Tuple(_) => self.tuple.clone(),
            Payload::Set(_) => self.set.clone(),
            Payload::Dict(_) => self.dict.clone(),
            Payload::Range(_) => self.range.clone(),
            Payload::Slice(_) => self.slice.clone(),
            Payload::Func(_) => self.func.clone(),
            Payload::Partial(_) => self.partial.clone(),
            Payload::Code(_) => self.code.clone(),
            Payload::Module(_) => self.module.clone(),
            Payload::Exc(_) => self.error().clone(),
            Payload::Type(_) => self.type_.clone(),
            Payload::Regex(_) => self.regex.clone(),
            Payload::Iter(_) => self.iter.clone(),
        }
    }
}

impl Default for Types {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Install an attribute on a type, refreshing the slot cache for
    /// well-known `__` keys.
    pub fn type_set_attr(&mut self, ty: &Obj, name: &str, val: Obj) -> XResult<()> {
        let key = self.str_(name);
        let hash = crate::string::str_hash(name);
        let td = match ty.type_data() {
            Some(td) => td,
            None => return Err(self.throw(ExcKind::TypeError, "Expected a type")),
        };
        td.slots.borrow_mut().set_well_known(name, &val);
        td.attrs.borrow_mut().insert(hash, key, val);
        Ok(())
    }

    /// Attribute access.
    ///
    /// Instances consult their per-instance mapping first, then walk the
    /// type chain; a callable found on the chain binds the instance as a
    /// partial with position 0 pre-filled. Types walk their own chain
    /// without binding.
    pub fn getattr(&mut self, obj: &Obj, name: &str) -> XResult<Obj> {
        // Attributes every type object answers.
        if let Some(td) = obj.type_data() {
            match name {
                "__name" => return Ok(self.str_(td.name.clone())),
                "__fullname" => return Ok(self.str_(td.fullname.clone())),
                "__base" => return Ok(td.base_type()),
                _ => {}
            }
            let mut cur = obj.clone();
            loop {
                let found = cur
                    .type_data()
                    .and_then(|td| td.attrs.borrow().get_str(name));
                if let Some(v) = found {
                    return Ok(v);
                }
                let base = match cur.type_data() {
                    Some(td) => td.base_type(),
                    None => break,
                };
                if base.is(&cur) {
                    break;
                }
                cur = base;
            }
            return Err(self.throw(
                ExcKind::AttrError,
                format!("Type '{}' has no attribute '{}'", td.name, name),
            ));
        }

        // Modules resolve names in their namespace.
        if let Some(m) = obj.as_module() {
            if let Some(v) = self.dict_get_str(&m.ns, name) {
                return Ok(v);
            }
            let mod_name = m.name.clone();
            return Err(self.throw(
                ExcKind::AttrError,
                format!("Module '{mod_name}' has no attribute '{name}'"),
            ));
        }

        // Per-instance mapping.
        if let Some(attrs) = obj.attrs() {
            if let Some(v) = attrs.borrow().get_str(name) {
                return Ok(v);
            }
        }

        // Exception and function payload fields.
        match (obj.payload(), name) {
            (Payload::Exc(data), "msg") => {
                let msg = data.borrow().msg.clone();
                return Ok(self.str_(msg));
            }
            (Payload::Exc(data), "inner") => {
                let inner = data.borrow().inner.clone();
                return Ok(inner.unwrap_or_else(|| self.none()));
            }
            (Payload::Func(f), "__name") => return Ok(self.str_(f.name.clone())),
            _ => {}
        }

        // Walk the type chain; callables bind the instance.
        let mut cur = obj.ty().clone();
        loop {
            let found = cur
                .type_data()
                .and_then(|td| td.attrs.borrow().get_str(name));
            if let Some(v) = found {
                if v.is_callable() {
                    return Ok(Obj::new(
                        &self.types.partial,
                        Payload::Partial(PartialData {
                            of: v,
                            args: vec![(0, obj.clone())],
                        }),
                        false,
                    ));
                }
                return Ok(v);
            }
            let base = match cur.type_data() {
                Some(td) => td.base_type(),
                None => break,
            };
            if base.is(&cur) {
                break;
            }
            cur = base;
        }

        // `__getattr` slot fallback.
        if let Some(ga) = slot_lookup(obj.ty(), |s| s.getattr.clone()) {
            let name_obj = self.str_(name);
            return self.call_obj(ga, vec![obj.clone(), name_obj]);
        }

        let ty_name = type_name(obj);
        Err(self.throw(
            ExcKind::AttrError,
            format!("'{ty_name}' object has no attribute '{name}'"),
        ))
    }

    /// Attribute assignment.
    pub fn setattr(&mut self, obj: &Obj, name: &str, val: Obj) -> XResult<()> {
        if obj.is_type() {
            return self.type_set_attr(obj, name, val);
        }
        if let Some(m) = obj.as_module() {
            let ns = m.ns.clone();
            return self.dict_set_str(&ns, name, val);
        }
        if let Some(attrs) = obj.attrs() {
            let key = self.str_(name);
            let hash = crate::string::str_hash(name);
            attrs.borrow_mut().insert(hash, key, val);
            return Ok(());
        }
        if let Some(sa) = slot_lookup(obj.ty(), |s| s.setattr.clone()) {
            let name_obj = self.str_(name);
            self.call_obj(sa, vec![obj.clone(), name_obj, val])?;
            return Ok(());
        }
        let ty_name = type_name(obj);
        Err(self.throw(
            ExcKind::AttrError,
            format!("'{ty_name}' object attributes are read-only"),
        ))
    }

    /// Construct an instance by calling a type: `__new` (or default
    /// allocation), then `__init` when present.
    pub fn construct(&mut self, ty: &Obj, args: Vec<Obj>) -> XResult<Obj> {
        // `type(x)` reports x's type.
        if ty.is(&self.types.type_) && args.len() == 1 {
            return Ok(args[0].ty().clone());
        }
        let td = match ty.type_data() {
            Some(td) => td,
            None => return Err(self.throw(ExcKind::TypeError, "Expected a type")),
        };
        let has_attrs = td.instances_have_attrs;

        let obj = if let Some(new_slot) = slot_lookup(ty, |s| s.new_.clone()) {
            let mut cargs = vec![ty.clone()];
            cargs.extend(args.iter().cloned());
            self.call_obj(new_slot, cargs)?
        } else {
            Obj::new(ty, Payload::None, has_attrs)
        };

        if let Some(init) = slot_lookup(ty, |s| s.init.clone()) {
            let mut cargs = vec![obj.clone()];
            cargs.extend(args);
            self.call_obj(init, cargs)?;
        }
        Ok(obj)
    }

    /// Create a user-defined type. The body has already populated `attrs`
    /// (a dict object); entries are copied over in insertion order and
    /// `__` keys refresh the slot cache.
    pub fn make_type(&mut self, name: &str, base: &Obj, attrs: &Obj) -> XResult<Obj> {
        if base.type_data().is_none() {
            let got = type_name(base);
            return Err(self.throw(
                ExcKind::TypeError,
                format!("Type base must be a type, not '{got}' object"),
            ));
        }
        let td = TypeData::new(name, name, true);
        td.set_base(base);
        let ty = Obj::new(&self.types.type_, Payload::Type(td), false);
        if let Some(cell) = attrs.as_dict() {
            let entries: Vec<(Obj, Obj)> = cell
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (k, v) in entries {
                if let Some(key) = k.as_str() {
                    self.type_set_attr(&ty, &key.to_string(), v)?;
                }
            }
        }
        Ok(ty)
    }

    /// Instantiate a templated type, memoizing on the parameter tuple.
    pub fn template(&mut self, ty: &Obj, params: Vec<Obj>) -> XResult<Obj> {
        let td = match ty.type_data() {
            Some(td) => td,
            None => return Err(self.throw(ExcKind::TypeError, "Expected a type")),
        };

        if let Some(hit) = td
            .template_cache
            .borrow()
            .iter()
            .find(|(ps, _)| ps.len() == params.len() && ps.iter().zip(&params).all(|(a, b)| a.is(b)))
            .map(|(_, t)| t.clone())
        {
            return Ok(hit);
        }

        let mut pnames = Vec::with_capacity(params.len());
        for p in &params {
            pnames.push(match p.type_data() {
                Some(ptd) => ptd.name.clone(),
                None => self.repr(p)?,
            });
        }
        let name = format!("{}<{}>", td.name, pnames.join(", "));
        let inst_td = TypeData {
            template: Some(params.clone().into_boxed_slice()),
            ..TypeData::new(&name, &name, td.instances_have_attrs)
        };
        inst_td.set_base(ty);
        let inst = Obj::new(&self.types.type_, Payload::Type(inst_td), false);

        td.template_cache
            .borrow_mut()
            .push((params.clone().into_boxed_slice(), inst.clone()));

        if let Some(hook) = slot_lookup(ty, |s| s.on_template.clone()) {
            let ptup = self.tuple(params);
            self.call_obj(hook, vec![inst.clone(), ptup])?;
        }
        Ok(inst)
    }

    /// Subtype and instance tests as context operations.
    pub fn isinstance(&self, obj: &Obj, ty: &Obj) -> bool {
        crate::obj::isinst(obj, ty)
    }

    pub fn issubtype(&self, a: &Obj, b: &Obj) -> bool {
        issub(a, b)
    }
}

/// Short name of a value's type, for error messages.
pub fn type_name(obj: &Obj) -> String {
    obj.ty()
        .type_data()
        .map(|td| td.name.clone())
        .unwrap_or_else(|| "object".to_string())
}
