//! Execution context
//!
//! A [`Context`] is the explicit handle passed into every interpreter
//! operation: it owns the type registry, the builtins and interpreter
//! variable mappings, the module cache, the search path, and the thread
//! state. Exclusive access to the context (`&mut Context`) is what the
//! interpreter lock means here: bytecode only executes, and the object
//! graph is only mutated, through it. Parallel interpreters are separate
//! contexts, one per OS thread, which is also how tests isolate.

use crate::dict::DictData;
use crate::exc::{ExcKind, XResult};
use crate::func::{FuncData, FuncKind, NativeFn};
use crate::obj::{Obj, Payload};
use crate::string::StrData;
use crate::types::Types;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Per-call execution state.
pub struct Frame {
    /// The callable being executed.
    pub callable: Obj,
    /// Arguments the call received.
    pub args: Vec<Obj>,
    /// Local-variable mapping (a dict object), absent for native frames.
    pub locals: Option<Obj>,
    /// Closure pointer to the frame of the defining function.
    pub closure: Option<Rc<RefCell<Frame>>>,
    /// Module-level globals mapping for name fallback.
    pub globals: Option<Obj>,
    /// Current program counter (byte offset into the bytecode).
    pub pc: usize,
}

/// Per-thread interpreter state.
pub struct Thread {
    pub name: String,
    /// Pending exception; non-null means callers must propagate failure.
    pub exc: Option<Obj>,
    /// Frame stack, innermost last.
    pub frames: Vec<Rc<RefCell<Frame>>>,
    /// Operand stack shared by the frames on this thread.
    pub stack: Vec<Obj>,
    /// Values currently being repr'd, to elide recursive containers.
    pub inrepr: Vec<Obj>,
}

impl Thread {
    fn new(name: impl Into<String>) -> Thread {
        Thread {
            name: name.into(),
            exc: None,
            frames: Vec::new(),
            stack: Vec::new(),
            inrepr: Vec::new(),
        }
    }
}

/// The interpreter.
pub struct Context {
    pub types: Types,
    none_v: Obj,
    true_v: Obj,
    false_v: Obj,
    /// Sentinel returned by operator slots to defer to the other operand.
    undefined_v: Obj,
    /// Process-wide builtin names (a dict object).
    pub builtins: Obj,
    /// Interpreter variables used by the REPL and `-e`/`-c`.
    pub inter_vars: Obj,
    /// Module cache keyed by fully qualified name.
    pub modules: HashMap<String, Obj>,
    /// Module search path.
    pub path: Vec<PathBuf>,
    pub thread: Thread,
}

impl Context {
    /// Build a fresh interpreter: type registry, singletons, builtins,
    /// and the module search path from `KS_PATH`.
    pub fn new() -> Context {
        let types = Types::new();
        let none_v = Obj::new(&types.none, Payload::None, false);
        let true_v = Obj::new(&types.bool_, Payload::Bool(true), false);
        let false_v = Obj::new(&types.bool_, Payload::Bool(false), false);
        let undefined_v = Obj::new(&types.object, Payload::None, false);
        let builtins = Obj::new(&types.dict, Payload::Dict(RefCell::new(DictData::new())), false);
        let inter_vars = Obj::new(&types.dict, Payload::Dict(RefCell::new(DictData::new())), false);

        let mut path = Vec::new();
        if let Ok(ks_path) = std::env::var("KS_PATH") {
            for part in ks_path.split(':').filter(|p| !p.is_empty()) {
                path.push(PathBuf::from(part));
            }
        }
        path.push(PathBuf::from("."));

        let mut ctx = Context {
            types,
            none_v,
            true_v,
            false_v,
            undefined_v,
            builtins,
            inter_vars,
            modules: HashMap::new(),
            path,
            thread: Thread::new("main"),
        };
        crate::builtins::install(&mut ctx);
        ctx
    }

    // ---- singletons and constructors ----

    pub fn none(&self) -> Obj {
        self.none_v.clone()
    }

    pub fn bool_(&self, v: bool) -> Obj {
        if v { self.true_v.clone() } else { self.false_v.clone() }
    }

    /// The defer sentinel used by binary-operator dispatch.
    pub fn undefined(&self) -> Obj {
        self.undefined_v.clone()
    }

    pub fn is_undefined(&self, o: &Obj) -> bool {
        o.is(&self.undefined_v)
    }

    pub fn int_from(&self, v: num_bigint::BigInt) -> Obj {
        Obj::new(&self.types.int, Payload::Int(v), false)
    }

    pub fn int_i64(&self, v: i64) -> Obj {
        self.int_from(num_bigint::BigInt::from(v))
    }

    pub fn float(&self, v: f64) -> Obj {
        Obj::new(&self.types.float, Payload::Float(v), false)
    }

    pub fn complex(&self, re: f64, im: f64) -> Obj {
        Obj::new(&self.types.complex, Payload::Complex(re, im), false)
    }

    pub fn str_(&self, v: impl Into<String>) -> Obj {
        Obj::new(&self.types.str_, Payload::Str(StrData::new(v.into())), false)
    }

    pub fn bytes(&self, v: Vec<u8>) -> Obj {
        Obj::new(&self.types.bytes, Payload::Bytes(v.into_boxed_slice()), false)
    }

    pub fn list(&self, v: Vec<Obj>) -> Obj {
        Obj::new(&self.types.list, Payload::List(RefCell::new(v)), false)
    }

    pub fn tuple(&self, v: Vec<Obj>) -> Obj {
        Obj::new(&self.types.tuple, Payload::Tuple(v.into_boxed_slice()), false)
    }

    pub fn new_dict(&self) -> Obj {
        Obj::new(
            &self.types.dict,
            Payload::Dict(RefCell::new(DictData::new())),
            false,
        )
    }

    pub fn new_set(&self) -> Obj {
        Obj::new(
            &self.types.set,
            Payload::Set(RefCell::new(DictData::new())),
            false,
        )
    }

    /// Wrap a native function as a callable `func` value.
    pub fn native_func(&self, name: &str, f: NativeFn) -> Obj {
        Obj::new(
            &self.types.func,
            Payload::Func(FuncData {
                name: name.to_string(),
                kind: FuncKind::Native(f),
            }),
            false,
        )
    }

    // ---- dict-object helpers ----

    /// `d[key]`, or `None` when absent. `d` must be a dict or set object.
    pub fn dict_get(&mut self, d: &Obj, key: &Obj) -> XResult<Option<Obj>> {
        let hash = self.obj_hash(key)?;
        let cell = d
            .as_dict()
            .or_else(|| d.as_set())
            .ok_or_else(|| self.throw(ExcKind::InternalError, "expected a mapping"))?;
        Ok(cell.borrow().get(hash, key))
    }

    pub fn dict_set(&mut self, d: &Obj, key: Obj, val: Obj) -> XResult<()> {
        let hash = self.obj_hash(&key)?;
        let cell = d
            .as_dict()
            .or_else(|| d.as_set())
            .ok_or_else(|| self.throw(ExcKind::InternalError, "expected a mapping"))?;
        cell.borrow_mut().insert(hash, key, val);
        Ok(())
    }

    pub fn dict_remove(&mut self, d: &Obj, key: &Obj) -> XResult<Option<Obj>> {
        let hash = self.obj_hash(key)?;
        let cell = d
            .as_dict()
            .or_else(|| d.as_set())
            .ok_or_else(|| self.throw(ExcKind::InternalError, "expected a mapping"))?;
        Ok(cell.borrow_mut().remove(hash, key))
    }

    /// Set a string-keyed entry on a dict object.
    pub fn dict_set_str(&mut self, d: &Obj, name: &str, val: Obj) -> XResult<()> {
        let key = self.str_(name);
        self.dict_set(d, key, val)
    }

    /// Get a string-keyed entry from a dict object without dispatch.
    pub fn dict_get_str(&self, d: &Obj, name: &str) -> Option<Obj> {
        d.as_dict()
            .or_else(|| d.as_set())
            .and_then(|cell| cell.borrow().get_str(name))
    }

    // ---- frame helpers ----

    pub fn push_frame(&mut self, frame: Frame) -> XResult<Rc<RefCell<Frame>>> {
        // Bound the interpreter stack; native recursion tracks it.
        if self.thread.frames.len() >= 1000 {
            return Err(self.throw(ExcKind::InternalError, "Maximum call depth exceeded"));
        }
        let rc = Rc::new(RefCell::new(frame));
        self.thread.frames.push(rc.clone());
        Ok(rc)
    }

    pub fn pop_frame(&mut self) {
        self.thread.frames.pop();
    }

    // ---- operand stack helpers ----

    pub fn push(&mut self, v: Obj) {
        self.thread.stack.push(v);
    }

    pub fn pop(&mut self) -> XResult<Obj> {
        match self.thread.stack.pop() {
            Some(v) => Ok(v),
            None => Err(self.throw(ExcKind::InternalError, "Operand stack underflow")),
        }
    }

    pub fn peek(&mut self) -> XResult<Obj> {
        match self.thread.stack.last() {
            Some(v) => Ok(v.clone()),
            None => Err(self.throw(ExcKind::InternalError, "Operand stack underflow")),
        }
    }

    /// Pop `n` values, returning them in stack order (bottom first).
    pub fn pop_n(&mut self, n: usize) -> XResult<Vec<Obj>> {
        if self.thread.stack.len() < n {
            return Err(self.throw(ExcKind::InternalError, "Operand stack underflow"));
        }
        let at = self.thread.stack.len() - n;
        Ok(self.thread.stack.split_off(at))
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
