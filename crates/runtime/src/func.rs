//! Callables
//!
//! A `func` either wraps a native function or carries bytecode with
//! positional parameters, per-parameter defaults, and an optional
//! variadic index. A `partial` wraps another callable with a sparse map
//! of pre-bound argument positions; bound methods are partials with the
//! instance at position 0.

use crate::context::{Context, Frame};
use crate::exc::{ExcKind, XResult};
use crate::obj::Obj;
use std::cell::RefCell;
use std::rc::Rc;

/// A native callable.
pub type NativeFn = fn(&mut Context, &[Obj]) -> XResult<Obj>;

/// Payload of a `func` value.
pub struct FuncData {
    pub name: String,
    pub kind: FuncKind,
}

pub enum FuncKind {
    Native(NativeFn),
    Bytecode(BFunc),
}

impl FuncData {
    pub fn bytecode(&self) -> Option<&BFunc> {
        match &self.kind {
            FuncKind::Bytecode(bf) => Some(bf),
            FuncKind::Native(_) => None,
        }
    }
}

/// A bytecode callable.
pub struct BFunc {
    /// The compiled body (a `code` value).
    pub code: Obj,
    /// Positional parameter names.
    pub params: Vec<String>,
    /// Per-parameter defaults, filled in by `func_defa` at definition
    /// time. Always the same length as `params`.
    pub defaults: RefCell<Vec<Option<Obj>>>,
    /// Index of the variadic parameter, which collects extra positional
    /// arguments as a tuple.
    pub vararg_idx: Option<usize>,
    /// Frame of the defining function, for closure name lookups.
    pub closure: Option<Rc<RefCell<Frame>>>,
    /// Module globals captured at definition time.
    pub globals: Obj,
}

impl BFunc {
    /// Set the trailing defaults (the last `n` non-variadic parameters),
    /// leftmost default first.
    pub fn set_defaults(&self, values: Vec<Obj>) {
        let mut defaults = self.defaults.borrow_mut();
        let fixed = self.vararg_idx.unwrap_or(self.params.len());
        let n = values.len().min(fixed);
        let start = fixed - n;
        for (i, v) in values.into_iter().take(n).enumerate() {
            defaults[start + i] = Some(v);
        }
    }

    /// Number of leading parameters a call must supply.
    pub fn required(&self) -> usize {
        let fixed = self.vararg_idx.unwrap_or(self.params.len());
        let defaults = self.defaults.borrow();
        let mut req = fixed;
        while req > 0 && defaults[req - 1].is_some() {
            req -= 1;
        }
        req
    }
}

/// Payload of a `partial` value: a callable with pre-bound positions.
pub struct PartialData {
    pub of: Obj,
    /// `(position, value)` pairs, sorted by position.
    pub args: Vec<(usize, Obj)>,
}

impl PartialData {
    /// Merge the pre-bound values into `args`, producing the final
    /// positional argument list.
    pub fn merge(&self, args: Vec<Obj>) -> Vec<Obj> {
        let mut out: Vec<Option<Obj>> = Vec::with_capacity(args.len() + self.args.len());
        let mut rest = args.into_iter();
        let total = self.args.len() + rest.len();
        for pos in 0..total {
            if let Some((_, v)) = self.args.iter().find(|(p, _)| *p == pos) {
                out.push(Some(v.clone()));
            } else {
                out.push(rest.next());
            }
        }
        out.into_iter().flatten().collect()
    }
}

impl Context {
    /// Bind a call's arguments to a bytecode function's parameters,
    /// producing the frame's locals mapping.
    ///
    /// Missing arguments take their defaults; too few without defaults is
    /// an `ArgError`. Extra positional arguments pack into the variadic
    /// tuple when declared, otherwise throw.
    pub fn bind_args(&mut self, name: &str, bf: &BFunc, args: Vec<Obj>) -> XResult<Obj> {
        let fixed = bf.vararg_idx.unwrap_or(bf.params.len());
        let required = bf.required();

        if args.len() < required {
            return Err(self.throw(
                ExcKind::ArgError,
                format!(
                    "{}() requires at least {} argument{}, got {}",
                    name,
                    required,
                    if required == 1 { "" } else { "s" },
                    args.len()
                ),
            ));
        }
        if bf.vararg_idx.is_none() && args.len() > fixed {
            return Err(self.throw(
                ExcKind::ArgError,
                format!(
                    "{}() takes at most {} argument{}, got {}",
                    name,
                    fixed,
                    if fixed == 1 { "" } else { "s" },
                    args.len()
                ),
            ));
        }

        let locals = self.new_dict();
        let mut args = args;
        let extra = if args.len() > fixed {
            args.split_off(fixed)
        } else {
            Vec::new()
        };

        for (i, pname) in bf.params.iter().take(fixed).enumerate() {
            let val = if i < args.len() {
                args[i].clone()
            } else {
                match &bf.defaults.borrow()[i] {
                    Some(d) => d.clone(),
                    None => {
                        return Err(self.throw(
                            ExcKind::ArgError,
                            format!("{}() missing argument '{}'", name, pname),
                        ));
                    }
                }
            };
            self.dict_set_str(&locals, pname, val)?;
        }
        if let Some(vidx) = bf.vararg_idx {
            let vtuple = self.tuple(extra);
            let vname = bf.params[vidx].clone();
            self.dict_set_str(&locals, &vname, vtuple)?;
        }
        Ok(locals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_merge_front() {
        let ctx = Context::new();
        let f = ctx.none();
        let bound = ctx.int_i64(42);
        let p = PartialData {
            of: f,
            args: vec![(0, bound)],
        };
        let a = ctx.int_i64(1);
        let b = ctx.int_i64(2);
        let merged = p.merge(vec![a, b]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].as_int().map(|v| v.to_string()), Some("42".into()));
        assert_eq!(merged[1].as_int().map(|v| v.to_string()), Some("1".into()));
        assert_eq!(merged[2].as_int().map(|v| v.to_string()), Some("2".into()));
    }

    #[test]
    fn test_partial_merge_sparse() {
        let ctx = Context::new();
        let p = PartialData {
            of: ctx.none(),
            args: vec![(1, ctx.int_i64(9))],
        };
        let merged = p.merge(vec![ctx.int_i64(0), ctx.int_i64(2)]);
        let as_nums: Vec<String> = merged
            .iter()
            .map(|o| o.as_int().map(|v| v.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(as_nums, vec!["0", "9", "2"]);
    }
}
