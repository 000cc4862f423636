//! Code objects
//!
//! A code object owns its bytecode buffer and source map, and shares its
//! constant pool with any code objects derived from it (nested function
//! bodies, REPL continuations). Constants are interned on type identity
//! plus value, so `true` and `1` occupy distinct slots.

use crate::obj::{Obj, Payload};
use kestrel_compiler::token::Token;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Interning key: type-distinct value equality, identity for everything
/// that has no value form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    None,
    Bool(bool),
    Int(num_bigint::BigInt),
    Float(u64),
    Complex(u64, u64),
    Str(String),
    Bytes(Vec<u8>),
    Id(usize),
}

impl ConstKey {
    fn of(o: &Obj) -> ConstKey {
        match o.payload() {
            Payload::None => ConstKey::None,
            Payload::Bool(b) => ConstKey::Bool(*b),
            Payload::Int(v) => ConstKey::Int(v.clone()),
            Payload::Float(v) => ConstKey::Float(v.to_bits()),
            Payload::Complex(re, im) => ConstKey::Complex(re.to_bits(), im.to_bits()),
            Payload::Str(s) => ConstKey::Str(s.text.clone()),
            Payload::Bytes(b) => ConstKey::Bytes(b.to_vec()),
            _ => ConstKey::Id(o.id()),
        }
    }
}

/// Constant pool, shared among derived code objects.
pub struct ConstPool {
    items: RefCell<Vec<Obj>>,
    index: RefCell<HashMap<ConstKey, usize>>,
}

impl ConstPool {
    fn new() -> ConstPool {
        ConstPool {
            items: RefCell::new(Vec::new()),
            index: RefCell::new(HashMap::new()),
        }
    }

    /// Intern `o`, returning the index of the existing or new entry.
    pub fn add(&self, o: &Obj) -> usize {
        let key = ConstKey::of(o);
        if let Some(idx) = self.index.borrow().get(&key) {
            return *idx;
        }
        let mut items = self.items.borrow_mut();
        let idx = items.len();
        items.push(o.clone());
        self.index.borrow_mut().insert(key, idx);
        idx
    }

    pub fn get(&self, idx: usize) -> Option<Obj> {
        self.items.borrow().get(idx).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

/// Payload of a `code` value.
pub struct CodeData {
    /// File name the source came from.
    pub fname: Rc<str>,
    /// The source text itself, kept for error excerpts.
    pub src: Rc<str>,
    /// Shared constant pool.
    pub pool: Rc<ConstPool>,
    /// Packed instruction buffer (private to this code object).
    pub bc: RefCell<Vec<u8>>,
    /// Sorted (bytecode offset → source token) records.
    meta: RefCell<Vec<(usize, Token)>>,
}

impl CodeData {
    pub fn new(fname: &str, src: &str) -> CodeData {
        CodeData {
            fname: fname.into(),
            src: src.into(),
            pool: Rc::new(ConstPool::new()),
            bc: RefCell::new(Vec::new()),
            meta: RefCell::new(Vec::new()),
        }
    }

    /// An empty code object sharing this one's file, source, and pool.
    pub fn derived(&self) -> CodeData {
        CodeData {
            fname: self.fname.clone(),
            src: self.src.clone(),
            pool: self.pool.clone(),
            bc: RefCell::new(Vec::new()),
            meta: RefCell::new(Vec::new()),
        }
    }

    /// Current bytecode length (the offset of the next instruction).
    pub fn here(&self) -> usize {
        self.bc.borrow().len()
    }

    /// Emit a bare opcode.
    pub fn emit(&self, op: crate::op::Op) {
        debug_assert!(!op.has_arg(), "{op:?} requires an argument");
        self.bc.borrow_mut().push(op as u8);
    }

    /// Emit an opcode with its 32-bit little-endian immediate.
    pub fn emiti(&self, op: crate::op::Op, arg: i32) {
        debug_assert!(op.has_arg(), "{op:?} takes no argument");
        let mut bc = self.bc.borrow_mut();
        bc.push(op as u8);
        bc.extend_from_slice(&arg.to_le_bytes());
    }

    /// Emit an opcode whose immediate is a constant-pool index.
    pub fn emito(&self, op: crate::op::Op, o: &Obj) {
        let idx = self.pool.add(o);
        self.emiti(op, idx as i32);
    }

    /// Patch a previously emitted immediate at byte offset `pos`.
    pub fn patch(&self, pos: usize, arg: i32) {
        let mut bc = self.bc.borrow_mut();
        bc[pos..pos + 4].copy_from_slice(&arg.to_le_bytes());
    }

    /// Record `tok` as the source of the instruction about to be emitted.
    pub fn mark(&self, tok: Token) {
        let here = self.here();
        let mut meta = self.meta.borrow_mut();
        // Collapse repeated marks at one offset to the latest.
        if let Some(last) = meta.last_mut() {
            if last.0 == here {
                last.1 = tok;
                return;
            }
        }
        meta.push((here, tok));
    }

    /// Source token for the bytecode offset: the smallest record whose
    /// offset is ≥ the query.
    pub fn meta_at(&self, offset: usize) -> Option<Token> {
        let meta = self.meta.borrow();
        let idx = meta.partition_point(|(off, _)| *off < offset);
        meta.get(idx).or_else(|| meta.last()).map(|(_, t)| *t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::op::Op;

    #[test]
    fn test_const_interning_distinguishes_types() {
        let ctx = Context::new();
        let code = CodeData::new("<test>", "");
        let one = ctx.int_i64(1);
        let tru = ctx.bool_(true);
        let one_f = ctx.float(1.0);
        let i1 = code.pool.add(&one);
        let i2 = code.pool.add(&tru);
        let i3 = code.pool.add(&one_f);
        assert_ne!(i1, i2);
        assert_ne!(i1, i3);
        assert_ne!(i2, i3);
        // Re-adding an equal value reuses the slot.
        assert_eq!(code.pool.add(&ctx.int_i64(1)), i1);
        assert_eq!(code.pool.add(&ctx.bool_(true)), i2);
    }

    #[test]
    fn test_emit_packs_little_endian() {
        let code = CodeData::new("<test>", "");
        code.emiti(Op::Push, 0x0102_0304);
        let bc = code.bc.borrow();
        assert_eq!(bc[0], Op::Push as u8);
        assert_eq!(&bc[1..5], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_meta_lookup_smallest_geq() {
        let code = CodeData::new("<test>", "");
        let mk = |line: usize| Token {
            kind: kestrel_compiler::token::TokenKind::Int,
            spos: 0,
            epos: 1,
            sline: line,
            scol: 0,
            eline: line,
            ecol: 1,
        };
        code.mark(mk(0));
        code.emiti(Op::Push, 0);
        code.mark(mk(1));
        code.emiti(Op::Push, 1);
        code.mark(mk(2));
        code.emit(Op::Ret);

        assert_eq!(code.meta_at(0).map(|t| t.sline), Some(0));
        assert_eq!(code.meta_at(1).map(|t| t.sline), Some(1));
        assert_eq!(code.meta_at(5).map(|t| t.sline), Some(1));
        assert_eq!(code.meta_at(10).map(|t| t.sline), Some(2));
        // Past the end resolves to the last record.
        assert_eq!(code.meta_at(100).map(|t| t.sline), Some(2));
    }

    #[test]
    fn test_derived_shares_pool() {
        let ctx = Context::new();
        let outer = CodeData::new("<test>", "");
        let inner = outer.derived();
        let idx = outer.pool.add(&ctx.str_("shared"));
        assert_eq!(inner.pool.add(&ctx.str_("shared")), idx);
        assert_eq!(outer.fname, inner.fname);
    }
}
