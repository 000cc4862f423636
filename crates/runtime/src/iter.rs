//! Iteration protocol
//!
//! `iter` turns a container into an iterator value; `next` steps it.
//! Builtin containers iterate natively; user types go through the
//! `__iter`/`__next` slots, with `OutOfIterError` signaling exhaustion.
//! Internally exhaustion is an `Option`, and only the user-facing `next`
//! turns it into the exception.

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::obj::{Obj, Payload, isinst};
use crate::types::{slot_lookup, type_name};
use num_bigint::BigInt;
use num_traits::Signed;
use std::cell::RefCell;

/// State of a builtin iterator value.
pub enum IterData {
    /// Positional iteration over list/tuple/bytes.
    Seq { target: Obj, idx: usize },
    /// Codepoint iteration over a string, tracked by byte offset.
    Str { target: Obj, byte: usize },
    /// Insertion-order iteration over dict/set entries (yields keys).
    Entries { target: Obj, idx: usize },
    /// Lazy integer sequence.
    Range { cur: BigInt, end: BigInt, step: BigInt },
}

impl Context {
    /// The iterator for a value (the `iter` operation).
    pub fn iter_of(&mut self, o: &Obj) -> XResult<Obj> {
        let data = match o.payload() {
            Payload::Iter(_) => return Ok(o.clone()),
            Payload::List(_) | Payload::Tuple(_) | Payload::Bytes(_) => IterData::Seq {
                target: o.clone(),
                idx: 0,
            },
            Payload::Str(_) => IterData::Str {
                target: o.clone(),
                byte: 0,
            },
            Payload::Dict(_) | Payload::Set(_) => IterData::Entries {
                target: o.clone(),
                idx: 0,
            },
            Payload::Range(r) => IterData::Range {
                cur: r.start.clone(),
                end: r.end.clone(),
                step: r.step.clone(),
            },
            _ => {
                if let Some(slot) = slot_lookup(o.ty(), |s| s.iter.clone()) {
                    return self.call_obj(slot, vec![o.clone()]);
                }
                let ty = type_name(o);
                return Err(self.throw(
                    ExcKind::TypeError,
                    format!("'{ty}' object is not iterable"),
                ));
            }
        };
        Ok(Obj::new(
            &self.types.iter,
            Payload::Iter(RefCell::new(data)),
            false,
        ))
    }

    /// Step an iterator. `Ok(None)` means exhausted.
    pub fn iter_next(&mut self, it: &Obj) -> XResult<Option<Obj>> {
        if let Payload::Iter(state) = it.payload() {
            let mut state = state.borrow_mut();
            return Ok(match &mut *state {
                IterData::Seq { target, idx } => {
                    let v = match target.payload() {
                        Payload::List(items) => items.borrow().get(*idx).cloned(),
                        Payload::Tuple(items) => items.get(*idx).cloned(),
                        Payload::Bytes(b) => {
                            b.get(*idx).map(|byte| self.int_i64(*byte as i64))
                        }
                        _ => None,
                    };
                    if v.is_some() {
                        *idx += 1;
                    }
                    v
                }
                IterData::Str { target, byte } => match target.as_str() {
                    Some(text) => match text[*byte..].chars().next() {
                        Some(c) => {
                            *byte += c.len_utf8();
                            Some(self.str_(c.to_string()))
                        }
                        None => None,
                    },
                    None => None,
                },
                IterData::Entries { target, idx } => {
                    let cell = target.as_dict().or_else(|| target.as_set());
                    match cell.and_then(|c| c.borrow().next_entry(*idx)) {
                        Some((next, key, _)) => {
                            *idx = next;
                            Some(key)
                        }
                        None => None,
                    }
                }
                IterData::Range { cur, end, step } => {
                    let more = if step.is_positive() {
                        &*cur < &*end
                    } else {
                        &*cur > &*end
                    };
                    if more {
                        let v = cur.clone();
                        *cur += &*step;
                        Some(self.int_from(v))
                    } else {
                        None
                    }
                }
            });
        }

        // User iterator: `__next` throws OutOfIterError when exhausted.
        if let Some(slot) = slot_lookup(it.ty(), |s| s.next.clone()) {
            return match self.call_obj(slot, vec![it.clone()]) {
                Ok(v) => Ok(Some(v)),
                Err(t) => {
                    let out_of_iter = self.types.exc_type(ExcKind::OutOfIter).clone();
                    let exhausted = self
                        .thread
                        .exc
                        .as_ref()
                        .map(|e| isinst(e, &out_of_iter))
                        .unwrap_or(false);
                    if exhausted {
                        self.thread.exc = None;
                        Ok(None)
                    } else {
                        Err(t)
                    }
                }
            };
        }

        let ty = type_name(it);
        Err(self.throw(
            ExcKind::TypeError,
            format!("'{ty}' object is not an iterator"),
        ))
    }

    /// Collect every element of an iterable into a vector.
    pub fn iter_collect(&mut self, o: &Obj) -> XResult<Vec<Obj>> {
        let it = self.iter_of(o)?;
        let mut out = Vec::new();
        while let Some(v) = self.iter_next(&it)? {
            out.push(v);
        }
        Ok(out)
    }
}
