//! Ranges and slices
//!
//! `range` is a lazy integer sequence described by `(start, end, step)`.
//! `slice` carries arbitrary `(start, end, step)` objects and is
//! normalized against a concrete target length before use; a zero step is
//! a `ValError`.

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::obj::Obj;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Payload of a `range` value.
pub struct RangeData {
    pub start: BigInt,
    pub end: BigInt,
    pub step: BigInt,
}

impl RangeData {
    pub fn len(&self) -> BigInt {
        if self.step.is_zero() {
            return BigInt::from(0);
        }
        let span = if self.step.is_positive() {
            &self.end - &self.start
        } else {
            &self.start - &self.end
        };
        if span.is_negative() || span.is_zero() {
            return BigInt::from(0);
        }
        let step = self.step.abs();
        (&span + &step - 1) / step
    }

    pub fn is_empty(&self) -> bool {
        self.len().is_zero()
    }

    pub fn contains(&self, v: &BigInt) -> bool {
        if self.step.is_zero() {
            return false;
        }
        let in_bounds = if self.step.is_positive() {
            v >= &self.start && v < &self.end
        } else {
            v <= &self.start && v > &self.end
        };
        in_bounds && ((v - &self.start) % &self.step).is_zero()
    }
}

/// Payload of a `slice` value: unnormalized bounds.
pub struct SliceData {
    pub start: Obj,
    pub end: Obj,
    pub step: Obj,
}

/// A slice normalized against a length: iterate `count` indices starting
/// at `first`, advancing by `delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedSlice {
    pub first: i64,
    pub delta: i64,
    pub count: usize,
}

impl Context {
    /// Normalize a slice's bounds against a sequence of `len` elements.
    pub fn normalize_slice(&mut self, s: &SliceData, len: usize) -> XResult<NormalizedSlice> {
        let len = len as i64;
        let step = match self.slice_part(&s.step.clone())? {
            Some(v) => v,
            None => 1,
        };
        if step == 0 {
            return Err(self.throw(ExcKind::ValError, "Slice step cannot be zero"));
        }

        let clamp = |v: i64, lo: i64, hi: i64| v.max(lo).min(hi);
        let start = match self.slice_part(&s.start.clone())? {
            Some(v) => {
                let v = if v < 0 { v + len } else { v };
                if step > 0 {
                    clamp(v, 0, len)
                } else {
                    clamp(v, -1, len - 1)
                }
            }
            None => {
                if step > 0 {
                    0
                } else {
                    len - 1
                }
            }
        };
        let end = match self.slice_part(&s.end.clone())? {
            Some(v) => {
                let v = if v < 0 { v + len } else { v };
                if step > 0 {
                    clamp(v, 0, len)
                } else {
                    clamp(v, -1, len - 1)
                }
            }
            None => {
                if step > 0 {
                    len
                } else {
                    -1
                }
            }
        };

        let count = if step > 0 {
            if end > start {
                ((end - start + step - 1) / step) as usize
            } else {
                0
            }
        } else if start > end {
            ((start - end + (-step) - 1) / (-step)) as usize
        } else {
            0
        };

        Ok(NormalizedSlice {
            first: start,
            delta: step,
            count,
        })
    }

    /// One slice bound: `none` means "missing", anything else must be an
    /// integer.
    fn slice_part(&mut self, o: &Obj) -> XResult<Option<i64>> {
        if o.is_none() {
            return Ok(None);
        }
        match crate::number::to_index(o) {
            Some(v) => Ok(Some(v)),
            None => {
                let ty = crate::types::type_name(o);
                Err(self.throw(
                    ExcKind::TypeError,
                    format!("Slice bounds must be integers, not '{ty}'"),
                ))
            }
        }
    }

    /// Normalize a signed sequence index: negatives count from the end,
    /// out-of-range throws `IndexError`.
    pub fn normalize_index(&mut self, idx: &Obj, len: usize) -> XResult<usize> {
        let v = match crate::number::to_index(idx) {
            Some(v) => v,
            None => {
                let ty = crate::types::type_name(idx);
                Err(self.throw(
                    ExcKind::TypeError,
                    format!("Sequence index must be an int, not '{ty}'"),
                ))?
            }
        };
        let adjusted = if v < 0 { v + len as i64 } else { v };
        if adjusted < 0 || adjusted >= len as i64 {
            return Err(self.throw(
                ExcKind::IndexError,
                format!("Index {v} out of range for length {len}"),
            ));
        }
        Ok(adjusted as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: i64, end: i64, step: i64) -> RangeData {
        RangeData {
            start: BigInt::from(start),
            end: BigInt::from(end),
            step: BigInt::from(step),
        }
    }

    #[test]
    fn test_range_len() {
        assert_eq!(range(0, 3, 1).len(), BigInt::from(3));
        assert_eq!(range(0, 10, 3).len(), BigInt::from(4));
        assert_eq!(range(3, 0, -1).len(), BigInt::from(3));
        assert_eq!(range(0, 0, 1).len(), BigInt::from(0));
        assert_eq!(range(5, 0, 1).len(), BigInt::from(0));
    }

    #[test]
    fn test_range_contains() {
        let r = range(0, 10, 3);
        assert!(r.contains(&BigInt::from(0)));
        assert!(r.contains(&BigInt::from(9)));
        assert!(!r.contains(&BigInt::from(10)));
        assert!(!r.contains(&BigInt::from(2)));
        let neg = range(10, 0, -2);
        assert!(neg.contains(&BigInt::from(10)));
        assert!(neg.contains(&BigInt::from(2)));
        assert!(!neg.contains(&BigInt::from(0)));
    }
}
