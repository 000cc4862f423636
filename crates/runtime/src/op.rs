//! Bytecode opcodes
//!
//! Instructions come in two shapes: a bare opcode byte, or an opcode byte
//! followed by a signed 32-bit little-endian immediate (a packed 5-byte
//! record). Jump immediates are relative to the byte after the immediate.
//!
//! `vc` below refers to the owning code object's constant pool, `stk` to
//! the operand stack.

use num_enum::TryFromPrimitive;

/// One-byte opcodes. Binary operators start at 50, unary at 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Op {
    /// Do nothing.
    Noop = 0,
    /// `push idx`: push `vc[idx]`.
    Push,
    /// Pop (and release) the top of `stk`.
    Popu,
    /// Duplicate the top of `stk`.
    Dup,

    /// `load idx`: look up the name `vc[idx]` and push the result.
    Load,
    /// `store idx`: store the top of `stk` (without popping) as `vc[idx]`.
    Store,

    /// `getattr idx`: pop an object, push its attribute `vc[idx]`.
    Getattr,
    /// `setattr idx`: pop value and object, set the attribute, push value.
    Setattr,
    /// `getelems n`: pop n indices and an object, push the element.
    Getelems,
    /// `setelems n`: pop value, n indices, and an object; assign; push value.
    Setelems,
    /// `delelems n`: pop n indices and an object, delete the element.
    Delelems,

    /// `call n`: pop n items (callable at the bottom), push the result.
    Call,
    /// Pop a tuple of arguments and a callable, push the result.
    Callv,

    /// `list n`: pop n items, push a list of them.
    List,
    /// `list_pushn n`: pop n items, append them to the list below.
    ListPushn,
    /// Pop an iterable, extend the list below with its elements.
    ListPushi,
    /// `tuple n`.
    Tuple,
    /// `tuple_pushn n` (operates on a list under construction).
    TuplePushn,
    /// Like `list_pushi` for tuples under construction.
    TuplePushi,
    /// `set n`.
    Set,
    /// `set_pushn n`.
    SetPushn,
    /// Like `list_pushi` for sets.
    SetPushi,
    /// `dict n`: pop n key/value pairs, push a dict preserving order.
    Dict,
    /// Pop step, end, start; push a slice.
    Slice,

    /// `func idx`: build a function from the template `vc[idx]`, closing
    /// over the current frame.
    Func,
    /// `func_defa n`: pop n default values into the function below.
    FuncDefa,
    /// `type idx`: pop a base type, build a new type from `vc[idx]`.
    Type,

    /// `jmp off`.
    Jmp,
    /// `jmpt off`: pop, jump if truthy.
    Jmpt,
    /// `jmpf off`: pop, jump if falsy.
    Jmpf,
    /// Pop the return value and leave the frame.
    Ret,
    /// Pop an exception (or exception type) and throw it.
    Throw,

    /// Replace the top of `stk` with an iterator over it.
    ForStart,
    /// `for_nextt off`: push the next value and jump; on exhaustion pop
    /// the iterator and fall through.
    ForNextt,
    /// `for_nextf off`: push the next value and fall through; on
    /// exhaustion pop the iterator and jump.
    ForNextf,

    /// `try_start off`: record a handler at `off` with the current stack
    /// depth.
    TryStart,
    /// `try_catch off`: pop a type; if the pending exception matches,
    /// catch it (push it) and fall through, else jump.
    TryCatch,
    /// Catch the pending exception unconditionally and push it.
    TryCatchAll,
    /// `try_end off`: leave the protected region, jump to `off`.
    TryEnd,
    /// Pop a stashed exception; rethrow it unless it is `none`.
    FinallyEnd,

    // Binary operators: pop rhs then lhs, push the result.
    BopIn = 50,
    BopEeq,
    BopEq,
    BopNe,
    BopLt,
    BopLe,
    BopGt,
    BopGe,
    BopIor,
    BopXor,
    BopAnd,
    BopLsh,
    BopRsh,
    BopAdd,
    BopSub,
    BopMul,
    BopDiv,
    BopFloordiv,
    BopMod,
    BopPow,

    // Unary operators: pop the operand, push the result.
    UopPos = 100,
    UopNeg,
    UopSqig,
    UopNot,
}

impl Op {
    /// Whether this opcode carries a 32-bit immediate.
    pub fn has_arg(self) -> bool {
        matches!(
            self,
            Op::Push
                | Op::Load
                | Op::Store
                | Op::Getattr
                | Op::Setattr
                | Op::Getelems
                | Op::Setelems
                | Op::Delelems
                | Op::Call
                | Op::List
                | Op::ListPushn
                | Op::Tuple
                | Op::TuplePushn
                | Op::Set
                | Op::SetPushn
                | Op::Dict
                | Op::Func
                | Op::FuncDefa
                | Op::Type
                | Op::Jmp
                | Op::Jmpt
                | Op::Jmpf
                | Op::ForNextt
                | Op::ForNextf
                | Op::TryStart
                | Op::TryCatch
                | Op::TryEnd
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_numbering() {
        assert_eq!(Op::Noop as u8, 0);
        assert_eq!(Op::BopIn as u8, 50);
        assert_eq!(Op::UopPos as u8, 100);
    }

    #[test]
    fn test_round_trip_from_byte() {
        for b in 0u8..=110 {
            if let Ok(op) = Op::try_from(b) {
                assert_eq!(op as u8, b);
            }
        }
        assert!(Op::try_from(255u8).is_err());
    }

    #[test]
    fn test_arg_carriers() {
        assert!(Op::Push.has_arg());
        assert!(Op::Jmp.has_arg());
        assert!(Op::TryStart.has_arg());
        assert!(!Op::Ret.has_arg());
        assert!(!Op::BopAdd.has_arg());
        assert!(!Op::Dup.has_arg());
    }
}
