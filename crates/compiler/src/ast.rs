//! Abstract syntax tree for Kestrel
//!
//! Nodes carry a kind tag, a list of child nodes, and the spanning token.
//! Literal payloads stay in compiler-side form (`Lit`); the bytecode
//! compiler materializes runtime values from them.

use crate::token::Token;
use num_bigint::BigInt;

/// Literal payloads attached to `AstKind::Const` nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    /// Arbitrary-precision integer literal.
    Int(BigInt),
    /// Float literal.
    Float(f64),
    /// Imaginary float literal (`1.5i`).
    Imag(f64),
    /// String literal: raw body text, escapes not yet processed.
    Str { raw: String },
    /// Regex literal: raw body text between the backticks.
    Regex { raw: String },
}

/// A comparison operator inside a rich-comparison chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eeq,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Binary operators (including the augmented-assignment forms, which the
/// compiler lowers to the base operator plus a store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    AIor,
    AXor,
    AAnd,
    ALsh,
    ARsh,
    AAdd,
    ASub,
    AMul,
    ADiv,
    AFloordiv,
    AMod,
    APow,

    Coalesce,
    Or,
    And,
    In,

    Ior,
    Xor,
    Band,
    Lsh,
    Rsh,
    Add,
    Sub,
    Mul,
    Div,
    Floordiv,
    Mod,
    Pow,
}

impl BinOp {
    /// For an augmented assignment, the underlying operator.
    pub fn augmented_base(self) -> Option<BinOp> {
        match self {
            BinOp::AIor => Some(BinOp::Ior),
            BinOp::AXor => Some(BinOp::Xor),
            BinOp::AAnd => Some(BinOp::Band),
            BinOp::ALsh => Some(BinOp::Lsh),
            BinOp::ARsh => Some(BinOp::Rsh),
            BinOp::AAdd => Some(BinOp::Add),
            BinOp::ASub => Some(BinOp::Sub),
            BinOp::AMul => Some(BinOp::Mul),
            BinOp::ADiv => Some(BinOp::Div),
            BinOp::AFloordiv => Some(BinOp::Floordiv),
            BinOp::AMod => Some(BinOp::Mod),
            BinOp::APow => Some(BinOp::Pow),
            _ => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Pos,
    Neg,
    Sqig,
    Not,
    PreInc,
    PostInc,
    PreDec,
    PostDec,
}

/// A function parameter: name, optional default, variadic marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Ast>,
    pub variadic: bool,
}

/// One `catch` clause of a `try`.
///
/// `ty` is `None` for catch-all clauses; `name` binds the caught exception.
/// A bare `catch name { .. }` is a catch-all with a binding; naming a type
/// by a bare identifier requires parentheses (`catch (Error) { .. }`) or
/// an `as` binding (`catch Error as e { .. }`).
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub ty: Option<Ast>,
    pub name: Option<String>,
    pub body: Ast,
}

/// Node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    /// Constant expression; the literal is the payload.
    Const(Lit),
    /// Name/identifier.
    Name(String),

    /// `[a, b, ...]`: args are the elements.
    ListDisplay,
    /// `(a, b, ...)`: args are the elements.
    TupleDisplay,
    /// `{a, b, ...}`: args are the elements.
    SetDisplay,
    /// `{k: v, ...}`: args alternate key, value.
    DictDisplay,
    /// Subscript slice `a[start:end:step]`: args = [start, end, step], with
    /// omitted parts parsed as the name `none`.
    SliceDisplay,

    /// Call: args = [callee, call args...].
    Call,
    /// Attribute access: args = [object].
    Attr(String),
    /// Element access: args = [object, indices...].
    Elem,
    /// Conditional expression `a if b else c`: args = [cond, iftrue, iffalse].
    Cond,
    /// Rich comparison chain: args are the operands, ops has len(args)-1.
    RichCmp(Vec<CmpOp>),

    /// Function definition: args = [body]. Defaults live in the params.
    /// An empty name means the function is anonymous.
    FuncDef { name: String, params: Vec<Param> },
    /// Type definition: args = [base, body]. An omitted `extends` clause
    /// parses as the name `object`.
    TypeDef { name: String },

    /// `import a.b.c as d`.
    Import { name: String, alias: Option<String> },

    /// `cont`.
    Cont,
    /// `break`.
    Break,
    /// `ret expr?`: args = [] or [expr].
    Ret,
    /// `throw expr`: args = [expr].
    Throw,
    /// `assert expr`: args = [expr].
    Assert,
    /// `del obj[idx]`: args = [object, indices...].
    Del,

    /// Block of statements.
    Block,
    /// `if`: args = [cond, then] or [cond, then, else]. `elif` chains fold
    /// into the else branch.
    If,
    /// `while`: args = [cond, body] or [cond, body, else].
    While,
    /// `for var in iter`: args = [iter, body] or [iter, body, else].
    For { var: String },
    /// `try`: args = [body]; clauses carry their own bodies.
    Try {
        catches: Vec<CatchClause>,
        finally: Option<Box<Ast>>,
    },

    /// Binary operation: args = [lhs, rhs].
    Binary(BinOp),
    /// Unary operation: args = [operand].
    Unary(UnOp),
}

/// An AST node.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub kind: AstKind,
    pub args: Vec<Ast>,
    /// Token spanning the source this node came from.
    pub tok: Token,
}

impl Ast {
    pub fn new(kind: AstKind, args: Vec<Ast>, tok: Token) -> Self {
        Ast { kind, args, tok }
    }

    /// Whether this node is an expression (has a value), as opposed to a
    /// statement. Drives result printing in the REPL and `-e`.
    pub fn is_expr(&self) -> bool {
        match &self.kind {
            AstKind::Const(_)
            | AstKind::Name(_)
            | AstKind::ListDisplay
            | AstKind::TupleDisplay
            | AstKind::SetDisplay
            | AstKind::DictDisplay
            | AstKind::Call
            | AstKind::Attr(_)
            | AstKind::Elem
            | AstKind::SliceDisplay
            | AstKind::Cond
            | AstKind::RichCmp(_)
            | AstKind::Unary(_) => true,
            // A named definition is a binding statement; only anonymous
            // functions act as expressions.
            AstKind::FuncDef { name, .. } => name.is_empty(),
            // Assignments are expressions, but echoing their value back at
            // the prompt is noise, so they count as statements here.
            AstKind::Binary(BinOp::Assign) => false,
            AstKind::Binary(op) => op.augmented_base().is_none(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_augmented_base() {
        assert_eq!(BinOp::AAdd.augmented_base(), Some(BinOp::Add));
        assert_eq!(BinOp::APow.augmented_base(), Some(BinOp::Pow));
        assert_eq!(BinOp::Add.augmented_base(), None);
        assert_eq!(BinOp::Assign.augmented_base(), None);
    }

    #[test]
    fn test_is_expr() {
        let t = Token::empty();
        let one = Ast::new(AstKind::Const(Lit::Int(BigInt::from(1))), vec![], t);
        assert!(one.is_expr());

        let name = Ast::new(AstKind::Name("x".into()), vec![], t);
        let assign = Ast::new(
            AstKind::Binary(BinOp::Assign),
            vec![name.clone(), one.clone()],
            t,
        );
        assert!(!assign.is_expr());

        let add = Ast::new(AstKind::Binary(BinOp::Add), vec![name, one], t);
        assert!(add.is_expr());

        let ret = Ast::new(AstKind::Ret, vec![], t);
        assert!(!ret.is_expr());
    }
}
