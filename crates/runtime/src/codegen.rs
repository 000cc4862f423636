//! AST → bytecode
//!
//! The compiler walks the tree depth-first. Every expression form leaves
//! exactly one value on the operand stack; every statement form leaves
//! the stack depth unchanged, popping surplus values as it goes. The
//! final act for a program is a push-none and a return.
//!
//! Short-circuit operators, comparison chains, and augmented assignment
//! on element targets lower through dup/jump sequences and hidden
//! frame-local temporaries (`~t<n>`, unreachable from source names).

use crate::code::CodeData;
use crate::context::Context;
use crate::exc::{ExcKind, Throw, XResult};
use crate::obj::{Obj, Payload};
use crate::op::Op;
use crate::string::{RegexData, unescape};
use kestrel_compiler::ast::{Ast, AstKind, BinOp, CmpOp, Lit, Param, UnOp};
use kestrel_compiler::diag::render_excerpt;
use kestrel_compiler::token::Token;

/// Displays longer than this build through `*_pushn` chunks.
const DISPLAY_CHUNK: usize = 64;

/// Compile a parsed program into a code object. With `from`, the new
/// code object shares the existing one's constant pool.
pub fn compile(
    ctx: &mut Context,
    fname: &str,
    src: &str,
    prog: &Ast,
    from: Option<&Obj>,
) -> XResult<Obj> {
    let data = match from {
        Some(f) => match f.as_code() {
            Some(cd) => cd.derived(),
            None => {
                return Err(ctx.throw(ExcKind::InternalError, "Expected a code object"));
            }
        },
        None => CodeData::new(fname, src),
    };
    let code = Obj::new(&ctx.types.code, Payload::Code(data), false);
    let mut c = Compiler {
        ctx,
        code: code.clone(),
        loops: Vec::new(),
        temps: 0,
        try_depth: 0,
    };
    c.stmt(prog)?;
    c.finish();
    Ok(code)
}

/// Tracks one enclosing loop during compilation.
struct LoopCtx {
    /// Jump target for `cont`.
    head: usize,
    /// Break jump immediates still to patch.
    breaks: Vec<usize>,
    /// A `for` loop keeps its iterator on the stack; `break` pops it.
    is_for: bool,
    /// Open `try` regions when the loop began; leaving the loop from a
    /// deeper nesting must close the difference.
    try_depth: usize,
}

struct Compiler<'c> {
    ctx: &'c mut Context,
    code: Obj,
    loops: Vec<LoopCtx>,
    temps: usize,
    /// Open `try` regions at the current emission point.
    try_depth: usize,
}

impl<'c> Compiler<'c> {
    // ---- emission helpers ----

    fn with_code<R>(&self, f: impl FnOnce(&CodeData) -> R) -> R {
        f(self.code.as_code().expect("code payload"))
    }

    fn emit(&self, op: Op) {
        self.with_code(|c| c.emit(op));
    }

    fn emiti(&self, op: Op, arg: i32) {
        self.with_code(|c| c.emiti(op, arg));
    }

    fn emito(&self, op: Op, o: &Obj) {
        self.with_code(|c| c.emito(op, o));
    }

    fn here(&self) -> usize {
        self.with_code(|c| c.here())
    }

    fn mark(&self, tok: Token) {
        self.with_code(|c| c.mark(tok));
    }

    /// Emit a jump with a placeholder immediate; returns the immediate's
    /// byte position for patching.
    fn jump_fwd(&self, op: Op) -> usize {
        self.emiti(op, 0);
        self.here() - 4
    }

    /// Patch a forward jump to land at the current position. Offsets are
    /// relative to the byte after the immediate.
    fn patch_here(&self, pos: usize) {
        let target = self.here();
        self.with_code(|c| c.patch(pos, (target as i64 - (pos as i64 + 4)) as i32));
    }

    /// Emit a backward jump to `target`.
    fn jump_back(&self, op: Op, target: usize) {
        let after = self.here() + 5;
        self.emiti(op, (target as i64 - after as i64) as i32);
    }

    fn push_const(&mut self, o: &Obj) {
        self.emito(Op::Push, o);
    }

    fn push_none(&mut self) {
        let none = self.ctx.none();
        self.push_const(&none);
    }

    fn name_const(&mut self, op: Op, name: &str) {
        let s = self.ctx.str_(name);
        self.emito(op, &s);
    }

    /// A fresh hidden local name. `~` cannot appear in identifiers.
    fn temp(&mut self) -> String {
        let n = self.temps;
        self.temps += 1;
        format!("~t{n}")
    }

    fn finish(&mut self) {
        self.push_none();
        self.emit(Op::Ret);
    }

    /// A syntax error with rendered source context.
    fn err(&mut self, tok: Token, msg: &str) -> Throw {
        let (fname, src) = self.with_code(|c| (c.fname.to_string(), c.src.to_string()));
        let excerpt = render_excerpt(&fname, &src, tok);
        self.ctx
            .throw(ExcKind::SyntaxError, format!("{msg}\n{excerpt}"))
    }

    // ---- statements ----

    fn stmt(&mut self, ast: &Ast) -> XResult<()> {
        self.mark(ast.tok);
        match &ast.kind {
            AstKind::Block => {
                for s in &ast.args {
                    self.stmt(s)?;
                }
                Ok(())
            }
            AstKind::If => {
                self.expr(&ast.args[0])?;
                let jf = self.jump_fwd(Op::Jmpf);
                self.stmt(&ast.args[1])?;
                if let Some(els) = ast.args.get(2) {
                    let j = self.jump_fwd(Op::Jmp);
                    self.patch_here(jf);
                    self.stmt(els)?;
                    self.patch_here(j);
                } else {
                    self.patch_here(jf);
                }
                Ok(())
            }
            AstKind::While => {
                let head = self.here();
                self.expr(&ast.args[0])?;
                let jf = self.jump_fwd(Op::Jmpf);
                self.loops.push(LoopCtx {
                    head,
                    breaks: Vec::new(),
                    is_for: false,
                    try_depth: self.try_depth,
                });
                self.stmt(&ast.args[1])?;
                self.jump_back(Op::Jmp, head);
                let ctx = self.loops.pop().expect("loop context");
                self.patch_here(jf);
                if let Some(els) = ast.args.get(2) {
                    self.stmt(els)?;
                }
                for b in ctx.breaks {
                    self.patch_here(b);
                }
                Ok(())
            }
            AstKind::For { var } => {
                self.expr(&ast.args[0])?;
                self.emit(Op::ForStart);
                let head = self.here();
                let exhausted = self.jump_fwd(Op::ForNextf);
                self.name_const(Op::Store, var);
                self.emit(Op::Popu);
                self.loops.push(LoopCtx {
                    head,
                    breaks: Vec::new(),
                    is_for: true,
                    try_depth: self.try_depth,
                });
                self.stmt(&ast.args[1])?;
                self.jump_back(Op::Jmp, head);
                let ctx = self.loops.pop().expect("loop context");
                self.patch_here(exhausted);
                if let Some(els) = ast.args.get(2) {
                    self.stmt(els)?;
                }
                for b in ctx.breaks {
                    self.patch_here(b);
                }
                Ok(())
            }
            AstKind::Try { catches, finally } => self.stmt_try(ast, catches, finally.as_deref()),
            AstKind::Ret => {
                match ast.args.first() {
                    Some(e) => self.expr(e)?,
                    None => self.push_none(),
                }
                self.mark(ast.tok);
                self.emit(Op::Ret);
                Ok(())
            }
            AstKind::Throw => {
                self.expr(&ast.args[0])?;
                self.mark(ast.tok);
                self.emit(Op::Throw);
                Ok(())
            }
            AstKind::Assert => {
                self.expr(&ast.args[0])?;
                let jt = self.jump_fwd(Op::Jmpt);
                let error_ty = self.ctx.types.error().clone();
                self.push_const(&error_ty);
                let text = self.with_code(|c| {
                    let src = &c.src;
                    let tok = ast.args[0].tok;
                    src.get(tok.spos..tok.epos).unwrap_or("").to_string()
                });
                let msg = self.ctx.str_(format!("Assertion failed: {text}"));
                self.push_const(&msg);
                self.emiti(Op::Call, 2);
                self.emit(Op::Throw);
                self.patch_here(jt);
                Ok(())
            }
            AstKind::Break => {
                let (is_for, loop_tries) = match self.loops.last() {
                    Some(l) => (l.is_for, l.try_depth),
                    None => return Err(self.err(ast.tok, "'break' outside of a loop")),
                };
                // Close try regions opened inside the loop; a zero-offset
                // try_end pops the block and falls through.
                for _ in loop_tries..self.try_depth {
                    self.emiti(Op::TryEnd, 0);
                }
                if is_for {
                    // Discard the loop iterator before leaving.
                    self.emit(Op::Popu);
                }
                let j = self.jump_fwd(Op::Jmp);
                self.loops.last_mut().expect("loop context").breaks.push(j);
                Ok(())
            }
            AstKind::Cont => {
                let (head, loop_tries) = match self.loops.last() {
                    Some(l) => (l.head, l.try_depth),
                    None => return Err(self.err(ast.tok, "'cont' outside of a loop")),
                };
                for _ in loop_tries..self.try_depth {
                    self.emiti(Op::TryEnd, 0);
                }
                self.jump_back(Op::Jmp, head);
                Ok(())
            }
            AstKind::Del => {
                for a in &ast.args {
                    self.expr(a)?;
                }
                self.mark(ast.tok);
                self.emiti(Op::Delelems, (ast.args.len() - 1) as i32);
                Ok(())
            }
            AstKind::Import { name, alias } => {
                self.name_const(Op::Load, "import");
                let name_obj = self.ctx.str_(name.clone());
                self.push_const(&name_obj);
                self.emiti(Op::Call, 2);
                let bind = alias
                    .clone()
                    .unwrap_or_else(|| name.split('.').next_back().unwrap_or(name).to_string());
                self.name_const(Op::Store, &bind);
                self.emit(Op::Popu);
                Ok(())
            }
            AstKind::FuncDef { name, params } if !name.is_empty() => {
                self.compile_func(name, params, &ast.args[0], ast.tok)?;
                self.name_const(Op::Store, name);
                self.emit(Op::Popu);
                Ok(())
            }
            AstKind::TypeDef { name } => {
                self.expr(&ast.args[0])?;
                let body = compile(
                    self.ctx,
                    "",
                    "",
                    &ast.args[1],
                    Some(&self.code.clone()),
                )?;
                let name_obj = self.ctx.str_(name.clone());
                let tpl = self.ctx.tuple(vec![name_obj, body]);
                self.mark(ast.tok);
                self.emito(Op::Type, &tpl);
                self.name_const(Op::Store, name);
                self.emit(Op::Popu);
                Ok(())
            }
            // Everything else is an expression used as a statement: its
            // value is surplus and gets popped.
            _ => {
                self.expr(ast)?;
                self.emit(Op::Popu);
                Ok(())
            }
        }
    }

    /// `try`/`catch`/`finally` lowering. The finally body is emitted
    /// twice: once on the normal/caught path, once on the unmatched path
    /// where the pending exception is stashed on the stack and rethrown
    /// by `finally_end`.
    fn stmt_try(
        &mut self,
        ast: &Ast,
        catches: &[kestrel_compiler::ast::CatchClause],
        finally: Option<&Ast>,
    ) -> XResult<()> {
        let try_start = self.jump_fwd(Op::TryStart);
        self.try_depth += 1;
        let body_result = self.stmt(&ast.args[0]);
        self.try_depth -= 1;
        body_result?;
        let to_fin = self.jump_fwd(Op::TryEnd);

        // Handler block: entered with the exception pending.
        self.patch_here(try_start);
        let mut done_jumps = vec![to_fin];
        for clause in catches {
            let next = match &clause.ty {
                Some(ty_expr) => {
                    self.expr(ty_expr)?;
                    Some(self.jump_fwd(Op::TryCatch))
                }
                None => {
                    self.emit(Op::TryCatchAll);
                    None
                }
            };
            // The caught exception is on the stack.
            match &clause.name {
                Some(n) => {
                    self.name_const(Op::Store, n);
                    self.emit(Op::Popu);
                }
                None => self.emit(Op::Popu),
            }
            self.stmt(&clause.body)?;
            done_jumps.push(self.jump_fwd(Op::Jmp));
            match next {
                Some(pos) => self.patch_here(pos),
                None => break,
            }
        }

        // Unmatched path: stash the pending exception, run the finally
        // copy, rethrow.
        self.emit(Op::TryCatchAll);
        if let Some(f) = finally {
            self.stmt(f)?;
        }
        self.emit(Op::FinallyEnd);

        // Normal/caught path.
        for j in done_jumps {
            self.patch_here(j);
        }
        if let Some(f) = finally {
            self.stmt(f)?;
        }
        Ok(())
    }

    // ---- expressions ----

    fn expr(&mut self, ast: &Ast) -> XResult<()> {
        self.mark(ast.tok);
        match &ast.kind {
            AstKind::Const(lit) => {
                let v = self.materialize(lit, ast.tok)?;
                self.push_const(&v);
                Ok(())
            }
            AstKind::Name(n) => {
                self.name_const(Op::Load, n);
                Ok(())
            }
            AstKind::ListDisplay => self.display(&ast.args, Op::List, Op::ListPushn),
            AstKind::TupleDisplay => self.display(&ast.args, Op::Tuple, Op::TuplePushn),
            AstKind::SetDisplay => self.display(&ast.args, Op::Set, Op::SetPushn),
            AstKind::DictDisplay => {
                for a in &ast.args {
                    self.expr(a)?;
                }
                self.mark(ast.tok);
                self.emiti(Op::Dict, (ast.args.len() / 2) as i32);
                Ok(())
            }
            AstKind::SliceDisplay => {
                for a in &ast.args {
                    self.expr(a)?;
                }
                self.emit(Op::Slice);
                Ok(())
            }
            AstKind::Call => {
                for a in &ast.args {
                    self.expr(a)?;
                }
                self.mark(ast.tok);
                self.emiti(Op::Call, ast.args.len() as i32);
                Ok(())
            }
            AstKind::Attr(name) => {
                self.expr(&ast.args[0])?;
                self.mark(ast.tok);
                self.name_const(Op::Getattr, name);
                Ok(())
            }
            AstKind::Elem => {
                for a in &ast.args {
                    self.expr(a)?;
                }
                self.mark(ast.tok);
                self.emiti(Op::Getelems, (ast.args.len() - 1) as i32);
                Ok(())
            }
            AstKind::Cond => {
                self.expr(&ast.args[0])?;
                let jf = self.jump_fwd(Op::Jmpf);
                self.expr(&ast.args[1])?;
                let j = self.jump_fwd(Op::Jmp);
                self.patch_here(jf);
                self.expr(&ast.args[2])?;
                self.patch_here(j);
                Ok(())
            }
            AstKind::RichCmp(ops) => self.richcmp(ast, ops),
            AstKind::FuncDef { name, params } => {
                self.compile_func(name, params, &ast.args[0], ast.tok)
            }
            AstKind::Binary(op) => self.binary(ast, *op),
            AstKind::Unary(op) => self.unary(ast, *op),
            _ => Err(self.err(ast.tok, "Expected an expression")),
        }
    }

    /// Sequence displays: small ones build in one instruction, large
    /// ones start empty and extend in chunks.
    fn display(&mut self, elems: &[Ast], build: Op, pushn: Op) -> XResult<()> {
        if elems.len() <= DISPLAY_CHUNK {
            for a in elems {
                self.expr(a)?;
            }
            self.emiti(build, elems.len() as i32);
            return Ok(());
        }
        self.emiti(build, 0);
        for chunk in elems.chunks(DISPLAY_CHUNK) {
            for a in chunk {
                self.expr(a)?;
            }
            self.emiti(pushn, chunk.len() as i32);
        }
        Ok(())
    }

    fn cmp_op(op: CmpOp) -> Op {
        match op {
            CmpOp::Eeq => Op::BopEeq,
            CmpOp::Eq => Op::BopEq,
            CmpOp::Ne => Op::BopNe,
            CmpOp::Lt => Op::BopLt,
            CmpOp::Le => Op::BopLe,
            CmpOp::Gt => Op::BopGt,
            CmpOp::Ge => Op::BopGe,
        }
    }

    /// Comparison chains evaluate left to right, each mid-term exactly
    /// once (held in a temporary), short-circuiting on the first false
    /// link.
    fn richcmp(&mut self, ast: &Ast, ops: &[CmpOp]) -> XResult<()> {
        if ops.len() == 1 {
            self.expr(&ast.args[0])?;
            self.expr(&ast.args[1])?;
            self.mark(ast.tok);
            self.emit(Self::cmp_op(ops[0]));
            return Ok(());
        }

        let tmp = self.temp();
        let mut false_jumps = Vec::new();
        self.expr(&ast.args[0])?;
        for (i, op) in ops.iter().enumerate() {
            let last = i == ops.len() - 1;
            self.expr(&ast.args[i + 1])?;
            if !last {
                self.name_const(Op::Store, &tmp);
            }
            self.emit(Self::cmp_op(*op));
            if !last {
                false_jumps.push(self.jump_fwd(Op::Jmpf));
                self.name_const(Op::Load, &tmp);
            }
        }
        let end = self.jump_fwd(Op::Jmp);
        for j in false_jumps {
            self.patch_here(j);
        }
        let fls = self.ctx.bool_(false);
        self.push_const(&fls);
        self.patch_here(end);
        Ok(())
    }

    fn binary(&mut self, ast: &Ast, op: BinOp) -> XResult<()> {
        match op {
            BinOp::Assign => self.assign(&ast.args[0], &ast.args[1]),
            BinOp::Or => {
                self.expr(&ast.args[0])?;
                self.emit(Op::Dup);
                let jt = self.jump_fwd(Op::Jmpt);
                self.emit(Op::Popu);
                self.expr(&ast.args[1])?;
                self.patch_here(jt);
                Ok(())
            }
            BinOp::And => {
                self.expr(&ast.args[0])?;
                self.emit(Op::Dup);
                let jf = self.jump_fwd(Op::Jmpf);
                self.emit(Op::Popu);
                self.expr(&ast.args[1])?;
                self.patch_here(jf);
                Ok(())
            }
            BinOp::Coalesce => {
                self.expr(&ast.args[0])?;
                self.emit(Op::Dup);
                self.push_none();
                self.emit(Op::BopEeq);
                let keep = self.jump_fwd(Op::Jmpf);
                self.emit(Op::Popu);
                self.expr(&ast.args[1])?;
                self.patch_here(keep);
                Ok(())
            }
            _ => match op.augmented_base() {
                Some(base) => self.augmented(ast, base),
                None => {
                    self.expr(&ast.args[0])?;
                    self.expr(&ast.args[1])?;
                    self.mark(ast.tok);
                    self.emit(Self::bin_op(op));
                    Ok(())
                }
            },
        }
    }

    fn bin_op(op: BinOp) -> Op {
        match op {
            BinOp::In => Op::BopIn,
            BinOp::Ior => Op::BopIor,
            BinOp::Xor => Op::BopXor,
            BinOp::Band => Op::BopAnd,
            BinOp::Lsh => Op::BopLsh,
            BinOp::Rsh => Op::BopRsh,
            BinOp::Add => Op::BopAdd,
            BinOp::Sub => Op::BopSub,
            BinOp::Mul => Op::BopMul,
            BinOp::Div => Op::BopDiv,
            BinOp::Floordiv => Op::BopFloordiv,
            BinOp::Mod => Op::BopMod,
            _ => Op::BopPow,
        }
    }

    /// Plain assignment. Leaves the assigned value on the stack.
    fn assign(&mut self, target: &Ast, rhs: &Ast) -> XResult<()> {
        match &target.kind {
            AstKind::Name(n) => {
                self.expr(rhs)?;
                self.mark(target.tok);
                self.name_const(Op::Store, n);
                Ok(())
            }
            AstKind::Attr(name) => {
                self.expr(&target.args[0])?;
                self.expr(rhs)?;
                self.mark(target.tok);
                self.name_const(Op::Setattr, name);
                Ok(())
            }
            AstKind::Elem => {
                for a in &target.args {
                    self.expr(a)?;
                }
                self.expr(rhs)?;
                self.mark(target.tok);
                self.emiti(Op::Setelems, (target.args.len() - 1) as i32);
                Ok(())
            }
            _ => Err(self.err(target.tok, "Invalid assignment target")),
        }
    }

    /// Augmented assignment lowers to the base operator plus a store,
    /// evaluating the target's base (and indices) exactly once.
    fn augmented(&mut self, ast: &Ast, base: BinOp) -> XResult<()> {
        let target = &ast.args[0];
        let rhs = &ast.args[1];
        match &target.kind {
            AstKind::Name(n) => {
                self.name_const(Op::Load, n);
                self.expr(rhs)?;
                self.mark(ast.tok);
                self.emit(Self::bin_op(base));
                self.name_const(Op::Store, n);
                Ok(())
            }
            AstKind::Attr(name) => {
                self.expr(&target.args[0])?;
                self.emit(Op::Dup);
                self.name_const(Op::Getattr, name);
                self.expr(rhs)?;
                self.mark(ast.tok);
                self.emit(Self::bin_op(base));
                self.name_const(Op::Setattr, name);
                Ok(())
            }
            AstKind::Elem => {
                let n_idx = target.args.len() - 1;
                let t_obj = self.temp();
                let t_idx: Vec<String> = (0..n_idx).map(|_| self.temp()).collect();
                let t_res = self.temp();

                self.expr(&target.args[0])?;
                self.name_const(Op::Store, &t_obj);
                self.emit(Op::Popu);
                for (i, idx) in target.args[1..].iter().enumerate() {
                    self.expr(idx)?;
                    self.name_const(Op::Store, &t_idx[i]);
                    self.emit(Op::Popu);
                }

                self.name_const(Op::Load, &t_obj);
                for t in &t_idx {
                    self.name_const(Op::Load, t);
                }
                self.emiti(Op::Getelems, n_idx as i32);
                self.expr(rhs)?;
                self.mark(ast.tok);
                self.emit(Self::bin_op(base));
                self.name_const(Op::Store, &t_res);
                self.emit(Op::Popu);

                self.name_const(Op::Load, &t_obj);
                for t in &t_idx {
                    self.name_const(Op::Load, t);
                }
                self.name_const(Op::Load, &t_res);
                self.emiti(Op::Setelems, n_idx as i32);
                Ok(())
            }
            _ => Err(self.err(target.tok, "Invalid assignment target")),
        }
    }

    fn unary(&mut self, ast: &Ast, op: UnOp) -> XResult<()> {
        let operand = &ast.args[0];
        match op {
            UnOp::Pos | UnOp::Neg | UnOp::Sqig | UnOp::Not => {
                self.expr(operand)?;
                self.mark(ast.tok);
                self.emit(match op {
                    UnOp::Pos => Op::UopPos,
                    UnOp::Neg => Op::UopNeg,
                    UnOp::Sqig => Op::UopSqig,
                    _ => Op::UopNot,
                });
                Ok(())
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let name = match &operand.kind {
                    AstKind::Name(n) => n.clone(),
                    _ => return Err(self.err(ast.tok, "'++'/'--' requires a name")),
                };
                let one = self.ctx.int_i64(1);
                let post = matches!(op, UnOp::PostInc | UnOp::PostDec);
                let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) {
                    Op::BopAdd
                } else {
                    Op::BopSub
                };
                self.name_const(Op::Load, &name);
                if post {
                    self.emit(Op::Dup);
                }
                self.push_const(&one);
                self.mark(ast.tok);
                self.emit(delta);
                self.name_const(Op::Store, &name);
                if post {
                    self.emit(Op::Popu);
                }
                Ok(())
            }
        }
    }

    /// Compile a function body into a derived code object and emit the
    /// `func` construction plus its defaults.
    fn compile_func(
        &mut self,
        name: &str,
        params: &[Param],
        body: &Ast,
        tok: Token,
    ) -> XResult<()> {
        // Defaults must be trailing so missing arguments fill correctly.
        let mut seen_default = false;
        for p in params {
            if p.variadic {
                continue;
            }
            if p.default.is_some() {
                seen_default = true;
            } else if seen_default {
                return Err(self.err(
                    tok,
                    "A parameter without a default follows one with a default",
                ));
            }
        }

        let body_code = compile(self.ctx, "", "", body, Some(&self.code.clone()))?;

        let display_name = if name.is_empty() { "<lambda>" } else { name };
        let name_obj = self.ctx.str_(display_name);
        let pnames: Vec<Obj> = params.iter().map(|p| self.ctx.str_(p.name.clone())).collect();
        let params_tuple = self.ctx.tuple(pnames);
        let vararg_obj = match params.iter().position(|p| p.variadic) {
            Some(i) => self.ctx.int_i64(i as i64),
            None => self.ctx.none(),
        };
        let tpl = self
            .ctx
            .tuple(vec![name_obj, params_tuple, vararg_obj, body_code]);
        self.mark(tok);
        self.emito(Op::Func, &tpl);

        let defaults: Vec<&Ast> = params.iter().filter_map(|p| p.default.as_ref()).collect();
        if !defaults.is_empty() {
            for d in &defaults {
                self.expr(d)?;
            }
            self.emiti(Op::FuncDefa, defaults.len() as i32);
        }
        Ok(())
    }

    /// Turn a literal into a runtime constant.
    fn materialize(&mut self, lit: &Lit, tok: Token) -> XResult<Obj> {
        match lit {
            Lit::Int(v) => Ok(self.ctx.int_from(v.clone())),
            Lit::Float(v) => Ok(self.ctx.float(*v)),
            Lit::Imag(v) => Ok(self.ctx.complex(0.0, *v)),
            Lit::Str { raw } => match unescape(raw) {
                Ok(s) => Ok(self.ctx.str_(s)),
                Err((msg, _)) => Err(self.err(tok, &msg)),
            },
            Lit::Regex { raw } => {
                let source = raw.replace("\\`", "`");
                match regex::Regex::new(&source) {
                    Ok(re) => Ok(Obj::new(
                        &self.ctx.types.regex,
                        Payload::Regex(RegexData { source, re }),
                        false,
                    )),
                    Err(e) => Err(self.err(tok, &format!("Invalid regex: {e}"))),
                }
            }
        }
    }
}
