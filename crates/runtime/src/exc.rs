//! Exceptions and failure propagation
//!
//! Every fallible primitive sets the pending exception on the executing
//! thread and returns `Err(Throw)`; callers propagate with `?`. Catching
//! takes the pending exception and clears it. Throwing while another
//! exception is pending chains the new exception's `inner` to the old
//! one, and the frame stack is snapshotted at throw time so later
//! re-raises keep their context.

use crate::context::Context;
use crate::obj::{Obj, Payload};

/// Zero-sized failure marker. The exception itself lives on the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throw;

pub type XResult<T> = Result<T, Throw>;

/// The built-in exception kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcKind {
    Error,
    TypeError,
    ValError,
    NameError,
    AttrError,
    KeyError,
    IndexError,
    SizeError,
    ArgError,
    OverflowError,
    IoError,
    OsError,
    ImportError,
    SyntaxError,
    InternalError,
    /// Signals iterator exhaustion; usually caught internally.
    OutOfIter,
    PlatformWarning,
}

impl ExcKind {
    pub fn name(self) -> &'static str {
        match self {
            ExcKind::Error => "Error",
            ExcKind::TypeError => "TypeError",
            ExcKind::ValError => "ValError",
            ExcKind::NameError => "NameError",
            ExcKind::AttrError => "AttrError",
            ExcKind::KeyError => "KeyError",
            ExcKind::IndexError => "IndexError",
            ExcKind::SizeError => "SizeError",
            ExcKind::ArgError => "ArgError",
            ExcKind::OverflowError => "OverflowError",
            ExcKind::IoError => "IOError",
            ExcKind::OsError => "OSError",
            ExcKind::ImportError => "ImportError",
            ExcKind::SyntaxError => "SyntaxError",
            ExcKind::InternalError => "InternalError",
            ExcKind::OutOfIter => "OutOfIterError",
            ExcKind::PlatformWarning => "PlatformWarning",
        }
    }

    pub const ALL: &'static [ExcKind] = &[
        ExcKind::Error,
        ExcKind::TypeError,
        ExcKind::ValError,
        ExcKind::NameError,
        ExcKind::AttrError,
        ExcKind::KeyError,
        ExcKind::IndexError,
        ExcKind::SizeError,
        ExcKind::ArgError,
        ExcKind::OverflowError,
        ExcKind::IoError,
        ExcKind::OsError,
        ExcKind::ImportError,
        ExcKind::SyntaxError,
        ExcKind::InternalError,
        ExcKind::OutOfIter,
        ExcKind::PlatformWarning,
    ];
}

/// A source position attached to an exception.
#[derive(Debug, Clone)]
pub struct ExcLoc {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

/// One captured frame in a traceback.
#[derive(Debug, Clone)]
pub struct TracebackEntry {
    /// Name of the callable executing in the frame.
    pub name: String,
    pub file: String,
    pub line: usize,
    pub col: usize,
}

/// Payload of an exception object.
pub struct ExcData {
    pub msg: String,
    pub loc: Option<ExcLoc>,
    /// Cause chain: the exception that was pending when this one was
    /// thrown.
    pub inner: Option<Obj>,
    /// Frame-stack snapshot captured at throw time, innermost last.
    pub frames: Vec<TracebackEntry>,
}

impl Context {
    /// Build an exception instance of the given kind.
    pub fn make_exc(&self, kind: ExcKind, msg: impl Into<String>) -> Obj {
        let ty = self.types.exc_type(kind).clone();
        Obj::new(
            &ty,
            Payload::Exc(std::cell::RefCell::new(ExcData {
                msg: msg.into(),
                loc: None,
                inner: None,
                frames: Vec::new(),
            })),
            true,
        )
    }

    /// Throw a fresh exception: chain any pending exception as its cause,
    /// snapshot the frame stack, and set it pending.
    pub fn throw(&mut self, kind: ExcKind, msg: impl Into<String>) -> Throw {
        let exc = self.make_exc(kind, msg);
        self.throw_obj(exc)
    }

    /// Throw an existing exception object.
    pub fn throw_obj(&mut self, exc: Obj) -> Throw {
        let inner = self.thread.exc.take();
        let frames = self.capture_traceback();
        if let Some(data) = exc.as_exc() {
            let mut data = data.borrow_mut();
            data.inner = inner;
            data.frames = frames;
        }
        self.thread.exc = Some(exc);
        Throw
    }

    /// Re-raise a previously caught exception without touching its
    /// captured traceback or cause chain.
    pub fn rethrow(&mut self, exc: Obj) -> Throw {
        self.thread.exc = Some(exc);
        Throw
    }

    /// Take (and clear) the pending exception.
    pub fn catch_exc(&mut self) -> Option<Obj> {
        self.thread.exc.take()
    }

    pub fn has_exc(&self) -> bool {
        self.thread.exc.is_some()
    }

    /// Snapshot the current frame stack, innermost frame last.
    fn capture_traceback(&self) -> Vec<TracebackEntry> {
        let mut out = Vec::with_capacity(self.thread.frames.len());
        for frame in &self.thread.frames {
            let frame = frame.borrow();
            let name = callable_name(&frame.callable);
            let (file, line, col) = frame
                .callable
                .as_code()
                .or_else(|| {
                    frame
                        .callable
                        .as_func()
                        .and_then(|f| f.bytecode())
                        .and_then(|bf| bf.code.as_code())
                })
                .map(|code| {
                    let tok = code.meta_at(frame.pc);
                    (
                        code.fname.to_string(),
                        tok.map(|t| t.sline).unwrap_or(0),
                        tok.map(|t| t.scol).unwrap_or(0),
                    )
                })
                .unwrap_or(("<native>".to_string(), 0, 0));
            out.push(TracebackEntry {
                name,
                file,
                line,
                col,
            });
        }
        out
    }

    /// Render an uncaught exception: `<TypeName>: <message>` followed by
    /// the traceback (source-mapped line and column per frame) and any
    /// cause chain.
    pub fn format_exc(&self, exc: &Obj) -> String {
        let mut out = String::new();
        self.format_exc_into(exc, &mut out, 0);
        out
    }

    fn format_exc_into(&self, exc: &Obj, out: &mut String, depth: usize) {
        let ty_name = exc
            .ty()
            .type_data()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "Error".to_string());
        match exc.as_exc() {
            Some(data) => {
                let data = data.borrow();
                out.push_str(&format!("{}: {}\n", ty_name, data.msg));
                for fr in data.frames.iter().rev() {
                    out.push_str(&format!(
                        "  in {} @ {}:{}:{}\n",
                        fr.name,
                        fr.file,
                        fr.line + 1,
                        fr.col + 1
                    ));
                }
                if depth < 8 {
                    if let Some(inner) = &data.inner {
                        out.push_str("Caused by:\n");
                        self.format_exc_into(inner, out, depth + 1);
                    }
                }
            }
            None => {
                out.push_str(&format!("{ty_name}: <non-exception thrown>\n"));
            }
        }
    }
}

/// Display name for the callable in a frame.
pub fn callable_name(callable: &Obj) -> String {
    if let Some(f) = callable.as_func() {
        return f.name.clone();
    }
    if callable.as_code().is_some() {
        return "<module>".to_string();
    }
    if let Some(td) = callable.type_data() {
        return td.name.clone();
    }
    "<callable>".to_string()
}
