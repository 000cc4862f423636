//! Exception machinery: catching, finally, chaining, tracebacks.

mod common;

use common::{ctx, exc_kind, run, run_err, run_repr};
use kestrel_runtime::ExcKind;

#[test]
fn test_catch_by_type() {
    let mut c = ctx();
    run(
        &mut c,
        "r = 0; try { 1 // 0 } catch (ValError) { r = 1 } catch { r = 2 }",
    );
    assert_eq!(run_repr(&mut c, "r"), "1");
}

#[test]
fn test_catch_all_with_binding() {
    let mut c = ctx();
    run(&mut c, "m = none; try { throw Error('boom') } catch e { m = e.msg }");
    assert_eq!(run_repr(&mut c, "m"), "'boom'");
}

#[test]
fn test_unmatched_type_propagates() {
    let mut c = ctx();
    run(
        &mut c,
        "r = 0\n\
         try {\n\
           try { throw ValError('v') } catch (KeyError) { r = 1 }\n\
         } catch (ValError) { r = 2 }",
    );
    assert_eq!(run_repr(&mut c, "r"), "2");
}

#[test]
fn test_catch_matches_subtypes() {
    let mut c = ctx();
    run(
        &mut c,
        "r = 0; try { throw IndexError('i') } catch (Error) { r = 1 }",
    );
    assert_eq!(run_repr(&mut c, "r"), "1");
}

#[test]
fn test_finally_runs_on_all_paths() {
    let mut c = ctx();
    run(
        &mut c,
        "log = []\n\
         try { log.push(1) } finally { log.push(2) }\n\
         try { log.push(3); throw Error('x') } catch { log.push(4) } finally { log.push(5) }",
    );
    assert_eq!(run_repr(&mut c, "log"), "[1, 2, 3, 4, 5]");
}

#[test]
fn test_finally_reraises_unmatched() {
    let mut c = ctx();
    run(
        &mut c,
        "log = []\n\
         try {\n\
           try { throw ValError('v') } catch (KeyError) { log.push(0) } finally { log.push(1) }\n\
           log.push(2)\n\
         } catch (ValError) { log.push(3) }",
    );
    // finally ran, the statement after the inner try did not, the outer
    // catch saw the original exception.
    assert_eq!(run_repr(&mut c, "log"), "[1, 3]");
}

#[test]
fn test_try_without_catch_reraises_after_finally() {
    let mut c = ctx();
    run(
        &mut c,
        "log = []\n\
         try {\n\
           try { throw Error('x') } finally { log.push(1) }\n\
         } catch e { log.push(e.msg) }",
    );
    assert_eq!(run_repr(&mut c, "log"), "[1, 'x']");
}

#[test]
fn test_throw_a_type_constructs() {
    let mut c = ctx();
    run(&mut c, "k = none; try { throw ValError } catch e { k = e }");
    assert_eq!(run_repr(&mut c, "isinst(k, ValError)"), "true");
}

#[test]
fn test_throw_non_error_is_type_error() {
    let mut c = ctx();
    let exc = run_err(&mut c, "throw 42");
    assert_eq!(exc_kind(&exc), "TypeError");
}

#[test]
fn test_error_kinds_from_operations() {
    let mut c = ctx();
    assert_eq!(exc_kind(&run_err(&mut c, "no_such_name")), "NameError");
    assert_eq!(exc_kind(&run_err(&mut c, "1 + 'a'")), "TypeError");
    assert_eq!(exc_kind(&run_err(&mut c, "[1].nope")), "AttrError");
    assert_eq!(exc_kind(&run_err(&mut c, "1 // 0")), "ValError");
    assert_eq!(exc_kind(&run_err(&mut c, "[1][5]")), "IndexError");
    assert_eq!(exc_kind(&run_err(&mut c, "func f(a) { ret a }; f()")), "ArgError");
    assert_eq!(exc_kind(&run_err(&mut c, "f(1, 2)")), "ArgError");
    assert_eq!(exc_kind(&run_err(&mut c, "1 << (1 << 30)")), "OverflowError");
    assert_eq!(exc_kind(&run_err(&mut c, "x = ")), "SyntaxError");
    assert_eq!(exc_kind(&run_err(&mut c, "'unterminated")), "SyntaxError");
}

#[test]
fn test_assert_statement() {
    let mut c = ctx();
    run(&mut c, "assert 1 + 1 == 2");
    let exc = run_err(&mut c, "assert 1 == 2");
    assert_eq!(exc_kind(&exc), "Error");
    let msg = exc
        .as_exc()
        .map(|e| e.borrow().msg.clone())
        .unwrap_or_default();
    assert!(msg.starts_with("Assertion failed"), "got {msg:?}");
}

#[test]
fn test_out_of_iter_protocol() {
    let mut c = ctx();
    run(
        &mut c,
        "it = iter([1]); a = next(it)\n\
         r = 0; try { next(it) } catch (OutOfIterError) { r = 'done' }",
    );
    assert_eq!(run_repr(&mut c, "a"), "1");
    assert_eq!(run_repr(&mut c, "r"), "'done'");
}

#[test]
fn test_cause_chain_on_pending_throw() {
    // Throwing while another exception is pending chains `inner`.
    let mut c = ctx();
    c.throw(ExcKind::ValError, "first");
    c.throw(ExcKind::TypeError, "second");
    let exc = c.catch_exc().expect("pending");
    assert_eq!(exc_kind(&exc), "TypeError");
    let inner = exc
        .as_exc()
        .and_then(|d| d.borrow().inner.clone())
        .expect("chained cause");
    assert_eq!(exc_kind(&inner), "ValError");
}

#[test]
fn test_traceback_names_frames() {
    let mut c = ctx();
    let exc = run_err(
        &mut c,
        "func inner() { throw Error('boom') }\n\
         func outer() { ret inner() }\n\
         outer()",
    );
    let rendered = c.format_exc(&exc);
    assert!(rendered.starts_with("Error: boom"), "got {rendered}");
    assert!(rendered.contains("in inner @ <test>:"), "got {rendered}");
    assert!(rendered.contains("in outer @ <test>:"), "got {rendered}");
    assert!(rendered.contains("in <module> @ <test>:"), "got {rendered}");
}

#[test]
fn test_caught_exception_clears_pending_state() {
    let mut c = ctx();
    run(&mut c, "try { throw Error('x') } catch { 0 }");
    assert!(!c.has_exc());
    // The context stays usable afterwards.
    assert_eq!(run_repr(&mut c, "1 + 1"), "2");
}

#[test]
fn test_break_inside_try_inside_loop() {
    let mut c = ctx();
    run(
        &mut c,
        "r = []\n\
         for i in range(5) {\n\
           try { if i == 2 { break }; r.push(i) } finally { r.push('f') }\n\
         }",
    );
    // The finally copy does not intercept the break; the loop exits and
    // later errors still resolve against outer handlers only.
    assert_eq!(run_repr(&mut c, "r"), "[0, 'f', 1, 'f']");
    let exc = run_err(&mut c, "missing_name_after_loop");
    assert_eq!(exc_kind(&exc), "NameError");
}

#[test]
fn test_separate_contexts_do_not_interfere() {
    let mut a = ctx();
    let mut b = ctx();
    run(&mut a, "x = 1");
    run(&mut b, "x = 2");
    assert_eq!(run_repr(&mut a, "x"), "1");
    assert_eq!(run_repr(&mut b, "x"), "2");
    let _ = run_err(&mut a, "boom_name");
    assert!(!b.has_exc());
}
