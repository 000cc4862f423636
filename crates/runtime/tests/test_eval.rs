//! End-to-end evaluation tests: source text in, values out.

mod common;

use common::{ctx, run, run_repr};
use kestrel_runtime::op::Op;

/// Decode a bytecode buffer into its opcode sequence.
fn opcodes(code: &kestrel_runtime::Obj) -> Vec<Op> {
    let data = code.as_code().expect("code object");
    let bc = data.bc.borrow();
    let mut out = Vec::new();
    let mut pc = 0;
    while pc < bc.len() {
        let op = Op::try_from(bc[pc]).expect("valid opcode");
        out.push(op);
        pc += if op.has_arg() { 5 } else { 1 };
    }
    out
}

#[test]
fn test_arithmetic_precedence() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "1 + 2 * 3"), "7");
    assert_eq!(run_repr(&mut c, "(1 + 2) * 3"), "9");
    assert_eq!(run_repr(&mut c, "2 ** 3 ** 2"), "512");
    assert_eq!(run_repr(&mut c, "7 // 2"), "3");
    assert_eq!(run_repr(&mut c, "-7 // 2"), "-4");
    assert_eq!(run_repr(&mut c, "7 % 3"), "1");
    assert_eq!(run_repr(&mut c, "1 / 2"), "0.5");
}

#[test]
fn test_arithmetic_compiles_to_expected_opcodes() {
    // `1 + 2 * 3` lowers to push, push, push, mul, add around the
    // wrapping return.
    let mut c = ctx();
    let prog = kestrel_compiler::parse_expr("<t>", "1 + 2 * 3").expect("parses");
    let tok = prog.tok;
    let wrapped = kestrel_compiler::Ast::new(kestrel_compiler::AstKind::Ret, vec![prog], tok);
    let code = kestrel_runtime::codegen::compile(&mut c, "<t>", "1 + 2 * 3", &wrapped, None)
        .expect("compiles");
    assert_eq!(
        opcodes(&code),
        vec![
            Op::Push,
            Op::Push,
            Op::Push,
            Op::BopMul,
            Op::BopAdd,
            Op::Ret,
            // Trailing implicit `ret none`.
            Op::Push,
            Op::Ret,
        ]
    );
}

#[test]
fn test_loop_append() {
    let mut c = ctx();
    run(&mut c, "x = []; for i in range(3) { x.push(i*i) }");
    assert_eq!(run_repr(&mut c, "x"), "[0, 1, 4]");
}

#[test]
fn test_dict_insertion_order_with_deletion() {
    let mut c = ctx();
    run(
        &mut c,
        "d = {}; d['a'] = 1; d['b'] = 2; del d['a']; d['c'] = 3",
    );
    assert_eq!(run_repr(&mut c, "list(d)"), "['b', 'c']");
    assert_eq!(run_repr(&mut c, "d"), "{'b': 2, 'c': 3}");
}

#[test]
fn test_try_catch_binds_exception() {
    let mut c = ctx();
    run(&mut c, "r = none; try { throw Error('x') } catch e { r = e }");
    assert_eq!(run_repr(&mut c, "r.msg"), "'x'");
    assert_eq!(run_repr(&mut c, "isinst(r, Error)"), "true");
}

#[test]
fn test_defaults_and_variadic() {
    let mut c = ctx();
    run(&mut c, "func f(a, b=2, *c) { ret (a, b, c) }");
    assert_eq!(run_repr(&mut c, "f(1, 3, 4, 5)"), "(1, 3, (4, 5))");
    assert_eq!(run_repr(&mut c, "f(1)"), "(1, 2, ())");
    assert_eq!(run_repr(&mut c, "f(1, 9)"), "(1, 9, ())");
}

#[test]
fn test_unicode_name_escape() {
    let mut c = ctx();
    assert_eq!(
        run_repr(&mut c, "'\\N[LATIN CAPITAL LETTER A]' == 'A'"),
        "true"
    );
    assert_eq!(run_repr(&mut c, "'\\N[GREEK SMALL LETTER PI]'"), "'\u{3c0}'");
}

#[test]
fn test_string_escapes_and_ops() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "'a' + 'b'"), "'ab'");
    assert_eq!(run_repr(&mut c, "'ab' * 3"), "'ababab'");
    assert_eq!(run_repr(&mut c, "'a\\tb'"), "'a\\tb'");
    assert_eq!(run_repr(&mut c, "'\\x41\\u00e9'"), "'A\u{e9}'");
    assert_eq!(run_repr(&mut c, "len('héllo')"), "5");
}

#[test]
fn test_comparison_chains() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "1 < 2 < 3"), "true");
    assert_eq!(run_repr(&mut c, "1 < 2 < 2"), "false");
    assert_eq!(run_repr(&mut c, "3 > 2 >= 2 == 2"), "true");
    assert_eq!(run_repr(&mut c, "1 == 1.0"), "true");
    assert_eq!(run_repr(&mut c, "1 === 1.0"), "false");
}

#[test]
fn test_identity_operator() {
    let mut c = ctx();
    run(&mut c, "a = [1]; b = a; c2 = [1]");
    assert_eq!(run_repr(&mut c, "a === b"), "true");
    assert_eq!(run_repr(&mut c, "a === c2"), "false");
    assert_eq!(run_repr(&mut c, "a == c2"), "true");
}

#[test]
fn test_logic_and_coalesce_keep_operand_values() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "1 || 2"), "1");
    assert_eq!(run_repr(&mut c, "0 || 2"), "2");
    assert_eq!(run_repr(&mut c, "1 && 2"), "2");
    assert_eq!(run_repr(&mut c, "0 && 2"), "0");
    assert_eq!(run_repr(&mut c, "none ?? 5"), "5");
    assert_eq!(run_repr(&mut c, "3 ?? 5"), "3");
    assert_eq!(run_repr(&mut c, "false ?? 5"), "false");
}

#[test]
fn test_conditional_expression() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "1 if true else 2"), "1");
    assert_eq!(run_repr(&mut c, "1 if false else 2"), "2");
}

#[test]
fn test_augmented_assignment() {
    let mut c = ctx();
    run(&mut c, "x = 10; x += 5; x *= 2");
    assert_eq!(run_repr(&mut c, "x"), "30");
    run(&mut c, "L = [1, 2, 3]; L[1] += 10");
    assert_eq!(run_repr(&mut c, "L"), "[1, 12, 3]");
    run(&mut c, "x <<= 2");
    assert_eq!(run_repr(&mut c, "x"), "120");
}

#[test]
fn test_increment_decrement() {
    let mut c = ctx();
    run(&mut c, "x = 5");
    assert_eq!(run_repr(&mut c, "++x"), "6");
    assert_eq!(run_repr(&mut c, "x++"), "6");
    assert_eq!(run_repr(&mut c, "x"), "7");
    assert_eq!(run_repr(&mut c, "--x"), "6");
    assert_eq!(run_repr(&mut c, "x--"), "6");
    assert_eq!(run_repr(&mut c, "x"), "5");
}

#[test]
fn test_while_loop_with_break_and_else() {
    let mut c = ctx();
    run(
        &mut c,
        "n = 0; r = 0; while n < 10 { n = n + 1; if n == 4 { break } } else { r = 1 }",
    );
    assert_eq!(run_repr(&mut c, "n"), "4");
    // break skips the else branch
    assert_eq!(run_repr(&mut c, "r"), "0");

    run(&mut c, "m = 0; while m < 3 { m = m + 1 } else { m = 99 }");
    assert_eq!(run_repr(&mut c, "m"), "99");
}

#[test]
fn test_for_else_on_empty_iteration() {
    let mut c = ctx();
    run(&mut c, "r = 0; for i in range(0) { r = 1 } else { r = 2 }");
    assert_eq!(run_repr(&mut c, "r"), "2");
    run(&mut c, "s = 0; for i in [1] { s = 1; break } else { s = 2 }");
    assert_eq!(run_repr(&mut c, "s"), "1");
}

#[test]
fn test_continue() {
    let mut c = ctx();
    run(
        &mut c,
        "total = 0; for i in range(10) { if i % 2 == 0 { cont }; total += i }",
    );
    assert_eq!(run_repr(&mut c, "total"), "25");
}

#[test]
fn test_recursion() {
    let mut c = ctx();
    run(
        &mut c,
        "func fib(n) { ret n if n < 2 else fib(n-1) + fib(n-2) }",
    );
    assert_eq!(run_repr(&mut c, "fib(10)"), "55");
}

#[test]
fn test_anonymous_func_and_closures() {
    let mut c = ctx();
    run(&mut c, "f = func (a) { ret a + 1 }");
    assert_eq!(run_repr(&mut c, "f(2)"), "3");
    // Inner functions see enclosing locals through the closure chain.
    run(
        &mut c,
        "func outer(n) { func inner() { ret n * 2 }; ret inner() }",
    );
    assert_eq!(run_repr(&mut c, "outer(21)"), "42");
}

#[test]
fn test_user_types_and_methods() {
    let mut c = ctx();
    run(
        &mut c,
        "type Point { func __init(self, x, y) { self.x = x; self.y = y }\n\
         func dist2(self) { ret self.x * self.x + self.y * self.y } }",
    );
    run(&mut c, "p = Point(3, 4)");
    assert_eq!(run_repr(&mut c, "p.x"), "3");
    assert_eq!(run_repr(&mut c, "p.dist2()"), "25");
    assert_eq!(run_repr(&mut c, "type(p) === Point"), "true");
    assert_eq!(run_repr(&mut c, "isinst(p, Point)"), "true");

    // Bound methods are first-class partials.
    run(&mut c, "m = p.dist2");
    assert_eq!(run_repr(&mut c, "m()"), "25");
}

#[test]
fn test_type_inheritance() {
    let mut c = ctx();
    run(
        &mut c,
        "type Animal { func speak(self) { ret 'generic' } }\n\
         type Dog extends Animal { func name(self) { ret 'dog' } }",
    );
    run(&mut c, "d = Dog()");
    assert_eq!(run_repr(&mut c, "d.speak()"), "'generic'");
    assert_eq!(run_repr(&mut c, "d.name()"), "'dog'");
    assert_eq!(run_repr(&mut c, "issub(Dog, Animal)"), "true");
    assert_eq!(run_repr(&mut c, "issub(Animal, Dog)"), "false");
    assert_eq!(run_repr(&mut c, "Dog.__base === Animal"), "true");
}

#[test]
fn test_operator_slot_dispatch() {
    let mut c = ctx();
    run(
        &mut c,
        "type V { func __init(self, n) { self.n = n }\n\
         func __add(self, other) { ret V(self.n + other.n) }\n\
         func __repr(self) { ret 'V(' + str(self.n) + ')' } }",
    );
    assert_eq!(run_repr(&mut c, "V(1) + V(2)"), "V(3)");
}

#[test]
fn test_templated_types_memoize() {
    let mut c = ctx();
    run(&mut c, "type Box { }");
    assert_eq!(run_repr(&mut c, "Box[int] === Box[int]"), "true");
    assert_eq!(run_repr(&mut c, "Box[int] === Box[str]"), "false");
    assert_eq!(run_repr(&mut c, "Box[int].__name"), "'Box<int>'");
    assert_eq!(run_repr(&mut c, "issub(Box[int], Box)"), "true");
}

#[test]
fn test_membership() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "2 in [1, 2, 3]"), "true");
    assert_eq!(run_repr(&mut c, "5 in (1, 2)"), "false");
    assert_eq!(run_repr(&mut c, "'el' in 'hello'"), "true");
    assert_eq!(run_repr(&mut c, "'a' in {'a': 1}"), "true");
    assert_eq!(run_repr(&mut c, "3 in range(10)"), "true");
    assert_eq!(run_repr(&mut c, "10 in range(10)"), "false");
}

#[test]
fn test_builtin_functions() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "abs(-5)"), "5");
    assert_eq!(run_repr(&mut c, "abs(-2.5)"), "2.5");
    assert_eq!(run_repr(&mut c, "len([1, 2, 3])"), "3");
    assert_eq!(run_repr(&mut c, "chr(65)"), "'A'");
    assert_eq!(run_repr(&mut c, "ord('A')"), "65");
    assert_eq!(run_repr(&mut c, "pow(2, 10)"), "1024");
    assert_eq!(run_repr(&mut c, "pow(2, 10, 1000)"), "24");
    assert_eq!(run_repr(&mut c, "repr('x')"), r"'\'x\''");
}

#[test]
fn test_recursive_repr_is_elided() {
    let mut c = ctx();
    run(&mut c, "x = []; x.push(x)");
    assert_eq!(run_repr(&mut c, "repr(x)"), "'[...]'");
    run(&mut c, "d = {}; d['self'] = d");
    assert_eq!(run_repr(&mut c, "repr(d)"), "'{\\'self\\': ...}'");
}

#[test]
fn test_big_integers() {
    let mut c = ctx();
    assert_eq!(
        run_repr(&mut c, "2 ** 100"),
        "1267650600228229401496703205376"
    );
    assert_eq!(run_repr(&mut c, "2 ** 100 % 97"), "16");
}

#[test]
fn test_imaginary_and_complex() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "2i"), "2i");
    assert_eq!(run_repr(&mut c, "1 + 2i"), "(1+2i)");
    assert_eq!(run_repr(&mut c, "(1 + 2i) * (3 + 4i)"), "(-5+10i)");
    assert_eq!(run_repr(&mut c, "abs(3 + 4i)"), "5.0");
}

#[test]
fn test_regex_literals() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "`a+b`.test('caaab')"), "true");
    assert_eq!(run_repr(&mut c, "`x+`.test('yyy')"), "false");
    assert_eq!(run_repr(&mut c, "`[0-9]+`.find('ab 123 cd')"), "'123'");
    assert_eq!(
        run_repr(&mut c, "`[a-z]+`.findall('ab 12 cd')"),
        "['ab', 'cd']"
    );
}

#[test]
fn test_unicode_operator_aliases() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "2 \u{2208} [1, 2]"), "true");
    assert_eq!(run_repr(&mut c, "true \u{2227} false"), "false");
    assert_eq!(run_repr(&mut c, "true \u{2228} false"), "true");
}
