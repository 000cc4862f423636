//! Container semantics: insertion-ordered dicts, sequences, hashing.

mod common;

use common::{ctx, exc_kind, run, run_err, run_repr};

#[test]
fn test_dict_preserves_insertion_order_at_scale() {
    let mut c = ctx();
    run(&mut c, "d = {}; for i in range(300) { d[i] = i * 10 }");
    assert_eq!(run_repr(&mut c, "len(d)"), "300");
    assert_eq!(run_repr(&mut c, "d[0]"), "0");
    assert_eq!(run_repr(&mut c, "d[250]"), "2500");
    // Iteration order equals insertion order even after many resizes
    // (and the bucket width has moved past the 8-bit variant).
    run(&mut c, "ks = list(d)");
    assert_eq!(run_repr(&mut c, "ks[0]"), "0");
    assert_eq!(run_repr(&mut c, "ks[299]"), "299");
    assert_eq!(run_repr(&mut c, "ks[150]"), "150");
}

#[test]
fn test_dict_delete_and_reinsert_order() {
    let mut c = ctx();
    run(&mut c, "d = {'a': 1, 'b': 2, 'c': 3}; del d['b']; d['b'] = 9");
    assert_eq!(run_repr(&mut c, "list(d)"), "['a', 'c', 'b']");
    assert_eq!(run_repr(&mut c, "d['b']"), "9");
}

#[test]
fn test_dict_survives_churn() {
    // Heavy delete/insert churn exercises tombstones and compaction.
    let mut c = ctx();
    run(
        &mut c,
        "d = {}\n\
         for i in range(100) { d[i] = i }\n\
         for i in range(90) { del d[i] }\n\
         for i in range(200, 210) { d[i] = i }",
    );
    assert_eq!(run_repr(&mut c, "len(d)"), "20");
    assert_eq!(
        run_repr(&mut c, "list(d)"),
        "[90, 91, 92, 93, 94, 95, 96, 97, 98, 99, 200, 201, 202, 203, 204, 205, 206, 207, 208, 209]"
    );
}

#[test]
fn test_dict_missing_key_raises() {
    let mut c = ctx();
    let exc = run_err(&mut c, "d = {}; d['missing']");
    assert_eq!(exc_kind(&exc), "KeyError");
    let exc = run_err(&mut c, "d2 = {}; del d2['nope']");
    assert_eq!(exc_kind(&exc), "KeyError");
}

#[test]
fn test_cross_kind_numeric_keys_collide() {
    // 1, 1.0, and true are the same mapping key.
    let mut c = ctx();
    run(&mut c, "d = {}; d[1] = 'int'; d[1.0] = 'float'; d[true] = 'bool'");
    assert_eq!(run_repr(&mut c, "len(d)"), "1");
    assert_eq!(run_repr(&mut c, "d[1]"), "'bool'");
}

#[test]
fn test_hash_value_unification() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "hash(1) == hash(1.0)"), "true");
    assert_eq!(run_repr(&mut c, "hash(1) == hash(true)"), "true");
    assert_eq!(run_repr(&mut c, "hash('a') == hash('a')"), "true");
    assert_eq!(run_repr(&mut c, "hash((1, 'a')) == hash((1, 'a'))"), "true");
}

#[test]
fn test_unhashable_containers() {
    let mut c = ctx();
    let exc = run_err(&mut c, "hash([1])");
    assert_eq!(exc_kind(&exc), "TypeError");
    let exc = run_err(&mut c, "d = {}; d[[1]] = 2");
    assert_eq!(exc_kind(&exc), "TypeError");
}

#[test]
fn test_list_push_invariant() {
    let mut c = ctx();
    run(&mut c, "L = []");
    for i in 0..10 {
        run(&mut c, &format!("L.push({i})"));
        assert_eq!(run_repr(&mut c, "len(L)"), format!("{}", i + 1));
        assert_eq!(run_repr(&mut c, "L[len(L) - 1]"), format!("{i}"));
    }
}

#[test]
fn test_list_ops() {
    let mut c = ctx();
    run(&mut c, "L = [3, 1, 2]");
    assert_eq!(run_repr(&mut c, "L.pop()"), "2");
    assert_eq!(run_repr(&mut c, "L"), "[3, 1]");
    assert_eq!(run_repr(&mut c, "L.index(1)"), "1");
    run(&mut c, "L.reverse()");
    assert_eq!(run_repr(&mut c, "L"), "[1, 3]");
    assert_eq!(run_repr(&mut c, "[1] + [2, 3]"), "[1, 2, 3]");
    assert_eq!(run_repr(&mut c, "[0] * 3"), "[0, 0, 0]");
}

#[test]
fn test_tuple_list_round_trip() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "list(tuple([1, 2])) == [1, 2]"), "true");
    assert_eq!(run_repr(&mut c, "tuple(list((1, 2))) == (1, 2)"), "true");
    assert_eq!(run_repr(&mut c, "(1,)"), "(1,)");
    assert_eq!(run_repr(&mut c, "()"), "()");
}

#[test]
fn test_negative_indexing_and_range_errors() {
    let mut c = ctx();
    run(&mut c, "L = [10, 20, 30]");
    assert_eq!(run_repr(&mut c, "L[-1]"), "30");
    assert_eq!(run_repr(&mut c, "L[-3]"), "10");
    let exc = run_err(&mut c, "L[3]");
    assert_eq!(exc_kind(&exc), "IndexError");
    let exc = run_err(&mut c, "L[-4]");
    assert_eq!(exc_kind(&exc), "IndexError");
}

#[test]
fn test_slices() {
    let mut c = ctx();
    run(&mut c, "L = [0, 1, 2, 3, 4, 5]");
    assert_eq!(run_repr(&mut c, "L[1:3]"), "[1, 2]");
    assert_eq!(run_repr(&mut c, "L[::2]"), "[0, 2, 4]");
    assert_eq!(run_repr(&mut c, "L[::-1]"), "[5, 4, 3, 2, 1, 0]");
    assert_eq!(run_repr(&mut c, "L[4:]"), "[4, 5]");
    assert_eq!(run_repr(&mut c, "L[:2]"), "[0, 1]");
    assert_eq!(run_repr(&mut c, "'hello'[1:4]"), "'ell'");
    assert_eq!(run_repr(&mut c, "(1, 2, 3)[1:]"), "(2, 3)");
}

#[test]
fn test_slice_step_zero_throws() {
    let mut c = ctx();
    let exc = run_err(&mut c, "[1, 2][::0]");
    assert_eq!(exc_kind(&exc), "ValError");
    let exc = run_err(&mut c, "'abc'[::0]");
    assert_eq!(exc_kind(&exc), "ValError");
}

#[test]
fn test_sets() {
    let mut c = ctx();
    run(&mut c, "s = {1, 2, 3}");
    assert_eq!(run_repr(&mut c, "len(s)"), "3");
    assert_eq!(run_repr(&mut c, "2 in s"), "true");
    run(&mut c, "s.add(4); s.remove(1)");
    assert_eq!(run_repr(&mut c, "list(s)"), "[2, 3, 4]");
    assert_eq!(run_repr(&mut c, "list({1, 2} | {2, 3})"), "[1, 2, 3]");
    assert_eq!(run_repr(&mut c, "list({1, 2} & {2, 3})"), "[2]");
    assert_eq!(run_repr(&mut c, "list({1, 2} - {2})"), "[1]");
    assert_eq!(run_repr(&mut c, "list({1, 2} ^ {2, 3})"), "[1, 3]");
}

#[test]
fn test_int_str_round_trip_all_bases() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "int('ff', 16)"), "255");
    assert_eq!(run_repr(&mut c, "int('0xff', 16)"), "255");
    assert_eq!(run_repr(&mut c, "int('777', 8)"), "511");
    assert_eq!(run_repr(&mut c, "int('1010', 2)"), "10");
    assert_eq!(run_repr(&mut c, "int('42', 10)"), "42");
    assert_eq!(run_repr(&mut c, "int('-123')"), "-123");
}

#[test]
fn test_float_repr_round_trip() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "float(repr(0.1)) == 0.1"), "true");
    assert_eq!(run_repr(&mut c, "float(repr(1.0)) == 1.0"), "true");
    assert_eq!(run_repr(&mut c, "float(repr(1e300)) == 1e300"), "true");
    assert_eq!(run_repr(&mut c, "float('2.5')"), "2.5");
}

#[test]
fn test_conversions() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "int(2.9)"), "2");
    assert_eq!(run_repr(&mut c, "int(true)"), "1");
    assert_eq!(run_repr(&mut c, "float(2)"), "2.0");
    assert_eq!(run_repr(&mut c, "str(42)"), "'42'");
    assert_eq!(run_repr(&mut c, "bool(0)"), "false");
    assert_eq!(run_repr(&mut c, "bool([])"), "false");
    assert_eq!(run_repr(&mut c, "bool([0])"), "true");
    assert_eq!(run_repr(&mut c, "bytes('AB')"), "b'AB'");
    assert_eq!(run_repr(&mut c, "bytes([65, 66])"), "b'AB'");
    assert_eq!(run_repr(&mut c, "list('ab')"), "['a', 'b']");
}

#[test]
fn test_range_behavior() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "list(range(4))"), "[0, 1, 2, 3]");
    assert_eq!(run_repr(&mut c, "list(range(2, 5))"), "[2, 3, 4]");
    assert_eq!(run_repr(&mut c, "list(range(10, 0, -3))"), "[10, 7, 4, 1]");
    assert_eq!(run_repr(&mut c, "len(range(10, 0, -3))"), "4");
    assert_eq!(run_repr(&mut c, "range(3)[2]"), "2");
    let exc = run_err(&mut c, "range(1, 2, 0)");
    assert_eq!(exc_kind(&exc), "ValError");
}

#[test]
fn test_str_methods() {
    let mut c = ctx();
    assert_eq!(run_repr(&mut c, "'a,b,c'.split(',')"), "['a', 'b', 'c']");
    assert_eq!(run_repr(&mut c, "'-'.join(['a', 'b'])"), "'a-b'");
    assert_eq!(run_repr(&mut c, "'Hello'.upper()"), "'HELLO'");
    assert_eq!(run_repr(&mut c, "'Hello'.lower()"), "'hello'");
    assert_eq!(run_repr(&mut c, "'hello'.find('ll')"), "2");
    assert_eq!(run_repr(&mut c, "'hello'.find('z')"), "-1");
    assert_eq!(run_repr(&mut c, "'aaa'.replace('a', 'b')"), "'bbb'");
}

#[test]
fn test_dict_methods() {
    let mut c = ctx();
    run(&mut c, "d = {'a': 1, 'b': 2}");
    assert_eq!(run_repr(&mut c, "d.get('a')"), "1");
    assert_eq!(run_repr(&mut c, "d.get('z')"), "none");
    assert_eq!(run_repr(&mut c, "d.get('z', 9)"), "9");
    assert_eq!(run_repr(&mut c, "d.keys()"), "['a', 'b']");
    assert_eq!(run_repr(&mut c, "d.values()"), "[1, 2]");
    assert_eq!(run_repr(&mut c, "d.pop('a')"), "1");
    assert_eq!(run_repr(&mut c, "len(d)"), "1");
}

#[test]
fn test_dict_data_bucket_internals() {
    // Rust-level check of the width specialization and prime sizing.
    use kestrel_runtime::dict::{DictData, next_prime_at_least};
    use kestrel_runtime::obj::value_hash;

    let c = ctx();
    let mut d = DictData::new();
    for i in 0..500i64 {
        let k = c.int_i64(i);
        let h = value_hash(&k).expect("ints hash");
        d.insert(h, k, c.int_i64(i * 2));
    }
    assert_eq!(d.len(), 500);
    // Lookup still works after the width upgrades forced by 500 entries.
    let probe = c.int_i64(432);
    let h = value_hash(&probe).expect("ints hash");
    assert_eq!(
        d.get(h, &probe).and_then(|v| v.as_int().map(|x| x.to_string())),
        Some("864".to_string())
    );
    // Insertion order survives.
    let first = d.next_entry(0).expect("nonempty");
    assert_eq!(first.1.as_int().map(|v| v.to_string()), Some("0".into()));

    assert_eq!(next_prime_at_least(34), 37);
}
