//! Import system: filesystem search, caching, dotted names, builtins.

mod common;

use common::{ctx, exc_kind, run, run_err, run_repr};
use serial_test::serial;
use std::fs;

#[test]
fn test_import_source_module() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("mymod.ks"),
        "x = 42\nfunc double(n) { ret n * 2 }\n",
    )
    .expect("write module");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    run(&mut c, "import mymod");
    assert_eq!(run_repr(&mut c, "mymod.x"), "42");
    assert_eq!(run_repr(&mut c, "mymod.double(21)"), "42");
    assert_eq!(run_repr(&mut c, "mymod.__name"), "'mymod'");
}

#[test]
fn test_import_is_cached() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("counted.ks"), "hits = []\nhits.push(1)\n").expect("write module");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    run(&mut c, "import counted; a = counted");
    run(&mut c, "import counted; b = counted");
    // Same object, and the body only executed once.
    assert_eq!(run_repr(&mut c, "a === b"), "true");
    assert_eq!(run_repr(&mut c, "len(counted.hits)"), "1");
}

#[test]
fn test_dotted_import() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("pkg")).expect("mkdir");
    fs::write(dir.path().join("pkg").join("sub.ks"), "y = 'deep'\n").expect("write module");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    // `import a.b` binds the leaf under its own name.
    run(&mut c, "import pkg.sub");
    assert_eq!(run_repr(&mut c, "sub.y"), "'deep'");
    // The parent directory module gained the child as an attribute.
    run(&mut c, "import pkg");
    assert_eq!(run_repr(&mut c, "pkg.sub.y"), "'deep'");
}

#[test]
fn test_import_alias() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("longname.ks"), "v = 7\n").expect("write module");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    run(&mut c, "import longname as ln");
    assert_eq!(run_repr(&mut c, "ln.v"), "7");
}

#[test]
fn test_import_missing_module() {
    let mut c = ctx();
    let exc = run_err(&mut c, "import definitely_not_a_module_anywhere");
    assert_eq!(exc_kind(&exc), "ImportError");
}

#[test]
fn test_import_missing_segment_cites_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir(dir.path().join("pkg2")).expect("mkdir");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    let exc = run_err(&mut c, "import pkg2.nothing");
    assert_eq!(exc_kind(&exc), "ImportError");
    let msg = exc
        .as_exc()
        .map(|e| e.borrow().msg.clone())
        .unwrap_or_default();
    assert!(msg.contains("nothing"), "got {msg:?}");
}

#[test]
fn test_syntax_error_in_module_surfaces() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("broken.ks"), "x = 'unterminated\n").expect("write module");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    let exc = run_err(&mut c, "import broken");
    assert_eq!(exc_kind(&exc), "SyntaxError");
}

#[test]
fn test_module_bom_is_stripped() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("bom.ks"), "\u{feff}v = 1\n").expect("write module");

    let mut c = ctx();
    c.path.insert(0, dir.path().to_path_buf());
    run(&mut c, "import bom");
    assert_eq!(run_repr(&mut c, "bom.v"), "1");
}

#[test]
fn test_ucd_builtin_module() {
    let mut c = ctx();
    run(&mut c, "import ucd");
    assert_eq!(run_repr(&mut c, "ucd.lookup('LATIN SMALL LETTER A')"), "'a'");
    assert_eq!(
        run_repr(&mut c, "ucd.name('A')"),
        "'LATIN CAPITAL LETTER A'"
    );
    assert_eq!(run_repr(&mut c, "ucd.category('A')"), "'Lu'");
    assert_eq!(run_repr(&mut c, "ucd.category('3')"), "'Nd'");
    let exc = run_err(&mut c, "ucd.lookup('NOT A REAL NAME')");
    assert_eq!(exc_kind(&exc), "ValError");
}

#[test]
#[serial]
fn test_ks_path_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("envmod.ks"), "flag = true\n").expect("write module");

    // SAFETY: guarded by #[serial]; no other test touches the
    // environment concurrently.
    unsafe {
        std::env::set_var("KS_PATH", dir.path());
    }
    let mut c = ctx();
    unsafe {
        std::env::remove_var("KS_PATH");
    }

    assert!(c.path.first().map(|p| p == dir.path()).unwrap_or(false));
    run(&mut c, "import envmod");
    assert_eq!(run_repr(&mut c, "envmod.flag"), "true");
}
