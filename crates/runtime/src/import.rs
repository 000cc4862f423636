//! Module import
//!
//! Dotted names resolve through a process-wide cache, then the fixed
//! roster of internally linked modules, then a filesystem search along
//! the configured path list. A directory becomes an empty module pinned
//! to its real path; a `<name>.ks` file is read, lexed, parsed,
//! compiled, and executed with the module's namespace as its locals.

use crate::context::Context;
use crate::exc::{ExcKind, XResult};
use crate::obj::{Obj, Payload};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Payload of a `module` value.
pub struct ModuleData {
    /// Fully qualified name.
    pub name: String,
    /// Resolved filesystem path (empty for internal modules).
    pub path: String,
    /// The attribute namespace (a dict object, shared with the module
    /// body's locals).
    pub ns: Obj,
}

impl Context {
    /// Create an empty module.
    pub fn new_module(&mut self, name: &str, path: &str) -> Obj {
        let ns = self.new_dict();
        Obj::new(
            &self.types.module,
            Payload::Module(ModuleData {
                name: name.to_string(),
                path: path.to_string(),
                ns,
            }),
            false,
        )
    }

    /// Import a dotted module name, using the cache.
    pub fn import_module(&mut self, name: &str) -> XResult<Obj> {
        if let Some(m) = self.modules.get(name) {
            return Ok(m.clone());
        }

        // Fixed roster of internally linked modules.
        if name == "ucd" {
            let m = crate::ucd_module::build(self)?;
            self.modules.insert(name.to_string(), m.clone());
            return Ok(m);
        }

        let mut parts = name.split('.');
        let first = parts.next().unwrap_or(name);

        let base = match self.modules.get(first) {
            Some(m) => m.clone(),
            None => {
                let m = self.import_base(first)?;
                self.modules.insert(first.to_string(), m.clone());
                m
            }
        };

        // Walk (and lazily load) the remaining segments.
        let mut cur = base;
        let mut fullname = first.to_string();
        for seg in parts {
            fullname.push('.');
            fullname.push_str(seg);
            let existing = cur
                .as_module()
                .and_then(|m| self.dict_get_str(&m.ns, seg));
            let next = match existing {
                Some(v) => v,
                None => {
                    let (ppath, pname) = match cur.as_module() {
                        Some(m) => (m.path.clone(), m.name.clone()),
                        None => {
                            return Err(self.throw(
                                ExcKind::ImportError,
                                format!("Failed to import '{seg}' from '{fullname}'"),
                            ));
                        }
                    };
                    match self.import_place(Path::new(&ppath), &pname, seg)? {
                        Some(m) => {
                            if let Some(pm) = cur.as_module() {
                                let ns = pm.ns.clone();
                                self.dict_set_str(&ns, seg, m.clone())?;
                            }
                            m
                        }
                        None => {
                            return Err(self.throw(
                                ExcKind::ImportError,
                                format!("Failed to import '{seg}' from '{fullname}'"),
                            ));
                        }
                    }
                }
            };
            cur = next;
        }

        self.modules.insert(name.to_string(), cur.clone());
        Ok(cur)
    }

    /// Resolve a top-level module along the search path.
    fn import_base(&mut self, name: &str) -> XResult<Obj> {
        for dir in self.path.clone() {
            if let Some(m) = self.import_place(&dir, "", name)? {
                return Ok(m);
            }
        }
        Err(self.throw(
            ExcKind::ImportError,
            format!("Failed to import '{name}'"),
        ))
    }

    /// Try one directory: `<dir>/<name>` as a directory module, then
    /// `<dir>/<name>.ks` as a source module. `Ok(None)` means not here.
    fn import_place(
        &mut self,
        dir: &Path,
        parent_name: &str,
        name: &str,
    ) -> XResult<Option<Obj>> {
        let fullname = if parent_name.is_empty() {
            name.to_string()
        } else {
            format!("{parent_name}.{name}")
        };

        let as_dir: PathBuf = dir.join(name);
        if as_dir.is_dir() {
            let real = as_dir
                .canonicalize()
                .unwrap_or_else(|_| as_dir.clone())
                .to_string_lossy()
                .to_string();
            debug!(module = %fullname, path = %real, "directory module");
            return Ok(Some(self.new_module(&fullname, &real)));
        }

        let as_file = dir.join(format!("{name}.ks"));
        if as_file.is_file() {
            let m = self.load_module_file(&fullname, &as_file)?;
            return Ok(Some(m));
        }
        Ok(None)
    }

    /// Read, compile, and execute a module source file; its namespace is
    /// the executed code's locals.
    fn load_module_file(&mut self, fullname: &str, path: &Path) -> XResult<Obj> {
        let src = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                return Err(self.throw(
                    ExcKind::IoError,
                    format!("Failed to read '{}': {e}", path.display()),
                ));
            }
        };
        let src = src.strip_prefix('\u{feff}').unwrap_or(&src).to_string();
        let fname = path.to_string_lossy().to_string();
        debug!(module = %fullname, path = %fname, "loading module");

        let prog = match kestrel_compiler::parse_prog(&fname, &src) {
            Ok(p) => p,
            Err(e) => {
                return Err(self.throw(ExcKind::SyntaxError, e.to_string()));
            }
        };
        let code = crate::codegen::compile(self, &fname, &src, &prog, None)?;

        let real = path
            .canonicalize()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or(fname);
        let module = self.new_module(fullname, &real);
        let ns = match module.as_module() {
            Some(m) => m.ns.clone(),
            None => unreachable!("just created a module"),
        };
        let name_obj = self.str_(fullname);
        self.dict_set_str(&ns, "__name", name_obj)?;
        let path_obj = self.str_(real.clone());
        self.dict_set_str(&ns, "__path", path_obj)?;

        self.exec_code(&code, &ns)?;
        Ok(module)
    }
}
