// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! In-memory type oracle.
//!
//! Serves packages registered as host source text. Overlay entries are read
//! like any other file, so synthesized stand-ins become visible exactly as
//! they would to an external type checker.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;

use super::runtime::runtime_sources;
use super::source::{read_package, PackageSource, SourceFile};
use super::{LoadRequest, LoadTarget, LoadedPackage, OracleDiagnostic, OracleError, TypeOracle};
use crate::config::ResolverConfig;
use crate::overlay::{parent_dir, Overlay};
use crate::types::PackageScope;

#[derive(Debug, Default)]
struct StoredPackage {
    dir: Option<PathBuf>,
    files: Vec<(PathBuf, String)>,
    diagnostics: Vec<OracleDiagnostic>,
}

/// An oracle over registered source text.
#[derive(Debug, Default)]
pub struct MemoryOracle {
    /// Module root directory and module path, for directories that have no
    /// registered files (template-only packages).
    module: Option<(PathBuf, String)>,
    packages: RefCell<IndexMap<String, StoredPackage>>,
    dirs: RefCell<IndexMap<PathBuf, String>>,
    failures: RefCell<HashMap<String, String>>,
    loads: Cell<usize>,
    log: RefCell<Vec<LoadTarget>>,
}

type Memo = RefCell<HashMap<String, Option<Rc<PackageScope>>>>;

impl MemoryOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// An oracle that already knows the runtime package and the standard
    /// packages of its render contract.
    pub fn with_runtime(config: &ResolverConfig) -> Self {
        let oracle = Self::new();
        for pkg in runtime_sources(config) {
            let file = Path::new("pkg/mod").join(&pkg.path).join(&pkg.file_name);
            oracle.add_file(&pkg.path, file, pkg.text);
        }
        oracle
    }

    /// Map directories under `root` to `module_path/<relative dir>`.
    pub fn with_module(mut self, root: impl Into<PathBuf>, module_path: impl Into<String>) -> Self {
        self.module = Some((root.into(), module_path.into()));
        self
    }

    /// Register a source file of package `import_path`. The file's directory
    /// becomes the package directory.
    pub fn add_file(&self, import_path: &str, file: impl Into<PathBuf>, text: impl Into<String>) {
        let file = file.into();
        let dir = parent_dir(&file).to_path_buf();
        self.dirs
            .borrow_mut()
            .insert(dir.clone(), import_path.to_string());
        let mut packages = self.packages.borrow_mut();
        let pkg = packages.entry(import_path.to_string()).or_default();
        pkg.dir = Some(dir);
        match pkg.files.iter_mut().find(|(p, _)| *p == file) {
            Some(existing) => existing.1 = text.into(),
            None => pkg.files.push((file, text.into())),
        }
    }

    /// Report `diagnostic` every time `import_path` is loaded.
    pub fn add_diagnostic(&self, import_path: &str, diagnostic: OracleDiagnostic) {
        self.packages
            .borrow_mut()
            .entry(import_path.to_string())
            .or_default()
            .diagnostics
            .push(diagnostic);
    }

    /// Make every load of `import_path` fail outright.
    pub fn fail(&self, import_path: &str, message: impl Into<String>) {
        self.failures
            .borrow_mut()
            .insert(import_path.to_string(), message.into());
    }

    /// Number of top-level loads served so far.
    pub fn load_count(&self) -> usize {
        self.loads.get()
    }

    /// Targets of all top-level loads, in order.
    pub fn loads(&self) -> Vec<LoadTarget> {
        self.log.borrow().clone()
    }

    fn path_for_dir(&self, dir: &Path) -> Option<String> {
        if let Some(path) = self.dirs.borrow().get(dir) {
            return Some(path.clone());
        }
        let (root, module) = self.module.as_ref()?;
        let rel = dir.strip_prefix(root).ok()?;
        let rel = rel.to_str()?.replace('\\', "/");
        if rel.is_empty() || rel == "." {
            Some(module.clone())
        } else {
            Some(format!("{}/{}", module, rel.trim_start_matches("./")))
        }
    }

    fn dir_for_path(&self, path: &str) -> Option<PathBuf> {
        if let Some(dir) = self.packages.borrow().get(path).and_then(|p| p.dir.clone()) {
            return Some(dir);
        }
        let (root, module) = self.module.as_ref()?;
        if path == module {
            return Some(root.clone());
        }
        let rel = path.strip_prefix(module.as_str())?.strip_prefix('/')?;
        Some(root.join(rel))
    }

    fn read(
        &self,
        path: &str,
        dir: Option<&Path>,
        overlay: Option<&Overlay>,
        memo: &Memo,
        visiting: &RefCell<Vec<String>>,
    ) -> Result<(PackageSource, Vec<OracleDiagnostic>), OracleError> {
        if let Some(message) = self.failures.borrow().get(path) {
            return Err(OracleError::Failed {
                target: path.to_string(),
                message: message.clone(),
            });
        }

        let (mut files, stored_diagnostics) = match self.packages.borrow().get(path) {
            Some(pkg) => (pkg.files.clone(), pkg.diagnostics.clone()),
            None => (Vec::new(), Vec::new()),
        };
        if let (Some(overlay), Some(dir)) = (overlay, dir) {
            for (file, content) in overlay.in_dir(dir) {
                match files.iter_mut().find(|(p, _)| p == file) {
                    Some(existing) => existing.1 = content.to_string(),
                    None => files.push((file.to_path_buf(), content.to_string())),
                }
            }
        }
        if files.is_empty() {
            return Err(OracleError::NoPackage(path.to_string()));
        }

        let sources: Vec<SourceFile<'_>> = files
            .iter()
            .map(|(p, text)| SourceFile { path: p, text })
            .collect();
        let fallback = path.rsplit('/').next().unwrap_or(path);

        visiting.borrow_mut().push(path.to_string());
        let imports = |dep: &str| self.dependency(dep, overlay, memo, visiting);
        let source = read_package(path, fallback, &sources, &imports);
        visiting.borrow_mut().pop();
        Ok((source, stored_diagnostics))
    }

    fn dependency(
        &self,
        path: &str,
        overlay: Option<&Overlay>,
        memo: &Memo,
        visiting: &RefCell<Vec<String>>,
    ) -> Option<Rc<PackageScope>> {
        if let Some(hit) = memo.borrow().get(path) {
            return hit.clone();
        }
        if visiting.borrow().iter().any(|v| v == path) {
            // Import cycle; the importing package sees an empty scope.
            return Some(Rc::new(PackageScope::new()));
        }
        let dir = self.dir_for_path(path);
        let scope = self
            .read(path, dir.as_deref(), overlay, memo, visiting)
            .ok()
            .map(|(source, _)| Rc::new(source.scope));
        memo.borrow_mut().insert(path.to_string(), scope.clone());
        scope
    }
}

impl TypeOracle for MemoryOracle {
    fn load(&self, request: LoadRequest<'_>) -> Result<LoadedPackage, OracleError> {
        self.loads.set(self.loads.get() + 1);
        self.log.borrow_mut().push(request.target.clone());

        let (path, dir) = match request.target {
            LoadTarget::Path(path) => (path.clone(), self.dir_for_path(path)),
            LoadTarget::Directory(dir) => match self.path_for_dir(dir) {
                Some(path) => (path, Some(dir.clone())),
                None => return Err(OracleError::NoPackage(dir.display().to_string())),
            },
        };

        let memo = Memo::default();
        let visiting = RefCell::new(Vec::new());
        let (source, stored) = self.read(&path, dir.as_deref(), request.overlay, &memo, &visiting)?;
        let mut diagnostics = source.diagnostics;
        diagnostics.extend(stored);
        let name = source
            .name
            .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(&path).to_string());
        Ok(LoadedPackage {
            path,
            name,
            scope: source.scope,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;

    fn overlay_with(path: &str, text: &str) -> Overlay {
        let mut overlay = Overlay::new();
        overlay.insert(path.into(), text.into());
        overlay
    }

    #[test]
    fn test_runtime_is_loadable_by_path() {
        let oracle = MemoryOracle::with_runtime(&ResolverConfig::default());
        let target = LoadTarget::Path("github.com/a-h/templ".into());
        let pkg = oracle
            .load(LoadRequest {
                target: &target,
                overlay: None,
            })
            .unwrap();
        assert_eq!(pkg.name, "templ");
        assert!(pkg.diagnostics.is_empty(), "{:?}", pkg.diagnostics);
        assert!(pkg.scope.lookup("Component").is_some());
        assert_eq!(oracle.load_count(), 1);
    }

    #[test]
    fn test_overlay_only_package_via_module() {
        let oracle = MemoryOracle::with_runtime(&ResolverConfig::default()).with_module("proj", "example.com/app");
        let overlay = overlay_with(
            "proj/ui/button_templ.go",
            "package ui\n\nimport \"github.com/a-h/templ\"\n\nfunc Button(title string) templ.Component {\n\treturn templ.NopComponent\n}\n",
        );
        let target = LoadTarget::Directory("proj/ui".into());
        let pkg = oracle
            .load(LoadRequest {
                target: &target,
                overlay: Some(&overlay),
            })
            .unwrap();
        assert_eq!(pkg.path, "example.com/app/ui");
        assert!(pkg.diagnostics.is_empty(), "{:?}", pkg.diagnostics);
        let Some(SymbolKind::Func(sig)) = pkg.scope.lookup("Button").map(|s| &s.kind) else {
            panic!("Button missing");
        };
        assert_eq!(sig.results[0].ty.to_string(), "templ.Component");
    }

    #[test]
    fn test_without_overlay_stand_ins_are_invisible() {
        let oracle = MemoryOracle::new().with_module("proj", "example.com/app");
        oracle.add_file("example.com/app/ui", "proj/ui/types.go", "package ui\n\ntype Card struct{}\n");
        let target = LoadTarget::Directory("proj/ui".into());
        let pkg = oracle
            .load(LoadRequest {
                target: &target,
                overlay: None,
            })
            .unwrap();
        assert!(pkg.scope.lookup("Card").is_some());
        assert!(pkg.scope.lookup("Button").is_none());
    }

    #[test]
    fn test_unknown_and_failing_packages() {
        let oracle = MemoryOracle::new();
        let target = LoadTarget::Path("example.com/nowhere".into());
        let request = LoadRequest {
            target: &target,
            overlay: None,
        };
        assert_eq!(
            oracle.load(request).unwrap_err(),
            OracleError::NoPackage("example.com/nowhere".into())
        );

        oracle.add_file("example.com/broken", "ext/broken/b.go", "package broken\n");
        oracle.fail("example.com/broken", "exit status 1");
        let target = LoadTarget::Path("example.com/broken".into());
        let err = oracle
            .load(LoadRequest {
                target: &target,
                overlay: None,
            })
            .unwrap_err();
        assert!(matches!(err, OracleError::Failed { .. }));
    }

    #[test]
    fn test_injected_diagnostics_are_reported() {
        let oracle = MemoryOracle::new();
        oracle.add_file("example.com/w", "ext/w/w.go", "package w\n");
        oracle.add_diagnostic("example.com/w", OracleDiagnostic::new("something odd"));
        let target = LoadTarget::Path("example.com/w".into());
        let pkg = oracle
            .load(LoadRequest {
                target: &target,
                overlay: None,
            })
            .unwrap();
        assert_eq!(pkg.diagnostics, vec![OracleDiagnostic::new("something odd")]);
    }

    #[test]
    fn test_import_cycle_does_not_recurse_forever() {
        let oracle = MemoryOracle::new();
        oracle.add_file("example.com/a", "ext/a/a.go", "package a\n\nimport \"example.com/b\"\n\nvar X b.T\n\ntype T int\n");
        oracle.add_file("example.com/b", "ext/b/b.go", "package b\n\nimport \"example.com/a\"\n\nvar Y a.T\n\ntype T int\n");
        let target = LoadTarget::Path("example.com/a".into());
        let pkg = oracle
            .load(LoadRequest {
                target: &target,
                overlay: None,
            })
            .unwrap();
        assert!(pkg.scope.lookup("X").is_some());
    }
}
