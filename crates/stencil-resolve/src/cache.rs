// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Package cache over the type oracle.
//!
//! Every package is loaded at most once per cache generation. Internal
//! (template-owning) packages are loaded with the overlay of synthesized
//! stand-ins; external packages never see it. Registering an overlay entry
//! starts a new generation: all loaded packages and resolved signatures are
//! dropped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::oracle::{LoadRequest, LoadTarget, LoadedPackage, OracleDiagnostic, TypeOracle};
use crate::overlay::{is_overlay_path, Overlay};
use crate::signature::ComponentSignature;

/// Whether a package owns template files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadScope {
    Internal,
    External,
}

pub struct PackageCache {
    oracle: Rc<dyn TypeOracle>,
    config: ResolverConfig,
    overlay: Overlay,
    packages: HashMap<LoadTarget, Rc<LoadedPackage>>,
    signatures: HashMap<String, Rc<ComponentSignature>>,
}

impl PackageCache {
    pub fn new(oracle: Rc<dyn TypeOracle>, config: ResolverConfig) -> Self {
        Self {
            oracle,
            config,
            overlay: Overlay::new(),
            packages: HashMap::new(),
            signatures: HashMap::new(),
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Add or replace a stand-in file. Any registration invalidates every
    /// loaded package and every resolved signature.
    pub fn register_overlay(&mut self, path: PathBuf, content: String) {
        let changed = self.overlay.insert(path.clone(), content);
        debug!(
            path = %path.display(),
            changed,
            dropped_packages = self.packages.len(),
            dropped_signatures = self.signatures.len(),
            "overlay registered"
        );
        self.packages.clear();
        self.signatures.clear();
    }

    /// Drop loaded packages and signatures; overlays are kept.
    pub fn clear(&mut self) {
        self.packages.clear();
        self.signatures.clear();
    }

    pub fn is_loaded(&self, target: &LoadTarget) -> bool {
        self.packages.contains_key(target)
    }

    /// Load a package, at most once per generation.
    pub fn load(&mut self, target: &LoadTarget, scope: LoadScope) -> Result<Rc<LoadedPackage>, ResolveError> {
        if let Some(hit) = self.packages.get(target) {
            trace!(%target, "package cache hit");
            return Ok(hit.clone());
        }

        let overlay = match scope {
            LoadScope::Internal => Some(&self.overlay),
            LoadScope::External => None,
        };
        let request = LoadRequest { target, overlay };
        let mut package = self
            .oracle
            .load(request)
            .map_err(|e| ResolveError::load(target.to_string(), vec![e.to_string()]))?;

        let total = package.diagnostics.len();
        let surviving: Vec<String> = package
            .diagnostics
            .iter()
            .filter(|d| !self.is_synthesis_artifact(d))
            .map(ToString::to_string)
            .collect();
        debug!(
            %target,
            package = %package.path,
            ?scope,
            overlay_entries = overlay.map_or(0, Overlay::len),
            suppressed = total - surviving.len(),
            "package loaded"
        );
        if !surviving.is_empty() {
            return Err(ResolveError::load(package.path.clone(), surviving));
        }
        package.diagnostics.clear();

        let package = Rc::new(package);
        self.packages.insert(target.clone(), package.clone());
        Ok(package)
    }

    /// Diagnostics caused by synthesis rather than by the author's code.
    /// A positioned diagnostic is judged by its file alone: it is an artifact
    /// only if it sits in a stand-in. An unpositioned one is an artifact if it
    /// names a stand-in, or is an unused or mis-cased import of the runtime
    /// package the synthesizer added.
    fn is_synthesis_artifact(&self, diagnostic: &OracleDiagnostic) -> bool {
        if let Some(file) = &diagnostic.file {
            return self.overlay.contains(file) || is_overlay_path(file, &self.config);
        }
        if self.overlay.iter().any(|(path, _)| diagnostic.mentions(path)) {
            return true;
        }
        let runtime = &self.config.runtime_package;
        let message = &diagnostic.message;
        let quoted = format!("\"{}\"", runtime);
        if message.contains(&quoted) && message.contains("imported") && message.contains("not used") {
            return true;
        }
        let lower = message.to_lowercase();
        lower.contains(&runtime.to_lowercase()) && !message.contains(runtime.as_str())
    }

    pub fn signature(&self, key: &str) -> Option<Rc<ComponentSignature>> {
        let hit = self.signatures.get(key).cloned();
        if hit.is_some() {
            trace!(key, "signature cache hit");
        }
        hit
    }

    pub fn store_signature(&mut self, signature: ComponentSignature) -> Rc<ComponentSignature> {
        let signature = Rc::new(signature);
        self.signatures
            .insert(signature.qualified_name().to_string(), signature.clone());
        signature
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MemoryOracle;
    use crate::signature::ComponentKind;
    use stencil_ast::Position;

    fn setup() -> (Rc<MemoryOracle>, PackageCache) {
        let config = ResolverConfig::default();
        let oracle = Rc::new(MemoryOracle::with_runtime(&config).with_module("proj", "example.com/app"));
        oracle.add_file("example.com/app/ui", "proj/ui/types.go", "package ui\n\ntype Card struct{}\n");
        let cache = PackageCache::new(oracle.clone(), config);
        (oracle, cache)
    }

    fn ui() -> LoadTarget {
        LoadTarget::Directory("proj/ui".into())
    }

    #[test]
    fn test_load_is_memoized() {
        let (oracle, mut cache) = setup();
        cache.load(&ui(), LoadScope::Internal).unwrap();
        cache.load(&ui(), LoadScope::Internal).unwrap();
        assert_eq!(oracle.load_count(), 1);
        assert!(cache.is_loaded(&ui()));
    }

    #[test]
    fn test_register_overlay_invalidates() {
        let (oracle, mut cache) = setup();
        cache.load(&ui(), LoadScope::Internal).unwrap();
        cache.store_signature(ComponentSignature::new(
            "example.com/app/ui",
            "Card",
            "example.com/app/ui.Card",
            ComponentKind::Struct,
            false,
            vec![],
        ));
        cache.register_overlay("proj/ui/card_templ.go".into(), "package ui\n".into());
        assert!(!cache.is_loaded(&ui()));
        assert!(cache.signature("example.com/app/ui.Card").is_none());
        cache.load(&ui(), LoadScope::Internal).unwrap();
        assert_eq!(oracle.load_count(), 2);
    }

    #[test]
    fn test_clear_keeps_overlay() {
        let (_, mut cache) = setup();
        cache.register_overlay("proj/ui/card_templ.go".into(), "package ui\n".into());
        cache.clear();
        assert_eq!(cache.overlay().len(), 1);
    }

    #[test]
    fn test_external_loads_never_see_overlay() {
        let (oracle, mut cache) = setup();
        cache.register_overlay(
            "proj/ui/button_templ.go".into(),
            "package ui\n\nfunc Button() {}\n".into(),
        );
        let by_path = LoadTarget::Path("example.com/app/ui".into());
        let external = cache.load(&by_path, LoadScope::External).unwrap();
        assert!(external.scope.lookup("Button").is_none());
        let internal = cache.load(&ui(), LoadScope::Internal).unwrap();
        assert!(internal.scope.lookup("Button").is_some());
        assert_eq!(oracle.load_count(), 2);
    }

    #[test]
    fn test_stand_in_diagnostics_are_suppressed() {
        let (oracle, mut cache) = setup();
        cache.register_overlay(
            "proj/ui/button_templ.go".into(),
            "package ui\n\nimport \"fmt\"\n\nfunc Button(x Missing) {}\n".into(),
        );
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::new("proj/ui/button_templ.go:9:2: declared and not used: v"),
        );
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::new("\"github.com/a-h/templ\" imported and not used"),
        );
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::new("case-insensitive import collision: \"github.com/A-H/templ\""),
        );
        let pkg = cache.load(&ui(), LoadScope::Internal).unwrap();
        assert!(pkg.diagnostics.is_empty());
    }

    #[test]
    fn test_other_diagnostics_fail_the_load() {
        let (oracle, mut cache) = setup();
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::at("proj/ui/types.go", Position { line: 3, col: 6 }, "undefined: Widget"),
        );
        let err = cache.load(&ui(), LoadScope::Internal).unwrap_err();
        match err.kind {
            crate::error::ResolveErrorKind::Load { package, diagnostics } => {
                assert_eq!(package, "example.com/app/ui");
                assert_eq!(diagnostics, vec!["proj/ui/types.go:3:6: undefined: Widget".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!cache.is_loaded(&ui()));
    }

    #[test]
    fn test_author_file_naming_a_stand_in_fails_the_load() {
        let (oracle, mut cache) = setup();
        cache.register_overlay("proj/ui/button_templ.go".into(), "package ui\n".into());
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::at(
                "proj/ui/types.go",
                Position { line: 3, col: 6 },
                "Button redeclared in this block\n\tproj/ui/button_templ.go:7:6: other declaration of Button",
            ),
        );
        let err = cache.load(&ui(), LoadScope::Internal).unwrap_err();
        assert!(err.is_load());
        assert!(err.to_string().contains("proj/ui/types.go:3:6: Button redeclared"));
    }

    #[test]
    fn test_unused_runtime_import_in_author_file_fails_the_load() {
        let (oracle, mut cache) = setup();
        cache.register_overlay("proj/ui/button_templ.go".into(), "package ui\n".into());
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::at(
                "proj/ui/helpers.go",
                Position { line: 3, col: 8 },
                "\"github.com/a-h/templ\" imported and not used",
            ),
        );
        assert!(cache.load(&ui(), LoadScope::Internal).unwrap_err().is_load());
    }

    #[test]
    fn test_positioned_stand_in_diagnostic_is_suppressed() {
        let (oracle, mut cache) = setup();
        cache.register_overlay("proj/ui/button_templ.go".into(), "package ui\n".into());
        oracle.add_diagnostic(
            "example.com/app/ui",
            OracleDiagnostic::at(
                "proj/ui/button_templ.go",
                Position { line: 3, col: 8 },
                "\"github.com/a-h/templ\" imported and not used",
            ),
        );
        assert!(cache.load(&ui(), LoadScope::Internal).is_ok());
    }
}
