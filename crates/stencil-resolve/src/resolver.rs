// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Component resolution.
//!
//! A component reference in a template is one of:
//!
//! - `Name`: a function, type or variable of the referencing package (or of
//!   a dot-imported package), or a local of the template body.
//! - `pkg.Name`: `Name` in the package imported as `pkg`.
//! - `v.Method`: a method or field reached through the package-level
//!   variable `v`, or through a local with a declared type.
//!
//! Resolution loads the package through the cache and turns the symbol into
//! a [`ComponentSignature`] the emitter can call.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use stencil_ast::{Span, TemplateFile};
use tracing::{debug, info};

use crate::cache::{LoadScope, PackageCache};
use crate::config::ResolverConfig;
use crate::error::{ContractViolation, ResolveError};
use crate::graph::DependencyGraph;
use crate::host::{file_imports, find_alias, implicit_name, parse_type, ImportSpec, TypeExpr};
use crate::layout::ModuleLayout;
use crate::oracle::{LoadTarget, LoadedPackage, TypeOracle};
use crate::overlay::{overlay_path, Overlay};
use crate::predicates::PredicateAnalyzer;
use crate::scope::{calls_in, LexicalScope, LocalBinding};
use crate::signature::{ComponentKind, ComponentSignature, ParameterDescriptor};
use crate::synth::synthesize;
use crate::types::{lookup_member, BasicKind, Field, Member, Signature, SymbolKind, Type};

// ============================================================================
// Reference syntax
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reference<'a> {
    Local(&'a str),
    Qualified(&'a str, &'a str),
    Malformed,
}

fn parse_reference(reference: &str) -> Reference<'_> {
    let mut parts = reference.split('.');
    let first = parts.next().unwrap_or("");
    match (parts.next(), parts.next()) {
        (None, _) if is_ident(first) => Reference::Local(first),
        (Some(second), None) if is_ident(first) && is_ident(second) => {
            Reference::Qualified(first, second)
        }
        _ => Reference::Malformed,
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of resolving one call site.
#[derive(Debug, Clone)]
pub struct CallResolution {
    /// Name of the template containing the call.
    pub template: String,
    pub reference: String,
    pub span: Span,
    pub result: Result<Rc<ComponentSignature>, ResolveError>,
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves component references for one compiler run.
pub struct ComponentResolver {
    cache: PackageCache,
    graph: DependencyGraph,
    layout: ModuleLayout,
    config: ResolverConfig,
}

impl ComponentResolver {
    pub fn new(oracle: Rc<dyn TypeOracle>, layout: ModuleLayout, config: ResolverConfig) -> Self {
        Self {
            cache: PackageCache::new(oracle, config.clone()),
            graph: DependencyGraph::new(),
            layout,
            config,
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn layout(&self) -> &ModuleLayout {
        &self.layout
    }

    pub fn overlay(&self) -> &Overlay {
        self.cache.overlay()
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Drop loaded packages and resolved signatures. Overlays and the graph
    /// are kept.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Prepare a run: build the package graph from `documents`, register a
    /// stand-in for each, and load the template packages dependencies-first.
    /// Must complete before any reference is resolved.
    pub fn preprocess(&mut self, documents: &[TemplateFile]) -> Result<(), ResolveError> {
        for document in documents {
            self.add_document(document)?;
        }
        self.graph.build_internal_packages();

        let internal: Vec<String> = self.graph.internal_packages().map(str::to_string).collect();
        let order = self
            .graph
            .topological_sort(internal.iter().map(String::as_str))?;
        for path in &order {
            self.load_package(path)?;
        }
        info!(
            documents = documents.len(),
            packages = order.len(),
            overlay_entries = self.cache.overlay().len(),
            "preprocessing complete"
        );
        Ok(())
    }

    /// Re-synthesize one document after it changed. Every cached package and
    /// signature is dropped.
    pub fn update_document(&mut self, document: &TemplateFile) -> Result<(), ResolveError> {
        self.add_document(document)?;
        self.graph.build_internal_packages();
        Ok(())
    }

    fn add_document(&mut self, document: &TemplateFile) -> Result<(), ResolveError> {
        let dir = document.dir().to_path_buf();
        let package = self.package_path_of(&dir)?;
        let declares = document.templates().next().is_some();
        self.graph.add_package(&package, Some(dir), declares);
        self.graph
            .add_template_file(&package, document.path.clone());
        for spec in file_imports(document) {
            self.graph.add_dependency(&package, &spec.path);
        }

        let name = document
            .package
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| implicit_name(&package).to_string());
        let stand_in = overlay_path(&document.path, &self.config).ok_or_else(|| {
            ResolveError::invalid_module(&document.path, "template file has no file name")
        })?;
        let content = synthesize(document, &name, &self.config);
        self.cache.register_overlay(stand_in, content);
        Ok(())
    }

    /// Resolve every component call in `document`. A package that fails to
    /// load aborts the document; other failures are reported per call.
    pub fn resolve_document(&mut self, document: &TemplateFile) -> Result<Vec<CallResolution>, ResolveError> {
        let imports = file_imports(document);
        let dir = document.dir().to_path_buf();
        let mut out = Vec::new();
        for def in document.templates() {
            for scoped in calls_in(def) {
                let call = scoped.call;
                let result = self
                    .resolve(&call.reference, &dir, &imports, &scoped.scope)
                    .map_err(|e| e.at(&document.path, call.span));
                if let Err(e) = &result {
                    if e.is_load() {
                        return Err(e.clone());
                    }
                }
                out.push(CallResolution {
                    template: def.name().to_string(),
                    reference: call.reference.clone(),
                    span: call.span,
                    result,
                });
            }
        }
        debug!(
            file = %document.path.display(),
            calls = out.len(),
            failed = out.iter().filter(|c| c.result.is_err()).count(),
            "document resolved"
        );
        Ok(out)
    }

    /// Resolve `reference` as written in a template in `dir`, whose file
    /// imports `imports`, inside `scope`.
    pub fn resolve(
        &mut self,
        reference: &str,
        dir: &Path,
        imports: &[ImportSpec],
        scope: &LexicalScope,
    ) -> Result<Rc<ComponentSignature>, ResolveError> {
        let current = self.package_path_of(dir)?;
        let result = match parse_reference(reference) {
            Reference::Local(name) => match scope.lookup(name) {
                Some(binding) => self.resolve_local(reference, binding, &current, imports),
                None => self.resolve_in_package(reference, name, &current, &current, imports),
            },
            Reference::Qualified(qualifier, name) => {
                if let Some(binding) = scope.lookup(qualifier) {
                    self.resolve_local_member(reference, binding, name, &current, imports)
                } else if let Some(spec) = find_alias(imports, qualifier) {
                    let path = spec.path.clone();
                    self.resolve_in_package(reference, name, &path, &current, &[])
                } else {
                    self.resolve_variable_member(reference, qualifier, name, &current, imports)
                }
            }
            // Looked up once as written so the failure names the reference.
            Reference::Malformed => self.resolve_in_package(reference, reference, &current, &current, &[]),
        };
        match &result {
            Ok(sig) => debug!(
                reference,
                package = %current,
                resolved = sig.qualified_name(),
                kind = ?sig.kind(),
                parameters = sig.parameters().len(),
                "component resolved"
            ),
            Err(e) => debug!(reference, package = %current, error = %e, "component not resolved"),
        }
        result
    }

    fn package_path_of(&self, dir: &Path) -> Result<String, ResolveError> {
        if let Some(node) = self.graph.package_for_dir(dir) {
            return Ok(node.path.clone());
        }
        self.layout.package_path(dir).ok_or_else(|| {
            ResolveError::invalid_module(
                dir,
                format!("directory is outside module `{}`", self.layout.module_path()),
            )
        })
    }

    fn dir_of(&self, path: &str) -> Option<PathBuf> {
        self.graph
            .node(path)
            .and_then(|n| n.dir.clone())
            .or_else(|| self.layout.dir_for(path))
    }

    /// Template packages are loaded by directory with the overlay; anything
    /// else by import path without it.
    fn load_package(&mut self, path: &str) -> Result<Rc<LoadedPackage>, ResolveError> {
        if self.graph.is_internal(path) {
            if let Some(dir) = self.dir_of(path) {
                return self
                    .cache
                    .load(&LoadTarget::Directory(dir), LoadScope::Internal);
            }
        }
        self.cache
            .load(&LoadTarget::Path(path.to_string()), LoadScope::External)
    }

    /// `name` in package `path`, falling back to dot imports.
    fn resolve_in_package(
        &mut self,
        reference: &str,
        name: &str,
        path: &str,
        current: &str,
        dot_imports: &[ImportSpec],
    ) -> Result<Rc<ComponentSignature>, ResolveError> {
        let key = format!("{}.{}", path, name);
        if let Some(hit) = self.cache.signature(&key) {
            return Ok(hit);
        }

        let package = self.load_package(path)?;
        let mut found = package.scope.lookup(name).cloned().map(|s| (package.clone(), s));
        if found.is_none() && path == current {
            for spec in dot_imports.iter().filter(|s| s.is_dot()) {
                let dotted = self.load_package(&spec.path)?;
                if let Some(symbol) = dotted.scope.lookup(name).cloned() {
                    found = Some((dotted, symbol));
                    break;
                }
            }
        }
        let Some((owner, symbol)) = found else {
            let candidates: Vec<String> = package
                .scope
                .names()
                .filter(|n| path == current || crate::types::is_exported(n))
                .map(str::to_string)
                .collect();
            return Err(ResolveError::not_found(
                reference.to_string(),
                format!("no declaration named `{}` in package `{}`", name, package.path),
                candidates,
            ));
        };

        let qualified = format!("{}.{}", owner.path, symbol.name);
        // Dot imports differ per file, so a symbol found through one is
        // cached under its owner only.
        if qualified != key {
            if let Some(hit) = self.cache.signature(&qualified) {
                return Ok(hit);
            }
        }
        let classifier = Classifier::new(&self.config, reference);
        let signature = match &symbol.kind {
            SymbolKind::Func(sig) => {
                classifier.callable(&owner.path, &symbol.name, &qualified, ComponentKind::Function, sig)?
            }
            SymbolKind::TypeName(named) => {
                classifier.struct_component(&owner.path, &symbol.name, &qualified, &Type::Named(named.clone()))?
            }
            SymbolKind::Var(ty) => classifier.value(&owner.path, &symbol.name, &qualified, ty, "variable")?,
            SymbolKind::Const(_) => {
                return Err(classifier.mismatch(ContractViolation::NotCallable {
                    name: symbol.name.clone(),
                    what: "constant",
                }))
            }
        };
        Ok(self.cache.store_signature(signature))
    }

    /// `v.Member` where `v` is a package-level variable of a named type.
    fn resolve_variable_member(
        &mut self,
        reference: &str,
        variable: &str,
        member: &str,
        current: &str,
        imports: &[ImportSpec],
    ) -> Result<Rc<ComponentSignature>, ResolveError> {
        let key = format!("{}.{}.{}", current, variable, member);
        if let Some(hit) = self.cache.signature(&key) {
            return Ok(hit);
        }

        let package = self.load_package(current)?;
        let ty = match package.scope.lookup(variable).map(|s| &s.kind) {
            Some(SymbolKind::Var(ty)) if ty.deref().as_named().is_some() => ty.clone(),
            other => {
                let detail = match other {
                    None => format!(
                        "`{}` is neither an imported package nor a package-level variable",
                        variable
                    ),
                    Some(_) => format!("`{}` is not a variable of a named type", variable),
                };
                let mut candidates: Vec<String> = imports
                    .iter()
                    .filter_map(|s| s.local_name().map(str::to_string))
                    .collect();
                candidates.extend(
                    package
                        .scope
                        .iter()
                        .filter(|s| matches!(s.kind, SymbolKind::Var(_)))
                        .map(|s| s.name.clone()),
                );
                return Err(ResolveError::not_found(reference.to_string(), detail, candidates));
            }
        };

        let classifier = Classifier::new(&self.config, reference);
        let name = format!("{}.{}", variable, member);
        let signature = classifier.member(&package.path, &name, &key, &ty, member)?;
        Ok(self.cache.store_signature(signature))
    }

    /// A local used directly, e.g. `@child` for a `child` parameter.
    fn resolve_local(
        &mut self,
        reference: &str,
        binding: &LocalBinding,
        current: &str,
        imports: &[ImportSpec],
    ) -> Result<Rc<ComponentSignature>, ResolveError> {
        let ty = self.local_type(reference, binding, current, imports)?;
        let classifier = Classifier::new(&self.config, reference);
        let signature = classifier.value(current, &binding.name, &binding.name, &ty, "local")?;
        Ok(Rc::new(signature))
    }

    /// `x.Member` where `x` is a local.
    fn resolve_local_member(
        &mut self,
        reference: &str,
        binding: &LocalBinding,
        member: &str,
        current: &str,
        imports: &[ImportSpec],
    ) -> Result<Rc<ComponentSignature>, ResolveError> {
        let ty = self.local_type(reference, binding, current, imports)?;
        if ty.deref().as_named().is_none() {
            return Err(ResolveError::not_found(
                reference.to_string(),
                format!("local `{}` is not of a named type", binding.name),
                Vec::new(),
            ));
        }
        let classifier = Classifier::new(&self.config, reference);
        let signature = classifier.member(current, reference, reference, &ty, member)?;
        Ok(Rc::new(signature))
    }

    /// The type a local was declared with. Expressions are not inferred.
    fn local_type(
        &mut self,
        reference: &str,
        binding: &LocalBinding,
        current: &str,
        imports: &[ImportSpec],
    ) -> Result<Type, ResolveError> {
        let no_type = |why: &str| {
            ResolveError::not_found(
                reference.to_string(),
                format!("local `{}` {}", binding.name, why),
                Vec::new(),
            )
        };
        let text = binding
            .type_text
            .as_deref()
            .ok_or_else(|| no_type("has no declared type"))?;
        let expr = parse_type(text).map_err(|_| no_type("has a type that cannot be read"))?;
        self.type_from_expr(&expr, current, imports)
            .ok_or_else(|| no_type(&format!("has type `{}` which does not name a declared type", text)))?
    }

    /// Resolve a written type to a named type (or a pointer to one).
    fn type_from_expr(
        &mut self,
        expr: &TypeExpr,
        current: &str,
        imports: &[ImportSpec],
    ) -> Option<Result<Type, ResolveError>> {
        match expr {
            TypeExpr::Pointer(inner) => self
                .type_from_expr(inner, current, imports)
                .map(|r| r.map(Type::pointer)),
            TypeExpr::Name {
                qualifier, name, ..
            } => {
                let path = match qualifier {
                    Some(q) => find_alias(imports, q)?.path.clone(),
                    None => {
                        if let Some(kind) = BasicKind::from_name(name) {
                            return Some(Ok(Type::Basic(kind)));
                        }
                        current.to_string()
                    }
                };
                let package = match self.load_package(&path) {
                    Ok(p) => p,
                    Err(e) => return Some(Err(e)),
                };
                match &package.scope.lookup(name)?.kind {
                    SymbolKind::TypeName(named) => Some(Ok(Type::Named(named.clone()))),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Turns symbols into signatures for one reference.
struct Classifier<'a> {
    config: &'a ResolverConfig,
    analyzer: PredicateAnalyzer<'a>,
    reference: &'a str,
}

impl<'a> Classifier<'a> {
    fn new(config: &'a ResolverConfig, reference: &'a str) -> Self {
        Self {
            config,
            analyzer: PredicateAnalyzer::new(config),
            reference,
        }
    }

    fn mismatch(&self, violation: ContractViolation) -> ResolveError {
        ResolveError::contract(self.reference.to_string(), violation)
    }

    /// A function or method whose single result is the component type.
    fn callable(
        &self,
        package: &str,
        name: &str,
        qualified: &str,
        kind: ComponentKind,
        sig: &Signature,
    ) -> Result<ComponentSignature, ResolveError> {
        match sig.results.as_slice() {
            [single] if self.analyzer.is_component_marker(&single.ty) => {}
            [single] => {
                return Err(self.mismatch(ContractViolation::ResultType {
                    expected: format!("{}.{}", self.config.runtime_name, self.config.component_type),
                    found: single.ty.describe(Some(package)),
                }))
            }
            results => {
                return Err(self.mismatch(ContractViolation::ResultCount {
                    found: results.len(),
                }))
            }
        }
        let last = sig.params.len().saturating_sub(1);
        let parameters = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| self.parameter(package, &p.name, &p.ty, sig.variadic && i == last))
            .collect();
        Ok(ComponentSignature::new(package, name, qualified, kind, false, parameters))
    }

    /// A named type with a render method. Exported fields become parameters.
    fn struct_component(
        &self,
        package: &str,
        name: &str,
        qualified: &str,
        ty: &Type,
    ) -> Result<ComponentSignature, ResolveError> {
        if matches!(ty.underlying(), Type::Interface(_)) {
            return Err(self.mismatch(ContractViolation::NotCallable {
                name: name.to_string(),
                what: "interface type",
            }));
        }
        let pointer_receiver = self
            .analyzer
            .check_render(ty, true)
            .map_err(|v| self.mismatch(v))?;
        let parameters = ty
            .struct_fields()
            .unwrap_or_default()
            .iter()
            .filter(|f| f.is_exported())
            .map(|f| self.parameter(package, &f.name, &f.ty, false))
            .collect();
        Ok(ComponentSignature::new(
            package,
            name,
            qualified,
            ComponentKind::Struct,
            pointer_receiver,
            parameters,
        ))
    }

    /// A value used as a component: its type must have the render method in
    /// its method set, or be a function returning the component type.
    fn value(
        &self,
        package: &str,
        name: &str,
        qualified: &str,
        ty: &Type,
        what: &'static str,
    ) -> Result<ComponentSignature, ResolveError> {
        if self.analyzer.is_component(ty) {
            return Ok(ComponentSignature::new(
                package,
                name,
                qualified,
                ComponentKind::Value,
                false,
                Vec::new(),
            ));
        }
        if let Type::Func(sig) = ty.underlying() {
            return self.callable(package, name, qualified, ComponentKind::Function, sig);
        }
        if let Some(Member::Method(_)) = lookup_member(ty, &self.config.render_method) {
            self.analyzer
                .check_render(ty, false)
                .map_err(|v| self.mismatch(v))?;
        }
        Err(self.mismatch(ContractViolation::NotCallable {
            name: name.to_string(),
            what,
        }))
    }

    /// `member` reached through a value of type `ty`.
    fn member(
        &self,
        package: &str,
        name: &str,
        qualified: &str,
        ty: &Type,
        member: &str,
    ) -> Result<ComponentSignature, ResolveError> {
        match lookup_member(ty, member) {
            Some(Member::Method(method)) => {
                self.callable(package, name, qualified, ComponentKind::Method, &method.signature)
            }
            Some(Member::Field(field)) => self.field(package, name, qualified, &field),
            None => {
                let candidates = member_names(ty);
                Err(ResolveError::not_found(
                    self.reference.to_string(),
                    format!("type `{}` has no method or field `{}`", ty.describe(Some(package)), member),
                    candidates,
                ))
            }
        }
    }

    fn field(
        &self,
        package: &str,
        name: &str,
        qualified: &str,
        field: &Field,
    ) -> Result<ComponentSignature, ResolveError> {
        self.value(package, name, qualified, &field.ty, "field")
    }

    fn parameter(&self, package: &str, name: &str, ty: &Type, variadic: bool) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            type_description: ty.describe(Some(package)),
            ty: ty.clone(),
            predicates: self.analyzer.analyze(name, ty),
            is_variadic: variadic,
        }
    }
}

/// Methods and fields directly on `ty`, for suggestions.
fn member_names(ty: &Type) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    if let Some(named) = ty.deref().as_named() {
        names.extend(named.methods.iter().map(|m| m.name.clone()));
    }
    if let Some(fields) = ty.struct_fields() {
        names.extend(fields.iter().map(|f| f.name.clone()));
    }
    names
}
