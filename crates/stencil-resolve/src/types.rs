// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Type information produced by the type oracle.
//!
//! This is the resolver's view of a loaded package: a scope of package-level
//! symbols, each with a fully resolved type. Named types carry their method
//! sets so capability checks never need another load.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Basic (predeclared, non-named) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    UnsafePointer,
}

impl BasicKind {
    /// Look up a predeclared basic type name, including the `byte` and
    /// `rune` aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => BasicKind::Bool,
            "string" => BasicKind::String,
            "int" => BasicKind::Int,
            "int8" => BasicKind::Int8,
            "int16" => BasicKind::Int16,
            "int32" | "rune" => BasicKind::Int32,
            "int64" => BasicKind::Int64,
            "uint" => BasicKind::Uint,
            "uint8" | "byte" => BasicKind::Uint8,
            "uint16" => BasicKind::Uint16,
            "uint32" => BasicKind::Uint32,
            "uint64" => BasicKind::Uint64,
            "uintptr" => BasicKind::Uintptr,
            "float32" => BasicKind::Float32,
            "float64" => BasicKind::Float64,
            "complex64" => BasicKind::Complex64,
            "complex128" => BasicKind::Complex128,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::String => "string",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::UnsafePointer => "unsafe.Pointer",
        }
    }
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicKind),
    Named(Rc<NamedType>),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(u64, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(Box<Type>),
    Func(Box<Signature>),
    Interface(Vec<Method>),
    Struct(Vec<Field>),
    /// A type parameter of a generic declaration.
    TypeParam(String),
    /// The oracle could not resolve the type.
    Invalid,
}

/// The package a named type belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    pub path: String,
    pub name: String,
}

/// A declared, named type with its method set.
#[derive(Debug, Clone)]
pub struct NamedType {
    /// `None` for predeclared types such as `error`.
    pub package: Option<PackageRef>,
    pub name: String,
    pub underlying: Type,
    /// Methods declared on the type; interface methods live in `underlying`.
    pub methods: Vec<Method>,
}

/// Named types are identical when they have the same package and name.
impl PartialEq for NamedType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.package.as_ref().map(|p| &p.path) == other.package.as_ref().map(|p| &p.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub signature: Signature,
    /// Declared with a pointer receiver. Always false for interface methods.
    pub pointer_receiver: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Var>,
    pub results: Vec<Var>,
    /// The last parameter is `...T` (its type is stored as `[]T`).
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
}

impl Field {
    pub fn is_exported(&self) -> bool {
        is_exported(&self.name)
    }
}

/// Exported identifiers start with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

impl Var {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl NamedType {
    /// `path.Name`, or just `Name` for predeclared types.
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(pkg) => format!("{}.{}", pkg.path, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is(&self, package_path: &str, name: &str) -> bool {
        self.name == name && self.package.as_ref().map(|p| p.path.as_str()) == Some(package_path)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl Type {
    pub fn named(named: NamedType) -> Type {
        Type::Named(Rc::new(named))
    }

    pub fn pointer(inner: Type) -> Type {
        Type::Pointer(Box::new(inner))
    }

    pub fn slice(elem: Type) -> Type {
        Type::Slice(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn func(signature: Signature) -> Type {
        Type::Func(Box::new(signature))
    }

    /// The predeclared `error` interface.
    pub fn error() -> Type {
        Type::named(NamedType {
            package: None,
            name: "error".to_string(),
            underlying: Type::Interface(vec![Method {
                name: "Error".to_string(),
                signature: Signature {
                    params: vec![],
                    results: vec![Var::new("", Type::Basic(BasicKind::String))],
                    variadic: false,
                },
                pointer_receiver: false,
            }]),
            methods: vec![],
        })
    }

    /// `any`, the empty interface.
    pub fn any() -> Type {
        Type::Interface(Vec::new())
    }
}

// ============================================================================
// Queries
// ============================================================================

impl Type {
    /// The underlying type: named types are unwrapped, everything else is
    /// already its own underlying type.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named(n) => n.underlying.underlying(),
            other => other,
        }
    }

    /// Strip one pointer level, if any.
    pub fn deref(&self) -> &Type {
        match self {
            Type::Pointer(inner) => inner,
            other => other,
        }
    }

    pub fn as_named(&self) -> Option<&Rc<NamedType>> {
        match self {
            Type::Named(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// The method set of this type, following the host language's rules:
    /// a value of named type `T` has only value-receiver methods, `*T` has
    /// both, and an interface has all of its methods. Methods promoted
    /// through embedded fields are included; a name declared at a
    /// shallower depth hides deeper ones, and a name found twice at the
    /// same depth is left out.
    pub fn method_set(&self) -> Vec<&Method> {
        match self {
            Type::Interface(methods) => methods.iter().collect(),
            Type::Named(n) if matches!(n.underlying.underlying(), Type::Interface(_)) => {
                interface_methods(&n.underlying).iter().collect()
            }
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Named(n) if matches!(n.underlying.underlying(), Type::Interface(_)) => {
                    Vec::new()
                }
                Type::Named(_) | Type::Struct(_) => promoted_method_set(self),
                _ => Vec::new(),
            },
            Type::Named(_) | Type::Struct(_) => promoted_method_set(self),
            _ => Vec::new(),
        }
    }

    /// A declared method by name regardless of receiver kind, for named
    /// types and pointers to them.
    pub fn declared_method(&self, name: &str) -> Option<&Method> {
        match self.deref() {
            Type::Named(n) => n.methods.iter().find(|m| m.name == name).or_else(|| {
                match n.underlying.underlying() {
                    Type::Interface(methods) => methods.iter().find(|m| m.name == name),
                    _ => None,
                }
            }),
            Type::Interface(methods) => methods.iter().find(|m| m.name == name),
            _ => None,
        }
    }

    /// Fields of the underlying struct, after one pointer level.
    pub fn struct_fields(&self) -> Option<&[Field]> {
        match self.deref().underlying() {
            Type::Struct(fields) => Some(fields),
            _ => None,
        }
    }
}

fn interface_methods(ty: &Type) -> &[Method] {
    match ty.underlying() {
        Type::Interface(methods) => methods,
        _ => &[],
    }
}

/// Breadth-first walk over embedded fields. Every declared method and field
/// takes its name at its depth, but only methods callable through the
/// walked value join the set: a pointer-receiver method needs a pointer
/// somewhere on the path.
fn promoted_method_set(ty: &Type) -> Vec<&Method> {
    let mut level: Vec<(&Type, bool)> = vec![(ty, false)];
    let mut seen: Vec<String> = Vec::new();
    let mut taken: Vec<&str> = Vec::new();
    let mut set: Vec<&Method> = Vec::new();
    while !level.is_empty() {
        let mut candidates: Vec<(&str, Option<&Method>)> = Vec::new();
        let mut next: Vec<(&Type, bool)> = Vec::new();
        for (current, addressable) in level {
            let addressable = addressable || matches!(current, Type::Pointer(_));
            let base = current.deref();
            if let Type::Named(n) = base {
                let key = n.qualified_name();
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                if matches!(n.underlying.underlying(), Type::Interface(_)) {
                    candidates.extend(
                        interface_methods(&n.underlying)
                            .iter()
                            .map(|m| (m.name.as_str(), Some(m))),
                    );
                    continue;
                }
                for method in &n.methods {
                    let callable = addressable || !method.pointer_receiver;
                    candidates.push((method.name.as_str(), callable.then_some(method)));
                }
            }
            if let Some(fields) = base.struct_fields() {
                for field in fields {
                    candidates.push((field.name.as_str(), None));
                    if field.embedded {
                        next.push((&field.ty, addressable));
                    }
                }
            }
        }
        for (name, method) in &candidates {
            if taken.contains(name) {
                continue;
            }
            let unique = candidates.iter().filter(|(other, _)| other == name).count() == 1;
            if unique {
                set.extend(*method);
            }
        }
        taken.extend(candidates.iter().map(|(name, _)| *name));
        level = next;
    }
    set
}

/// A method or field found by selector lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Method(Method),
    Field(Field),
}

/// Look up `name` as a method or field reachable from `ty`, including
/// members promoted through embedded fields. The shallowest match wins;
/// two matches at the same depth are ambiguous and yield `None`.
pub fn lookup_member(ty: &Type, name: &str) -> Option<Member> {
    let mut level: Vec<&Type> = vec![ty];
    let mut seen: Vec<String> = Vec::new();
    while !level.is_empty() {
        let mut found: Vec<Member> = Vec::new();
        let mut next: Vec<&Type> = Vec::new();
        for current in level {
            let base = current.deref();
            if let Type::Named(n) = base {
                let key = n.qualified_name();
                if seen.contains(&key) {
                    continue;
                }
                seen.push(key);
            }
            if let Some(method) = base.declared_method(name) {
                found.push(Member::Method(method.clone()));
            }
            if let Some(fields) = base.struct_fields() {
                for field in fields {
                    if field.name == name {
                        found.push(Member::Field(field.clone()));
                    }
                    if field.embedded {
                        next.push(&field.ty);
                    }
                }
            }
        }
        match found.len() {
            0 => level = next,
            1 => return found.pop(),
            _ => return None,
        }
    }
    None
}

// ============================================================================
// Package scope
// ============================================================================

/// The kind of a package-level symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Func(Signature),
    TypeName(Rc<NamedType>),
    Var(Type),
    Const(Type),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

/// Package-level symbols of one loaded package, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct PackageScope {
    symbols: IndexMap<String, Symbol>,
}

impl PackageScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol, replacing any previous symbol of the same name.
    pub fn insert(&mut self, name: impl Into<String>, kind: SymbolKind) {
        let name = name.into();
        self.symbols.insert(
            name.clone(),
            Symbol { name, kind },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ============================================================================
// Display
// ============================================================================

impl Type {
    /// Render the type, leaving types of `local_package` unqualified.
    pub fn describe(&self, local_package: Option<&str>) -> String {
        let mut out = String::new();
        self.write_to(&mut out, local_package);
        out
    }

    fn write_to(&self, out: &mut String, local: Option<&str>) {
        match self {
            Type::Basic(kind) => out.push_str(kind.name()),
            Type::Named(n) => {
                if let Some(pkg) = &n.package {
                    if Some(pkg.path.as_str()) != local {
                        out.push_str(&pkg.name);
                        out.push('.');
                    }
                }
                out.push_str(&n.name);
            }
            Type::Pointer(inner) => {
                out.push('*');
                inner.write_to(out, local);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                elem.write_to(out, local);
            }
            Type::Array(len, elem) => {
                out.push_str(&format!("[{}]", len));
                elem.write_to(out, local);
            }
            Type::Map(key, value) => {
                out.push_str("map[");
                key.write_to(out, local);
                out.push(']');
                value.write_to(out, local);
            }
            Type::Chan(elem) => {
                out.push_str("chan ");
                elem.write_to(out, local);
            }
            Type::Func(sig) => {
                out.push_str("func");
                sig.write_to(out, local);
            }
            Type::Interface(methods) if methods.is_empty() => out.push_str("any"),
            Type::Interface(methods) => {
                out.push_str("interface{");
                for (i, m) in methods.iter().enumerate() {
                    out.push_str(if i == 0 { " " } else { "; " });
                    out.push_str(&m.name);
                    m.signature.write_to(out, local);
                }
                out.push_str(" }");
            }
            Type::Struct(fields) => {
                out.push_str("struct{");
                for (i, f) in fields.iter().enumerate() {
                    out.push_str(if i == 0 { " " } else { "; " });
                    if !f.embedded {
                        out.push_str(&f.name);
                        out.push(' ');
                    }
                    f.ty.write_to(out, local);
                }
                out.push_str(if fields.is_empty() { "}" } else { " }" });
            }
            Type::TypeParam(name) => out.push_str(name),
            Type::Invalid => out.push_str("invalid type"),
        }
    }
}

impl Signature {
    fn write_to(&self, out: &mut String, local: Option<&str>) {
        out.push('(');
        let last = self.params.len().saturating_sub(1);
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if !p.name.is_empty() {
                out.push_str(&p.name);
                out.push(' ');
            }
            match (&p.ty, self.variadic && i == last) {
                (Type::Slice(elem), true) => {
                    out.push_str("...");
                    elem.write_to(out, local);
                }
                (ty, _) => ty.write_to(out, local),
            }
        }
        out.push(')');
        match self.results.as_slice() {
            [] => {}
            [single] if single.name.is_empty() => {
                out.push(' ');
                single.ty.write_to(out, local);
            }
            results => {
                out.push_str(" (");
                for (i, r) in results.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if !r.name.is_empty() {
                        out.push_str(&r.name);
                        out.push(' ');
                    }
                    r.ty.write_to(out, local);
                }
                out.push(')');
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(path: &str, name: &str) -> Option<PackageRef> {
        Some(PackageRef {
            path: path.to_string(),
            name: name.to_string(),
        })
    }

    fn method(name: &str, pointer_receiver: bool) -> Method {
        Method {
            name: name.to_string(),
            signature: Signature::default(),
            pointer_receiver,
        }
    }

    fn card() -> Type {
        Type::named(NamedType {
            package: pkg("example.com/ui", "ui"),
            name: "Card".into(),
            underlying: Type::Struct(vec![
                Field {
                    name: "Title".into(),
                    ty: Type::Basic(BasicKind::String),
                    embedded: false,
                },
            ]),
            methods: vec![method("Value", false), method("Ptr", true)],
        })
    }

    #[test]
    fn test_method_set_respects_receiver_kind() {
        let value = card();
        let names: Vec<_> = value.method_set().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Value"]);

        let ptr = Type::pointer(card());
        let names: Vec<_> = ptr.method_set().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Value", "Ptr"]);
    }

    #[test]
    fn test_named_identity_ignores_structure() {
        let a = card();
        let b = Type::named(NamedType {
            package: pkg("example.com/ui", "ui"),
            name: "Card".into(),
            underlying: Type::Invalid,
            methods: vec![],
        });
        assert_eq!(a, b);
    }

    #[test]
    fn test_lookup_promoted_field() {
        let outer = Type::named(NamedType {
            package: pkg("example.com/app", "app"),
            name: "Page".into(),
            underlying: Type::Struct(vec![Field {
                name: "Card".into(),
                ty: Type::pointer(card()),
                embedded: true,
            }]),
            methods: vec![],
        });
        assert!(matches!(lookup_member(&outer, "Title"), Some(Member::Field(f)) if f.name == "Title"));
        assert!(matches!(lookup_member(&outer, "Ptr"), Some(Member::Method(m)) if m.pointer_receiver));
        assert!(lookup_member(&outer, "Missing").is_none());
    }

    #[test]
    fn test_lookup_ambiguous_at_same_depth() {
        let embedded = |name: &str| Field {
            name: name.into(),
            ty: Type::named(NamedType {
                package: pkg("example.com/x", "x"),
                name: name.into(),
                underlying: Type::Struct(vec![]),
                methods: vec![method("Render", false)],
            }),
            embedded: true,
        };
        let outer = Type::Struct(vec![embedded("A"), embedded("B")]);
        assert!(lookup_member(&outer, "Render").is_none());
    }

    #[test]
    fn test_method_set_includes_promoted_methods() {
        let page = |card_field: Type| {
            Type::named(NamedType {
                package: pkg("example.com/app", "app"),
                name: "Page".into(),
                underlying: Type::Struct(vec![Field {
                    name: "Card".into(),
                    ty: card_field,
                    embedded: true,
                }]),
                methods: vec![method("Own", false)],
            })
        };
        let names = |ty: &Type| -> Vec<String> {
            ty.method_set().iter().map(|m| m.name.clone()).collect()
        };

        // Embedded by value: the pointer method needs an addressable outer.
        assert_eq!(names(&page(card())), vec!["Own", "Value"]);
        assert_eq!(names(&Type::pointer(page(card()))), vec!["Own", "Value", "Ptr"]);
        // Embedded by pointer: both methods are promoted to the value.
        assert_eq!(names(&page(Type::pointer(card()))), vec!["Own", "Value", "Ptr"]);
    }

    #[test]
    fn test_method_set_shadowing_and_ambiguity() {
        let embedded = |name: &str| Field {
            name: name.into(),
            ty: Type::named(NamedType {
                package: pkg("example.com/x", "x"),
                name: name.into(),
                underlying: Type::Struct(vec![]),
                methods: vec![method("Render", false), method(&format!("Only{}", name), false)],
            }),
            embedded: true,
        };
        let outer = Type::Struct(vec![embedded("A"), embedded("B")]);
        let names: Vec<_> = outer.method_set().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["OnlyA", "OnlyB"]);

        let shadowed = Type::Struct(vec![
            embedded("A"),
            Field {
                name: "OnlyA".into(),
                ty: Type::Basic(BasicKind::String),
                embedded: false,
            },
        ]);
        let names: Vec<_> = shadowed.method_set().iter().map(|m| m.name.clone()).collect();
        assert_eq!(names, vec!["Render"]);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Type::pointer(card()).to_string(), "*ui.Card");
        assert_eq!(Type::pointer(card()).describe(Some("example.com/ui")), "*Card");
        assert_eq!(
            Type::map(Type::Basic(BasicKind::String), Type::any()).to_string(),
            "map[string]any"
        );
        assert_eq!(Type::error().to_string(), "error");
        let sig = Signature {
            params: vec![Var::new("items", Type::slice(Type::Basic(BasicKind::String)))],
            results: vec![Var::new("", Type::error())],
            variadic: true,
        };
        assert_eq!(Type::func(sig).to_string(), "func(items ...string) error");
    }

    #[test]
    fn test_exported() {
        assert!(is_exported("Name"));
        assert!(!is_exported("enabled"));
        assert!(!is_exported("_Hidden"));
        assert!(is_exported("Ñame"));
    }

    #[test]
    fn test_scope_lookup_and_order() {
        let mut scope = PackageScope::new();
        scope.insert("B", SymbolKind::Var(Type::Basic(BasicKind::Int)));
        scope.insert("A", SymbolKind::Func(Signature::default()));
        assert_eq!(scope.names().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(scope.lookup("A").is_some());
        assert!(scope.lookup("C").is_none());
    }
}
