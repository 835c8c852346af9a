// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Resolved component contracts handed to the code emitter.

use crate::predicates::TypePredicates;
use crate::types::Type;

/// How a component is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// A free function returning the component type.
    Function,
    /// A method (reached through a package-level variable) returning the
    /// component type.
    Method,
    /// A named type with a render method; fields are set by the caller.
    Struct,
    /// A value that already is a component.
    Value,
}

/// One parameter (or exported struct field) of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    /// The type as the declaring package writes it.
    pub type_description: String,
    pub ty: Type,
    pub predicates: TypePredicates,
    /// A trailing `...T` parameter; `type_description` is then `[]T`.
    pub is_variadic: bool,
}

impl ParameterDescriptor {
    /// The type as code in package `package_path` would write it.
    pub fn describe_in(&self, package_path: &str) -> String {
        self.ty.describe(Some(package_path))
    }

    pub fn is_component(&self) -> bool {
        self.predicates.is_component
    }

    pub fn is_attributer(&self) -> bool {
        self.predicates.is_attributer
    }

    pub fn is_pointer(&self) -> bool {
        self.predicates.is_pointer
    }

    pub fn is_slice(&self) -> bool {
        self.predicates.is_slice
    }

    pub fn is_map(&self) -> bool {
        self.predicates.is_map
    }

    pub fn is_string(&self) -> bool {
        self.predicates.is_string
    }

    pub fn is_bool(&self) -> bool {
        self.predicates.is_bool
    }
}

/// The contract of one resolved component. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSignature {
    package_path: String,
    name: String,
    qualified_name: String,
    kind: ComponentKind,
    pointer_receiver: bool,
    parameters: Vec<ParameterDescriptor>,
}

impl ComponentSignature {
    /// `qualified_name` is the resolution cache key: `path.Name`, or
    /// `path.Var.Method` for components reached through a variable.
    pub fn new(
        package_path: impl Into<String>,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        kind: ComponentKind,
        pointer_receiver: bool,
        parameters: Vec<ParameterDescriptor>,
    ) -> Self {
        Self {
            package_path: package_path.into(),
            name: name.into(),
            qualified_name: qualified_name.into(),
            kind,
            pointer_receiver,
            parameters,
        }
    }

    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn is_struct(&self) -> bool {
        self.kind == ComponentKind::Struct
    }

    /// For struct components: the render method has a pointer receiver, so
    /// the emitter must take the address of the composite literal.
    pub fn is_pointer_receiver(&self) -> bool {
        self.pointer_receiver
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::types::{BasicKind, NamedType, PackageRef};

    fn param(name: &str, ty: Type) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.into(),
            type_description: ty.describe(Some("example.com/ui")),
            predicates: TypePredicates {
                is_string: matches!(ty, Type::Basic(BasicKind::String)),
                ..TypePredicates::default()
            },
            ty,
            is_variadic: false,
        }
    }

    #[test]
    fn test_describe_in_other_package() {
        let item = Type::named(NamedType {
            package: Some(PackageRef {
                path: "example.com/ui".into(),
                name: "ui".into(),
            }),
            name: "Item".into(),
            underlying: Type::Struct(vec![]),
            methods: vec![],
        });
        let p = param("items", Type::slice(item));
        assert_eq!(p.type_description, "[]Item");
        assert_eq!(p.describe_in("example.com/app"), "[]ui.Item");
    }

    #[test]
    fn test_accessors() {
        let sig = ComponentSignature::new(
            "example.com/ui",
            "Card",
            "example.com/ui.Card",
            ComponentKind::Struct,
            true,
            vec![
                param("Title", Type::Basic(BasicKind::String)),
                param("Count", Type::Basic(BasicKind::Int)),
            ],
        );
        assert!(sig.is_struct());
        assert!(sig.is_pointer_receiver());
        assert_eq!(sig.parameter_names().collect::<Vec<_>>(), vec!["Title", "Count"]);
        assert!(sig.parameter("Title").unwrap().is_string());
        assert!(!sig.parameter("Count").unwrap().is_string());
        assert!(sig.parameter("Missing").is_none());
    }
}
