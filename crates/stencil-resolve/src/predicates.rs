// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Capability and shape predicates on parameter types.
//!
//! The emitter decides how to pass an argument from these: a component is
//! rendered, an attribute provider is spread, strings and booleans get
//! literal shortcuts.

use crate::config::ResolverConfig;
use crate::error::ContractViolation;
use crate::types::{lookup_member, BasicKind, Member, Method, Type};

/// Predicates computed for one parameter type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TypePredicates {
    pub is_component: bool,
    pub is_attributer: bool,
    pub is_pointer: bool,
    pub is_slice: bool,
    pub is_map: bool,
    pub is_string: bool,
    pub is_bool: bool,
}

pub struct PredicateAnalyzer<'a> {
    config: &'a ResolverConfig,
}

impl<'a> PredicateAnalyzer<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    /// All predicates for a parameter named `name` of type `ty`.
    pub fn analyze(&self, name: &str, ty: &Type) -> TypePredicates {
        let inner = ty.deref();
        TypePredicates {
            is_component: self.is_component(ty),
            is_attributer: self.is_attributer(name, ty),
            is_pointer: matches!(ty, Type::Pointer(_)),
            is_slice: matches!(ty.underlying(), Type::Slice(_)),
            is_map: matches!(ty.underlying(), Type::Map(..)),
            is_string: matches!(inner.underlying(), Type::Basic(BasicKind::String)),
            is_bool: matches!(inner.underlying(), Type::Basic(BasicKind::Bool)),
        }
    }

    /// The method set of `ty` contains a render method of the exact shape.
    pub fn is_component(&self, ty: &Type) -> bool {
        ty.method_set()
            .into_iter()
            .any(|m| m.name == self.config.render_method && self.render_violation(m).is_none())
    }

    /// The method set of `ty` has the attribute-provider method, or `ty` is
    /// the runtime's attribute bag.
    pub fn is_attributer(&self, name: &str, ty: &Type) -> bool {
        if let Type::Named(n) = ty {
            if self.config.is_attributes_type(
                n.package.as_ref().map(|p| p.path.as_str()).unwrap_or(""),
                &n.name,
            ) {
                return true;
            }
        }
        let provides = ty.method_set().into_iter().any(|m| {
            m.name == self.config.attributer_method
                && m.signature.params.is_empty()
                && m.signature.results.len() == 1
                && matches!(m.signature.results[0].ty.underlying(), Type::Slice(_))
        });
        if provides {
            return true;
        }
        // Name-based fallback: an unresolved `attrs` parameter is assumed to
        // be an attribute bag so a missing import does not change codegen.
        self.config.attrs_name_fallback && name == "attrs" && ty.is_invalid()
    }

    /// Check that a struct type `ty` (named, or pointer to named) can render.
    /// With `by_name`, the type is referenced by name and the emitter may
    /// take its address, so a pointer receiver is accepted; otherwise the
    /// method must be in the value's method set. The render method may be
    /// promoted through an embedded field. Returns whether only the
    /// address of the value can render.
    pub fn check_render(&self, ty: &Type, by_name: bool) -> Result<bool, ContractViolation> {
        let type_name = ty.deref().describe(None);
        let method = match lookup_member(ty, &self.config.render_method) {
            Some(Member::Method(method)) => method,
            _ => {
                return Err(ContractViolation::MissingRender {
                    method: self.config.render_method.clone(),
                    type_name,
                })
            }
        };
        if let Some(violation) = self.render_violation(&method) {
            return Err(violation);
        }
        let renders = |t: &Type| {
            t.method_set()
                .iter()
                .any(|m| m.name == self.config.render_method)
        };
        if !by_name && !renders(ty) {
            return Err(ContractViolation::ReceiverKind {
                method: self.config.render_method.clone(),
                type_name,
            });
        }
        Ok(!renders(ty.deref()))
    }

    /// The first way `method` differs from
    /// `Render(context.Context, io.Writer) error`.
    pub fn render_violation(&self, method: &Method) -> Option<ContractViolation> {
        let c = self.config;
        let sig = &method.signature;
        let name = || method.name.clone();
        if sig.params.len() != 2 || sig.variadic {
            return Some(ContractViolation::RenderArity {
                method: name(),
                found: sig.params.len(),
            });
        }
        let expected = [
            (&c.context_package, &c.context_type),
            (&c.writer_package, &c.writer_type),
        ];
        for (index, (param, (pkg, ty))) in sig.params.iter().zip(expected).enumerate() {
            let matches = param
                .ty
                .as_named()
                .is_some_and(|n| n.is(pkg, ty));
            if !matches {
                return Some(ContractViolation::RenderParamType {
                    method: name(),
                    index,
                    expected: format!("{}.{}", last_segment(pkg), ty),
                    found: param.ty.to_string(),
                });
            }
        }
        if sig.results.len() != 1 {
            return Some(ContractViolation::RenderResultCount {
                method: name(),
                found: sig.results.len(),
            });
        }
        let result = &sig.results[0].ty;
        let is_error = result
            .as_named()
            .is_some_and(|n| n.package.is_none() && n.name == "error");
        if !is_error {
            return Some(ContractViolation::RenderResultType {
                method: name(),
                found: result.to_string(),
            });
        }
        None
    }

    /// `true` if `ty` is the runtime's component type.
    pub fn is_component_marker(&self, ty: &Type) -> bool {
        ty.as_named().is_some_and(|n| {
            n.package
                .as_ref()
                .is_some_and(|p| self.config.is_component_marker(&p.path, &n.name))
        })
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, NamedType, PackageRef, Signature, Var};

    fn pkg(path: &str) -> Option<PackageRef> {
        Some(PackageRef {
            path: path.into(),
            name: last_segment(path).into(),
        })
    }

    fn iface(path: &str, name: &str) -> Type {
        Type::named(NamedType {
            package: pkg(path),
            name: name.into(),
            underlying: Type::Interface(vec![]),
            methods: vec![],
        })
    }

    fn render(params: Vec<Type>, results: Vec<Type>, pointer_receiver: bool) -> Method {
        Method {
            name: "Render".into(),
            signature: Signature {
                params: params.into_iter().map(|t| Var::new("", t)).collect(),
                results: results.into_iter().map(|t| Var::new("", t)).collect(),
                variadic: false,
            },
            pointer_receiver,
        }
    }

    fn good_render(pointer_receiver: bool) -> Method {
        render(
            vec![iface("context", "Context"), iface("io", "Writer")],
            vec![Type::error()],
            pointer_receiver,
        )
    }

    fn card(methods: Vec<Method>) -> Type {
        Type::named(NamedType {
            package: pkg("example.com/ui"),
            name: "Card".into(),
            underlying: Type::Struct(vec![]),
            methods,
        })
    }

    #[test]
    fn test_string_and_bool_unwrap_one_pointer() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        let s = Type::Basic(BasicKind::String);
        assert!(a.analyze("x", &s).is_string);
        let p = a.analyze("x", &Type::pointer(s.clone()));
        assert!(p.is_string && p.is_pointer);
        assert!(!a.analyze("x", &Type::pointer(Type::pointer(s))).is_string);
        let named_bool = Type::named(NamedType {
            package: pkg("example.com/ui"),
            name: "Flag".into(),
            underlying: Type::Basic(BasicKind::Bool),
            methods: vec![],
        });
        assert!(a.analyze("x", &named_bool).is_bool);
    }

    #[test]
    fn test_slice_and_map_use_outer_type() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        let slice = Type::slice(Type::Basic(BasicKind::Int));
        assert!(a.analyze("x", &slice).is_slice);
        assert!(!a.analyze("x", &Type::pointer(slice)).is_slice);
        assert!(a.analyze("x", &Type::map(Type::Basic(BasicKind::String), Type::any())).is_map);
    }

    #[test]
    fn test_component_respects_method_sets() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        assert!(a.is_component(&card(vec![good_render(false)])));
        assert!(!a.is_component(&card(vec![good_render(true)])));
        assert!(a.is_component(&Type::pointer(card(vec![good_render(true)]))));
        let wrong = render(vec![iface("context", "Context")], vec![Type::error()], false);
        assert!(!a.is_component(&card(vec![wrong])));
    }

    #[test]
    fn test_render_violations_are_specific() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        let arity = render(vec![], vec![Type::error()], false);
        assert!(matches!(a.render_violation(&arity), Some(ContractViolation::RenderArity { found: 0, .. })));

        let param = render(
            vec![iface("context", "Context"), Type::Basic(BasicKind::String)],
            vec![Type::error()],
            false,
        );
        assert!(matches!(
            a.render_violation(&param),
            Some(ContractViolation::RenderParamType { index: 1, .. })
        ));

        let count = render(vec![iface("context", "Context"), iface("io", "Writer")], vec![], false);
        assert!(matches!(
            a.render_violation(&count),
            Some(ContractViolation::RenderResultCount { found: 0, .. })
        ));

        let result = render(
            vec![iface("context", "Context"), iface("io", "Writer")],
            vec![Type::Basic(BasicKind::Bool)],
            false,
        );
        assert!(matches!(
            a.render_violation(&result),
            Some(ContractViolation::RenderResultType { .. })
        ));
    }

    #[test]
    fn test_check_render_receiver_kind() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        let ptr_card = card(vec![good_render(true)]);
        assert_eq!(a.check_render(&ptr_card, true), Ok(true));
        assert!(matches!(
            a.check_render(&ptr_card, false),
            Err(ContractViolation::ReceiverKind { .. })
        ));
        assert_eq!(a.check_render(&Type::pointer(ptr_card), false), Ok(true));
        assert!(matches!(
            a.check_render(&card(vec![]), true),
            Err(ContractViolation::MissingRender { .. })
        ));
    }

    #[test]
    fn test_render_promoted_through_embedded_field() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        let embedding = |base: Type| {
            Type::named(NamedType {
                package: pkg("example.com/ui"),
                name: "Panel".into(),
                underlying: Type::Struct(vec![Field {
                    name: "Card".into(),
                    ty: base,
                    embedded: true,
                }]),
                methods: vec![],
            })
        };

        let by_value = embedding(card(vec![good_render(false)]));
        assert!(a.is_component(&by_value));
        assert_eq!(a.check_render(&by_value, true), Ok(false));
        assert_eq!(a.check_render(&by_value, false), Ok(false));

        let pointer_method = embedding(card(vec![good_render(true)]));
        assert!(!a.is_component(&pointer_method));
        assert!(a.is_component(&Type::pointer(pointer_method.clone())));
        assert_eq!(a.check_render(&pointer_method, true), Ok(true));
        assert!(matches!(
            a.check_render(&pointer_method, false),
            Err(ContractViolation::ReceiverKind { .. })
        ));

        let embedded_pointer = embedding(Type::pointer(card(vec![good_render(true)])));
        assert_eq!(a.check_render(&embedded_pointer, false), Ok(false));
    }

    #[test]
    fn test_attributer_rules() {
        let config = ResolverConfig::default();
        let a = PredicateAnalyzer::new(&config);
        let attrs = Type::named(NamedType {
            package: pkg("github.com/a-h/templ"),
            name: "Attributes".into(),
            underlying: Type::map(Type::Basic(BasicKind::String), Type::any()),
            methods: vec![],
        });
        assert!(a.is_attributer("x", &attrs));

        let items = Method {
            name: "Items".into(),
            signature: Signature {
                params: vec![],
                results: vec![Var::new("", Type::slice(Type::any()))],
                variadic: false,
            },
            pointer_receiver: false,
        };
        assert!(a.is_attributer("x", &card(vec![items])));

        assert!(a.is_attributer("attrs", &Type::Invalid));
        assert!(!a.is_attributer("other", &Type::Invalid));
        assert!(!a.is_attributer("attrs", &Type::Basic(BasicKind::String)));

        let strict = ResolverConfig {
            attrs_name_fallback: false,
            ..ResolverConfig::default()
        };
        assert!(!PredicateAnalyzer::new(&strict).is_attributer("attrs", &Type::Invalid));
    }
}
