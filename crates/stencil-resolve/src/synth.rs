// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Stand-in source for template files.
//!
//! Template files are not valid host-language source, so the type oracle
//! cannot read them. Each one is replaced by a stand-in that keeps the
//! file's own declarations and turns every template definition into a stub
//! function of the same signature. Packages importing a template package
//! then type-check against the stubs.

use std::fmt::Write;

use stencil_ast::{Item, TemplateDef, TemplateFile, TemplateKind};
use tracing::trace;

use crate::config::ResolverConfig;
use crate::host::{parse_header, parse_imports, parse_receiver};

pub const GENERATED_HEADER: &str = "// Code generated by stencil. DO NOT EDIT.";

/// How the runtime package is reachable from the stand-in.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RuntimeImport {
    /// Already imported; names are written with this prefix (`templ.` or
    /// empty for a dot import).
    Existing { prefix: String },
    /// Imported by a blank import in declaration `item`; the `_ ` between
    /// `start` and `end` is removed.
    Unblank {
        item: usize,
        start: usize,
        end: usize,
    },
    /// Added to the grouped import in declaration `item` at `offset`.
    IntoGroup { item: usize, offset: usize },
    /// Added as a declaration after the package clause.
    New,
}

/// Build the stand-in source of `file` for package `package_name`.
///
/// The output depends only on the inputs.
pub fn synthesize(file: &TemplateFile, package_name: &str, config: &ResolverConfig) -> String {
    let runtime = locate_runtime(file, config);
    let prefix = match &runtime {
        RuntimeImport::Existing { prefix } => prefix.clone(),
        _ => format!("{}.", config.runtime_name),
    };

    let mut out = String::new();
    let _ = writeln!(out, "{}\n\npackage {}", GENERATED_HEADER, package_name);
    if runtime == RuntimeImport::New {
        let _ = write!(out, "\nimport \"{}\"\n", config.runtime_package);
    }

    let mut stubs = 0usize;
    for (index, item) in file.items.iter().enumerate() {
        match item {
            Item::Declaration(decl) => {
                let text = match runtime {
                    RuntimeImport::Unblank { item, start, end } if item == index => {
                        format!("{}{}", &decl.text[..start], &decl.text[end..])
                    }
                    RuntimeImport::IntoGroup { item, offset } if item == index => format!(
                        "{}\n\t\"{}\"{}",
                        &decl.text[..offset],
                        config.runtime_package,
                        &decl.text[offset..]
                    ),
                    _ => decl.text.clone(),
                };
                let _ = write!(out, "\n{}\n", text.trim_end());
            }
            Item::Template(def) => {
                if let Some(stub) = stub(def, &prefix, config) {
                    let _ = write!(out, "\n{}\n", stub);
                    stubs += 1;
                }
            }
        }
    }
    trace!(file = %file.path.display(), stubs, ?runtime, "synthesized stand-in");
    out
}

fn locate_runtime(file: &TemplateFile, config: &ResolverConfig) -> RuntimeImport {
    let mut first_group = None;
    for (index, item) in file.items.iter().enumerate() {
        let Item::Declaration(decl) = item else {
            continue;
        };
        for import in parse_imports(&decl.text) {
            if first_group.is_none() {
                if let Some(offset) = import.group_open {
                    first_group = Some(RuntimeImport::IntoGroup {
                        item: index,
                        offset,
                    });
                }
            }
            let Some(spec) = import.specs.iter().find(|s| s.path == config.runtime_package) else {
                continue;
            };
            return match (spec.name.as_deref(), spec.name_span) {
                (Some("."), _) => RuntimeImport::Existing {
                    prefix: String::new(),
                },
                (Some("_"), Some(span)) => RuntimeImport::Unblank {
                    item: index,
                    start: span.start,
                    end: spec.path_span.start,
                },
                (Some(alias), _) => RuntimeImport::Existing {
                    prefix: format!("{}.", alias),
                },
                (None, _) => RuntimeImport::Existing {
                    prefix: format!("{}.", config.runtime_name),
                },
            };
        }
    }
    first_group.unwrap_or(RuntimeImport::New)
}

/// The stub for one definition, or `None` if its header does not parse.
fn stub(def: &TemplateDef, prefix: &str, config: &ResolverConfig) -> Option<String> {
    let header = parse_header(&def.signature).ok()?;
    if !header.results.is_empty() {
        return None;
    }
    let receiver = match &def.receiver {
        Some(text) => {
            parse_receiver(text).ok()?;
            format!("({}) ", text.trim())
        }
        None => String::new(),
    };
    let (result, value) = match def.kind {
        TemplateKind::Html => (
            format!("{}{}", prefix, config.component_type),
            format!("{}{}", prefix, config.nop_component),
        ),
        TemplateKind::Css => (
            format!("{}{}", prefix, config.css_class_type),
            format!("{}{}", prefix, config.css_class_value),
        ),
        TemplateKind::Script => (
            format!("{}{}", prefix, config.script_type),
            format!("{}{}{{}}", prefix, config.script_type),
        ),
    };
    Some(format!(
        "func {}{} {} {{\n\treturn {}\n}}",
        receiver,
        def.signature.trim(),
        result,
        value
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_ast::{Declaration, Span};

    fn decl(text: &str) -> Item {
        Item::Declaration(Declaration {
            text: text.into(),
            span: Span::default(),
        })
    }

    fn def(kind: TemplateKind, receiver: Option<&str>, signature: &str) -> Item {
        Item::Template(TemplateDef {
            kind,
            receiver: receiver.map(Into::into),
            signature: signature.into(),
            span: Span::default(),
            body: vec![],
        })
    }

    fn file(items: Vec<Item>) -> TemplateFile {
        let mut f = TemplateFile::new("ui/button.templ");
        f.items = items;
        f
    }

    #[test]
    fn test_adds_import_after_package_clause() {
        let f = file(vec![def(TemplateKind::Html, None, "Button(title string)")]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert_eq!(
            out,
            "// Code generated by stencil. DO NOT EDIT.\n\npackage ui\n\nimport \"github.com/a-h/templ\"\n\nfunc Button(title string) templ.Component {\n\treturn templ.NopComponent\n}\n"
        );
    }

    #[test]
    fn test_inserts_into_first_group() {
        let f = file(vec![
            decl("import (\n\t\"fmt\"\n)"),
            def(TemplateKind::Html, None, "A()"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert!(out.contains("import (\n\t\"github.com/a-h/templ\"\n\t\"fmt\"\n)"));
        assert_eq!(out.matches("github.com/a-h/templ").count(), 1);
    }

    #[test]
    fn test_reuses_alias_and_dot_imports() {
        let f = file(vec![
            decl("import t \"github.com/a-h/templ\""),
            def(TemplateKind::Html, None, "A()"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert!(out.contains("func A() t.Component {\n\treturn t.NopComponent\n}"));
        assert_eq!(out.matches("github.com/a-h/templ").count(), 1);

        let f = file(vec![
            decl("import . \"github.com/a-h/templ\""),
            def(TemplateKind::Html, None, "A()"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert!(out.contains("func A() Component {\n\treturn NopComponent\n}"));
    }

    #[test]
    fn test_comments_in_imports_and_headers() {
        let f = file(vec![
            decl("import (\n\t/* runtime */ \"github.com/a-h/templ\"\n)"),
            def(TemplateKind::Html, None, "Button(title string /* label */)"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert_eq!(out.matches("github.com/a-h/templ").count(), 1);
        assert!(out.contains(
            "func Button(title string /* label */) templ.Component {\n\treturn templ.NopComponent\n}"
        ));
    }

    #[test]
    fn test_blank_import_is_rewritten_in_place() {
        let f = file(vec![
            decl("import (\n\t\"fmt\"\n\t_ \"github.com/a-h/templ\"\n)"),
            def(TemplateKind::Html, None, "A()"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert!(out.contains("import (\n\t\"fmt\"\n\t\"github.com/a-h/templ\"\n)"));
        assert!(!out.contains("_ \""));
    }

    #[test]
    fn test_stub_kinds_and_receivers() {
        let f = file(vec![
            def(TemplateKind::Css, None, "primary()"),
            def(TemplateKind::Script, None, "onClick(id string)"),
            def(TemplateKind::Html, Some("c *Card"), "Header()"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert!(out.contains("func primary() templ.CSSClass {\n\treturn templ.ComponentCSSClass{}\n}"));
        assert!(out.contains("func onClick(id string) templ.ComponentScript {\n\treturn templ.ComponentScript{}\n}"));
        assert!(out.contains("func (c *Card) Header() templ.Component {"));
    }

    #[test]
    fn test_declarations_kept_and_bad_headers_skipped() {
        let f = file(vec![
            decl("type Card struct {\n\tName string\n}"),
            def(TemplateKind::Html, None, "Broken(title"),
            def(TemplateKind::Html, Some("c *"), "Bad()"),
            def(TemplateKind::Html, None, "Good()"),
        ]);
        let out = synthesize(&f, "ui", &ResolverConfig::default());
        assert!(out.contains("type Card struct {\n\tName string\n}"));
        assert!(!out.contains("Broken"));
        assert!(!out.contains("Bad"));
        assert!(out.contains("func Good()"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let f = file(vec![
            decl("import \"fmt\""),
            def(TemplateKind::Html, None, "List[T any](items []T)"),
        ]);
        let config = ResolverConfig::default();
        assert_eq!(synthesize(&f, "ui", &config), synthesize(&f.clone(), "ui", &config));
    }
}
