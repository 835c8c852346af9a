// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Template document nodes.
//!
//! A `TemplateFile` is what the template parser hands to the resolver: the
//! host-language declarations it found at the top level, kept as opaque text,
//! and the template definitions with their bodies.

use std::path::{Path, PathBuf};

use crate::span::Span;

/// One parsed template source file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateFile {
    /// Path of the template file on disk.
    pub path: PathBuf,
    /// The `package` clause, if the file has one.
    pub package: Option<PackageClause>,
    /// Top-level items in source order.
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackageClause {
    pub name: String,
    pub span: Span,
}

/// A top-level item of a template file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Item {
    /// Host-language declaration text preserved verbatim (imports, types,
    /// functions, variables).
    Declaration(Declaration),
    /// A template definition.
    Template(TemplateDef),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Declaration {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TemplateKind {
    /// `templ Name(...)`: renders markup.
    Html,
    /// `css name(...)`: produces a CSS class.
    Css,
    /// `script name(...)`: produces a script block.
    Script,
}

/// A template definition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateDef {
    pub kind: TemplateKind,
    /// Receiver text without parentheses, e.g. `c *Card`.
    pub receiver: Option<String>,
    /// Name and parameter list as written, e.g. `Button(title string)`.
    pub signature: String,
    pub span: Span,
    pub body: Vec<Node>,
}

impl TemplateDef {
    /// Name of the definition: the signature text up to the first `(` or `[`.
    pub fn name(&self) -> &str {
        let end = self
            .signature
            .find(|c| c == '(' || c == '[')
            .unwrap_or(self.signature.len());
        self.signature[..end].trim()
    }
}

/// A node inside a template body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    Text(Span),
    Element(ElementNode),
    Call(CallNode),
    For(ForNode),
    If(IfNode),
}

/// An element with children, e.g. `<div>...</div>`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementNode {
    pub tag: String,
    pub children: Vec<Node>,
    pub span: Span,
}

/// A component invocation, e.g. `@ui.Button("ok")`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CallNode {
    /// The reference text without arguments: `Button`, `ui.Button`, `page.Header`.
    pub reference: String,
    /// Raw argument text, if the call had a parenthesized argument list.
    pub args: Option<String>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    pub span: Span,
}

/// An attribute on a component call, bound to a parameter or struct field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    pub name: String,
    pub value: String,
    pub span: Span,
}

/// A `for` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForNode {
    /// The structured clause, when the parser could produce one.
    pub clause: Option<RangeClause>,
    /// The raw header text, e.g. `for i, item := range items`.
    pub header: String,
    pub body: Vec<Node>,
    pub span: Span,
}

/// `key, value := range expr`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeClause {
    pub key: Option<String>,
    pub value: Option<String>,
    /// `:=` (true) versus `=` (false).
    pub define: bool,
    pub expr: String,
}

/// An `if` block.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IfNode {
    /// Names defined by the init statement, when the parser could produce them.
    pub bindings: Option<Vec<String>>,
    /// The raw header text, e.g. `if user, ok := ctx.User(); ok`.
    pub header: String,
    pub then_body: Vec<Node>,
    pub else_body: Vec<Node>,
    pub span: Span,
}

impl TemplateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            package: None,
            items: Vec::new(),
        }
    }

    /// Directory holding the file; a bare file name lives in `.`.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.items.iter().filter_map(|item| match item {
            Item::Declaration(d) => Some(d),
            Item::Template(_) => None,
        })
    }

    pub fn templates(&self) -> impl Iterator<Item = &TemplateDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Template(t) => Some(t),
            Item::Declaration(_) => None,
        })
    }
}
