// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Template document types shared by the parser and the component resolver.
//!
//! The parser itself lives outside this workspace; these types are the
//! contract it produces.

pub mod document;
pub mod span;

pub use document::{
    Attribute, CallNode, Declaration, ElementNode, ForNode, IfNode, Item, Node, PackageClause,
    RangeClause, TemplateDef, TemplateFile, TemplateKind,
};
pub use span::{LineMap, Position, Span};
